//! String decryption
//!
//! The protection tool encrypts string literals in the image and
//! `VMProtectDecryptStringA`/`W` hand back a native buffer with the plain text.
//! That buffer belongs to the caller until it is given back through
//! `VMProtectFreeString`, the only resource in the SDK that outlives a call.
//!
//! **Ownership**: [`DecryptedString`] and [`DecryptedWideString`] own such a
//! buffer. It stays valid for as long as the handle lives and is released
//! exactly once, either by [`DecryptedString::release`] or on drop. Neither
//! handle is `Send`.
//!
//! **Literals**: the SDK recognises encrypted strings by their address in the
//! image, so the input must be the literal itself (`&'static`), never a copy.

use std::borrow::Cow;
use std::ffi::CStr;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::os::raw::{c_char, c_void};
use std::ptr::NonNull;
use std::str::Utf8Error;

use super::ffi;
use crate::error::{ProtectionError, Result};

fn release_native(ptr: *const c_void) -> bool {
    let released = unsafe { ffi::VMProtectFreeString(ptr) };
    if !released {
        log::warn!("VMProtectFreeString rejected a decrypted buffer");
    }
    released
}

// ============================================================================
// NARROW STRINGS
// ============================================================================

/// Plain text of an encrypted literal, owned until released.
pub struct DecryptedString {
    ptr: NonNull<c_char>,
    _not_send: PhantomData<*const ()>,
}

impl DecryptedString {
    pub fn as_c_str(&self) -> &CStr {
        // Valid and terminated until released, which needs `self` by value
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    pub fn to_str(&self) -> std::result::Result<&str, Utf8Error> {
        self.as_c_str().to_str()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        self.as_c_str().to_string_lossy()
    }

    /// Give the buffer back to the SDK now. Returns what the SDK reported.
    pub fn release(self) -> bool {
        let this = ManuallyDrop::new(self);
        release_native(this.ptr.as_ptr().cast::<c_void>())
    }
}

impl Drop for DecryptedString {
    fn drop(&mut self) {
        release_native(self.ptr.as_ptr().cast::<c_void>());
    }
}

impl std::fmt::Debug for DecryptedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Plain text stays out of debug output
        f.debug_struct("DecryptedString")
            .field("len", &self.as_c_str().to_bytes().len())
            .finish()
    }
}

/// Decrypt an encrypted literal.
pub fn decrypt_string(literal: &'static CStr) -> Result<DecryptedString> {
    log::trace!("VMProtectDecryptStringA({} bytes)", literal.to_bytes().len());
    let raw = unsafe { ffi::VMProtectDecryptStringA(literal.as_ptr()) };
    let ptr = NonNull::new(raw as *mut c_char).ok_or(ProtectionError::NullPointer {
        entry_point: "VMProtectDecryptStringA",
    })?;
    Ok(DecryptedString {
        ptr,
        _not_send: PhantomData,
    })
}

/// Decrypt a literal given as a NUL-terminated `&'static str`, see [`decrypt!`](crate::decrypt).
pub fn decrypt_literal(literal: &'static str) -> Result<DecryptedString> {
    let literal = CStr::from_bytes_until_nul(literal.as_bytes())
        .ok()
        .filter(|c| c.to_bytes().len() + 1 == literal.len())
        .ok_or_else(|| match literal.bytes().position(|b| b == 0) {
            Some(position) => ProtectionError::InteriorNul { argument: "literal", position },
            None => ProtectionError::MissingTerminator { argument: "literal" },
        })?;
    decrypt_string(literal)
}

/// Decrypt a string literal in place.
///
/// ```no_run
/// let greeting = vmprotect::decrypt!("Hello, licensed user")?;
/// println!("{}", greeting.to_string_lossy());
/// # Ok::<(), vmprotect::ProtectionError>(())
/// ```
#[macro_export]
macro_rules! decrypt {
    ($literal:literal) => {
        $crate::protector::strings::decrypt_literal(concat!($literal, "\0"))
    };
}

// ============================================================================
// WIDE STRINGS
// ============================================================================

/// UTF-16 counterpart of [`DecryptedString`].
pub struct DecryptedWideString {
    ptr: NonNull<u16>,
    _not_send: PhantomData<*const ()>,
}

impl DecryptedWideString {
    /// Code units up to, not including, the terminator.
    pub fn as_units(&self) -> &[u16] {
        let mut len = 0;
        unsafe {
            while *self.ptr.as_ptr().add(len) != 0 {
                len += 1;
            }
            std::slice::from_raw_parts(self.ptr.as_ptr(), len)
        }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_units())
    }

    pub fn release(self) -> bool {
        let this = ManuallyDrop::new(self);
        release_native(this.ptr.as_ptr().cast::<c_void>())
    }
}

impl Drop for DecryptedWideString {
    fn drop(&mut self) {
        release_native(self.ptr.as_ptr().cast::<c_void>());
    }
}

impl std::fmt::Debug for DecryptedWideString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedWideString")
            .field("len", &self.as_units().len())
            .finish()
    }
}

/// Decrypt an encrypted UTF-16 literal. The slice must end with its NUL unit.
pub fn decrypt_wide(literal: &'static [u16]) -> Result<DecryptedWideString> {
    match literal.iter().position(|&unit| unit == 0) {
        Some(end) if end + 1 == literal.len() => {}
        Some(position) => return Err(ProtectionError::InteriorNul { argument: "literal", position }),
        None => return Err(ProtectionError::MissingTerminator { argument: "literal" }),
    }

    log::trace!("VMProtectDecryptStringW({} units)", literal.len() - 1);
    let raw = unsafe { ffi::VMProtectDecryptStringW(literal.as_ptr()) };
    let ptr = NonNull::new(raw as *mut u16).ok_or(ProtectionError::NullPointer {
        entry_point: "VMProtectDecryptStringW",
    })?;
    Ok(DecryptedWideString {
        ptr,
        _not_send: PhantomData,
    })
}

#[cfg(vmprotect_stand_in)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::protector::stand_in;

    static WIDE_HELLO: [u16; 6] = [b'h' as u16, b'e' as u16, b'l' as u16, b'l' as u16, b'o' as u16, 0];

    #[test]
    fn test_decrypted_text_is_readable_until_release() {
        stand_in::reset();
        stand_in::configure(|s| {
            s.translations.insert("ENC:9f2a".to_string(), "Trial expired".to_string());
        });

        let text = crate::decrypt!("ENC:9f2a").unwrap();
        assert_eq!(stand_in::inspect(|s| s.live_strings()), 1);
        assert_eq!(text.to_str().unwrap(), "Trial expired");
        // Read again, the buffer must still be there
        assert_eq!(text.to_string_lossy(), "Trial expired");

        assert!(text.release(), "the stand-in knows this buffer");
        let (live, released, invalid) = stand_in::inspect(|s| (s.live_strings(), s.released, s.invalid_releases));
        assert_eq!(live, 0);
        assert_eq!(released, 1);
        assert_eq!(invalid, 0, "explicit release must not be followed by a second one on drop");
    }

    #[test]
    fn test_drop_releases_exactly_once() {
        stand_in::reset();
        {
            let _a = crate::decrypt!("first").unwrap();
            let _b = crate::decrypt!("second").unwrap();
            assert_eq!(stand_in::inspect(|s| s.live_strings()), 2);
        }
        let (decrypted, released, invalid) = stand_in::inspect(|s| (s.decrypted, s.released, s.invalid_releases));
        assert_eq!(decrypted, 2);
        assert_eq!(released, 2);
        assert_eq!(invalid, 0);
    }

    #[test]
    fn test_unknown_literal_passes_through() {
        stand_in::reset();
        let literal = CStr::from_bytes_with_nul(b"not encrypted\0").unwrap();
        let text = decrypt_string(literal).unwrap();
        assert_eq!(text.to_str().unwrap(), "not encrypted");
    }

    #[test]
    fn test_decrypt_literal_checks_terminator() {
        stand_in::reset();
        assert_eq!(
            decrypt_literal("no terminator").unwrap_err(),
            ProtectionError::MissingTerminator { argument: "literal" }
        );
        assert_eq!(
            decrypt_literal("a\0b\0").unwrap_err(),
            ProtectionError::InteriorNul { argument: "literal", position: 1 }
        );
        assert_eq!(stand_in::inspect(|s| s.decrypted), 0, "rejected literals never reach the SDK");
    }

    #[test]
    fn test_wide_round_trip_and_release() {
        stand_in::reset();
        let text = decrypt_wide(&WIDE_HELLO).unwrap();
        assert_eq!(text.to_string_lossy(), "hello");
        assert_eq!(text.as_units().len(), 5);
        drop(text);
        let (live, released) = stand_in::inspect(|s| (s.live_strings(), s.released));
        assert_eq!(live, 0);
        assert_eq!(released, 1);
    }

    #[test]
    fn test_wide_requires_terminator() {
        static UNTERMINATED: [u16; 2] = [b'h' as u16, b'i' as u16];
        assert_eq!(
            decrypt_wide(&UNTERMINATED).unwrap_err(),
            ProtectionError::MissingTerminator { argument: "literal" }
        );
    }

    #[test]
    fn test_debug_output_hides_plain_text() {
        stand_in::reset();
        let text = crate::decrypt!("secret").unwrap();
        let debug = format!("{:?}", text);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("len: 6"));
    }
}
