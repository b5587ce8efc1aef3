//! String and buffer conversion across the call boundary.
//!
//! Every temporary built here is owned by the calling wrapper and dropped
//! before it returns, on success and error paths alike.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};

use crate::error::{ProtectionError, Result};

/// Build a native string for a value whose meaning changes if it is cut short
/// (serials, activation codes).
pub(crate) fn to_native(argument: &'static str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|err| ProtectionError::InteriorNul {
        argument,
        position: err.nul_position(),
    })
}

/// Build a native string for a marker name.
///
/// Marker names are labels only. Anything from the first NUL byte on would be
/// invisible to the native side, so it is dropped instead of failing.
pub(crate) fn marker_name(value: &str) -> CString {
    let bytes = value.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    // No NUL left in bytes[..end]
    CString::new(&bytes[..end]).unwrap_or_default()
}

/// Decode a NUL-terminated narrow buffer. Reads stop at the buffer end when
/// no terminator was written.
pub(crate) fn string_from_buffer(buffer: &[c_char]) -> String {
    let bytes: Vec<u8> = buffer
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Decode a NUL-terminated UTF-16 buffer, bounded the same way.
pub(crate) fn string_from_wide(buffer: &[u16]) -> String {
    let end = buffer.iter().position(|&unit| unit == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..end])
}

/// Fixed-size output buffer for entry points that write a string and take its
/// capacity as a native `int`.
pub(crate) struct OutBuffer {
    data: Vec<c_char>,
}

impl OutBuffer {
    /// `capacity` is one of the `config` constants, all far below `c_int::MAX`.
    pub(crate) fn new(capacity: usize) -> Self {
        OutBuffer { data: vec![0; capacity] }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut c_char {
        self.data.as_mut_ptr()
    }

    pub(crate) fn capacity(&self) -> c_int {
        self.data.len() as c_int
    }

    pub(crate) fn into_string(self) -> String {
        string_from_buffer(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_native_rejects_interior_nul() {
        let err = to_native("serial", "AB\0CD").unwrap_err();
        assert_eq!(err, ProtectionError::InteriorNul { argument: "serial", position: 2 });
    }

    #[test]
    fn test_marker_name_cuts_at_first_nul() {
        assert_eq!(marker_name("outer\0inner").as_bytes(), b"outer");
        assert_eq!(marker_name("\0").as_bytes(), b"");
        assert_eq!(marker_name("").as_bytes(), b"");
        assert_eq!(marker_name("plain").as_bytes(), b"plain");
    }

    #[test]
    fn test_string_from_buffer_without_terminator() {
        let buffer = [b'a' as c_char, b'b' as c_char, b'c' as c_char];
        assert_eq!(string_from_buffer(&buffer), "abc", "unterminated buffer is read to its end");
    }

    #[test]
    fn test_string_from_buffer_stops_at_nul() {
        let buffer = [b'h' as c_char, b'i' as c_char, 0, b'x' as c_char];
        assert_eq!(string_from_buffer(&buffer), "hi");
    }

    #[test]
    fn test_string_from_wide_decodes_utf16() {
        let mut buffer = [0u16; 8];
        for (slot, unit) in buffer.iter_mut().zip("Zoë".encode_utf16()) {
            *slot = unit;
        }
        assert_eq!(string_from_wide(&buffer), "Zoë");
    }

    #[test]
    fn test_out_buffer_reports_capacity() {
        let buffer = OutBuffer::new(256);
        assert_eq!(buffer.capacity(), 256);
        assert_eq!(buffer.into_string(), "", "fresh buffer is zeroed");
    }
}
