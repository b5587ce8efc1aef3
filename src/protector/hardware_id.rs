//! Hardware ID of the current machine
//!
//! The SDK builds the identifier from the machine's hardware and returns it
//! as a short ASCII string. Serials can be bound to it. The identifier is read
//! into a fixed native buffer of [`HWID_CAPACITY`] bytes, so the result is
//! never longer than `HWID_CAPACITY - 1`.

use std::os::raw::c_char;

use super::{ffi, marshal};
use crate::config::HWID_CAPACITY;

pub fn current_hwid() -> String {
    let mut buffer = [0 as c_char; HWID_CAPACITY];
    let written = unsafe { ffi::VMProtectGetCurrentHWID(buffer.as_mut_ptr(), HWID_CAPACITY as i32) };
    log::trace!("VMProtectGetCurrentHWID(size={}) -> {}", HWID_CAPACITY, written);

    // The last byte is always a terminator, whatever the SDK wrote
    buffer[HWID_CAPACITY - 1] = 0;
    marshal::string_from_buffer(&buffer)
}

#[cfg(vmprotect_stand_in)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::protector::stand_in;

    #[test]
    fn test_hwid_is_stable_across_calls() {
        stand_in::reset();
        let first = current_hwid();
        let second = current_hwid();
        assert_eq!(first, stand_in::DEFAULT_HWID);
        assert_eq!(first, second, "hardware id must not change within one process");
        assert_eq!(stand_in::inspect(|s| s.hwid_calls), 2);
    }

    #[test]
    fn test_hwid_never_exceeds_capacity() {
        stand_in::reset();
        stand_in::configure(|s| s.hwid = "H".repeat(HWID_CAPACITY * 2));
        let hwid = current_hwid();
        assert_eq!(hwid.len(), HWID_CAPACITY - 1);
        assert!(hwid.bytes().all(|b| b == b'H'));
    }

    #[test]
    fn test_unterminated_hwid_is_cut_to_bound() {
        stand_in::reset();
        stand_in::configure(|s| {
            s.hwid = "Z".repeat(300);
            s.hwid_unterminated = true;
        });
        let hwid = current_hwid();
        assert_eq!(hwid.len(), HWID_CAPACITY - 1, "a full buffer without terminator must not be read past its end");
        assert!(hwid.bytes().all(|b| b == b'Z'));
    }

    #[test]
    fn test_hwid_at_exact_bound() {
        stand_in::reset();
        let exact = "A".repeat(HWID_CAPACITY - 1);
        stand_in::configure(|s| s.hwid = exact.clone());
        assert_eq!(current_hwid(), exact);
    }
}
