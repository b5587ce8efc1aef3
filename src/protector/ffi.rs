#![allow(non_snake_case, non_camel_case_types)]

//! Raw entry points of the VMProtect SDK and its binary-compatible structures.
//!
//! Nothing in here is safe to call directly; the sibling modules wrap every
//! function. By default the declarations below bind to the prebuilt library
//! selected by `build.rs`; with the `stand-in` feature the same names are
//! re-exported from the stand-in module instead.

use std::os::raw::c_int;
#[cfg(not(vmprotect_stand_in))]
use std::os::raw::{c_char, c_void};

// ============================================================================
// SERIAL STATE FLAGS
// ============================================================================

pub const SERIAL_STATE_SUCCESS: c_int = 0;
pub const SERIAL_STATE_FLAG_CORRUPTED: c_int = 0x0000_0001;
pub const SERIAL_STATE_FLAG_INVALID: c_int = 0x0000_0002;
pub const SERIAL_STATE_FLAG_BLACKLISTED: c_int = 0x0000_0004;
pub const SERIAL_STATE_FLAG_DATE_EXPIRED: c_int = 0x0000_0008;
pub const SERIAL_STATE_FLAG_RUNNING_TIME_OVER: c_int = 0x0000_0010;
pub const SERIAL_STATE_FLAG_BAD_HWID: c_int = 0x0000_0020;
pub const SERIAL_STATE_FLAG_MAX_BUILD_EXPIRED: c_int = 0x0000_0040;

// ============================================================================
// ACTIVATION RESULT CODES
// ============================================================================

pub const ACTIVATION_OK: c_int = 0;
pub const ACTIVATION_SMALL_BUFFER: c_int = 1;
pub const ACTIVATION_NO_CONNECTION: c_int = 2;
pub const ACTIVATION_BAD_REPLY: c_int = 3;
pub const ACTIVATION_BANNED: c_int = 4;
pub const ACTIVATION_CORRUPTED: c_int = 5;
pub const ACTIVATION_BAD_CODE: c_int = 6;
pub const ACTIVATION_ALREADY_USED: c_int = 7;
pub const ACTIVATION_SERIAL_UNKNOWN: c_int = 8;
pub const ACTIVATION_EXPIRED: c_int = 9;
pub const ACTIVATION_NOT_AVAILABLE: c_int = 10;

// ============================================================================
// STRUCTURES (#pragma pack(1) in the SDK header)
// ============================================================================

/// Length of the UTF-16 user name and e-mail buffers, in code units.
pub const WIDE_FIELD_LEN: usize = 256;

/// Capacity of the trailing user-data payload.
pub const USER_DATA_LEN: usize = 255;

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct VMProtectDate {
    pub wYear: u16,
    pub bMonth: u8,
    pub bDay: u8,
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct VMProtectSerialNumberData {
    pub nState: c_int,
    pub wUserName: [u16; WIDE_FIELD_LEN],
    pub wEMail: [u16; WIDE_FIELD_LEN],
    pub dtExpire: VMProtectDate,
    pub dtMaxBuild: VMProtectDate,
    /// Minutes.
    pub bRunningTime: c_int,
    pub nUserDataLength: u8,
    pub bUserData: [u8; USER_DATA_LEN],
}

impl VMProtectSerialNumberData {
    pub const fn zeroed() -> Self {
        VMProtectSerialNumberData {
            nState: 0,
            wUserName: [0; WIDE_FIELD_LEN],
            wEMail: [0; WIDE_FIELD_LEN],
            dtExpire: VMProtectDate { wYear: 0, bMonth: 0, bDay: 0 },
            dtMaxBuild: VMProtectDate { wYear: 0, bMonth: 0, bDay: 0 },
            bRunningTime: 0,
            nUserDataLength: 0,
            bUserData: [0; USER_DATA_LEN],
        }
    }
}

// ============================================================================
// FFI DECLARATIONS
// ============================================================================

// "system" is stdcall on 32-bit Windows and the C convention everywhere else,
// which is what VMP_API expands to
#[cfg(not(vmprotect_stand_in))]
extern "system" {
    // protection
    pub fn VMProtectBegin(marker_name: *const c_char);
    pub fn VMProtectBeginVirtualization(marker_name: *const c_char);
    pub fn VMProtectBeginMutation(marker_name: *const c_char);
    pub fn VMProtectBeginUltra(marker_name: *const c_char);
    pub fn VMProtectBeginVirtualizationLockByKey(marker_name: *const c_char);
    pub fn VMProtectBeginUltraLockByKey(marker_name: *const c_char);
    pub fn VMProtectEnd();

    // utils
    pub fn VMProtectIsProtected() -> bool;
    pub fn VMProtectIsDebuggerPresent(kernel: bool) -> bool;
    pub fn VMProtectIsVirtualMachinePresent() -> bool;
    pub fn VMProtectIsValidImageCRC() -> bool;
    pub fn VMProtectDecryptStringA(value: *const c_char) -> *const c_char;
    pub fn VMProtectDecryptStringW(value: *const u16) -> *const u16;
    pub fn VMProtectFreeString(value: *const c_void) -> bool;

    // licensing
    pub fn VMProtectSetSerialNumber(serial: *const c_char) -> c_int;
    pub fn VMProtectGetSerialNumberState() -> c_int;
    pub fn VMProtectGetSerialNumberData(data: *mut VMProtectSerialNumberData, size: c_int) -> bool;
    pub fn VMProtectGetCurrentHWID(hwid: *mut c_char, size: c_int) -> c_int;

    // activation
    pub fn VMProtectActivateLicense(code: *const c_char, serial: *mut c_char, size: c_int) -> c_int;
    pub fn VMProtectDeactivateLicense(serial: *const c_char) -> c_int;
    pub fn VMProtectGetOfflineActivationString(code: *const c_char, buf: *mut c_char, size: c_int) -> c_int;
    pub fn VMProtectGetOfflineDeactivationString(serial: *const c_char, buf: *mut c_char, size: c_int) -> c_int;
}

#[cfg(vmprotect_stand_in)]
pub use super::stand_in::{
    VMProtectActivateLicense, VMProtectBegin, VMProtectBeginMutation, VMProtectBeginUltra,
    VMProtectBeginUltraLockByKey, VMProtectBeginVirtualization, VMProtectBeginVirtualizationLockByKey,
    VMProtectDeactivateLicense, VMProtectDecryptStringA, VMProtectDecryptStringW, VMProtectEnd,
    VMProtectFreeString, VMProtectGetCurrentHWID, VMProtectGetOfflineActivationString,
    VMProtectGetOfflineDeactivationString, VMProtectGetSerialNumberData, VMProtectGetSerialNumberState,
    VMProtectIsDebuggerPresent, VMProtectIsProtected, VMProtectIsValidImageCRC,
    VMProtectIsVirtualMachinePresent, VMProtectSetSerialNumber,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_serial_data_layout_matches_sdk() {
        assert_eq!(size_of::<VMProtectDate>(), 4);
        assert_eq!(size_of::<VMProtectSerialNumberData>(), crate::config::SERIAL_DATA_SIZE);
    }

    #[test]
    fn test_serial_data_field_offsets() {
        assert_eq!(offset_of!(VMProtectSerialNumberData, nState), 0);
        assert_eq!(offset_of!(VMProtectSerialNumberData, wUserName), 4);
        assert_eq!(offset_of!(VMProtectSerialNumberData, wEMail), 516);
        assert_eq!(offset_of!(VMProtectSerialNumberData, dtExpire), 1028);
        assert_eq!(offset_of!(VMProtectSerialNumberData, dtMaxBuild), 1032);
        assert_eq!(offset_of!(VMProtectSerialNumberData, bRunningTime), 1036);
        assert_eq!(offset_of!(VMProtectSerialNumberData, nUserDataLength), 1040);
        assert_eq!(offset_of!(VMProtectSerialNumberData, bUserData), 1041);
    }
}
