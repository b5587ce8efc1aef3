#![allow(non_snake_case)]

//! Stand-in for the VMProtect SDK
//!
//! Implements every native entry point in Rust with the same signatures, so the
//! binding can run and be tested without the prebuilt library. Compiled only
//! with the `stand-in` feature, never in a default build. Out of the box it
//! answers like an unprotected build of the real SDK:
//! - **Probes**: not protected, no debugger, no VM, valid image CRC
//! - **Strings**: "decryption" returns the literal unchanged
//! - **Licensing**: no serial installed, state `INVALID`, no serial data
//! - **Activation**: every request answers `ACTIVATION_NOT_AVAILABLE`
//!
//! **Instrumentation**: every call is recorded in a per-thread [`StandIn`] that
//! tests script through [`configure`] and read back through [`inspect`].
//! Closures passed to either must not call back into the entry points.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::{ptr, slice};

use super::ffi::{
    VMProtectDate, VMProtectSerialNumberData, ACTIVATION_NOT_AVAILABLE, ACTIVATION_OK,
    ACTIVATION_SMALL_BUFFER, SERIAL_STATE_FLAG_INVALID, USER_DATA_LEN, WIDE_FIELD_LEN,
};

/// Hardware ID reported until a test sets another one.
pub const DEFAULT_HWID: &str = "AQIDBAUGBwgJCgsM";

/// Byte written over output buffers when `scribble_on_failure` is set.
pub const SCRIBBLE: u8 = b'#';

// ============================================================================
// RECORDED STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerCall {
    Begin { entry_point: &'static str, name: String },
    End,
}

/// What the stand-in knows about one serial number.
#[derive(Debug, Clone, Default)]
pub struct LicenseRecord {
    pub state: c_int,
    pub user_name: String,
    pub email: String,
    pub expire: VMProtectDate,
    pub max_build: VMProtectDate,
    pub running_time: c_int,
    pub user_data: Vec<u8>,
}

/// Scripted answer of an activation-style entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Write the payload and return `ACTIVATION_OK` (or `ACTIVATION_SMALL_BUFFER`
    /// when it does not fit).
    Granted(String),
    /// Return this status without a payload.
    Status(c_int),
}

// Owns the buffer behind a pointer handed out by the decrypt entry points
#[allow(dead_code)]
enum Allocation {
    Narrow(CString),
    Wide(Vec<u16>),
}

pub struct StandIn {
    // probes
    pub protected: bool,
    pub debugger: bool,
    pub kernel_debugger: bool,
    pub virtual_machine: bool,
    pub image_crc_valid: bool,
    pub probe_calls: usize,

    // markers
    pub marker_calls: Vec<MarkerCall>,
    pub open_regions: Vec<String>,
    pub unmatched_ends: usize,

    // strings
    pub translations: HashMap<String, String>,
    live_strings: HashMap<usize, Allocation>,
    pub decrypted: usize,
    pub released: usize,
    pub invalid_releases: usize,

    // licensing
    pub licenses: HashMap<String, LicenseRecord>,
    pub current_serial: Option<String>,
    pub data_requests: usize,
    pub scribble_on_failure: bool,

    // hardware id
    pub hwid: String,
    /// Fill the whole buffer and skip the terminator when the ID is too long.
    pub hwid_unterminated: bool,
    pub hwid_calls: usize,

    // activation
    pub activations: HashMap<String, ScriptedReply>,
    pub deactivations: HashMap<String, c_int>,
    pub offline_activations: HashMap<String, ScriptedReply>,
    pub offline_deactivations: HashMap<String, ScriptedReply>,
    pub activation_calls: usize,
}

impl Default for StandIn {
    fn default() -> Self {
        StandIn {
            protected: false,
            debugger: false,
            kernel_debugger: false,
            virtual_machine: false,
            image_crc_valid: true,
            probe_calls: 0,
            marker_calls: Vec::new(),
            open_regions: Vec::new(),
            unmatched_ends: 0,
            translations: HashMap::new(),
            live_strings: HashMap::new(),
            decrypted: 0,
            released: 0,
            invalid_releases: 0,
            licenses: HashMap::new(),
            current_serial: None,
            data_requests: 0,
            scribble_on_failure: false,
            hwid: DEFAULT_HWID.to_string(),
            hwid_unterminated: false,
            hwid_calls: 0,
            activations: HashMap::new(),
            deactivations: HashMap::new(),
            offline_activations: HashMap::new(),
            offline_deactivations: HashMap::new(),
            activation_calls: 0,
        }
    }
}

impl StandIn {
    /// Decrypted buffers handed out and not yet released.
    pub fn live_strings(&self) -> usize {
        self.live_strings.len()
    }

    pub fn install_license(&mut self, serial: &str, record: LicenseRecord) {
        self.licenses.insert(serial.to_string(), record);
    }

    fn serial_state(&self) -> c_int {
        match &self.current_serial {
            Some(serial) => self
                .licenses
                .get(serial)
                .map(|record| record.state)
                .unwrap_or(SERIAL_STATE_FLAG_INVALID),
            None => SERIAL_STATE_FLAG_INVALID,
        }
    }
}

thread_local! {
    static STATE: RefCell<StandIn> = RefCell::new(StandIn::default());
}

/// Forget everything recorded on this thread and go back to defaults.
pub fn reset() {
    STATE.with(|state| *state.borrow_mut() = StandIn::default());
}

pub fn configure<R>(f: impl FnOnce(&mut StandIn) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

pub fn inspect<R>(f: impl FnOnce(&StandIn) -> R) -> R {
    STATE.with(|state| f(&state.borrow()))
}

// ============================================================================
// HELPERS
// ============================================================================

unsafe fn read_narrow(value: *const c_char) -> String {
    if value.is_null() {
        return String::new();
    }
    CStr::from_ptr(value).to_string_lossy().into_owned()
}

unsafe fn read_wide(value: *const u16) -> Vec<u16> {
    let mut len = 0;
    while *value.add(len) != 0 {
        len += 1;
    }
    slice::from_raw_parts(value, len).to_vec()
}

unsafe fn scribble(buf: *mut c_char, size: c_int) {
    if !buf.is_null() && size > 0 {
        ptr::write_bytes(buf, SCRIBBLE, size as usize);
    }
}

/// Copy `payload` plus its terminator into `buf` the way the SDK does.
unsafe fn write_reply(reply: &ScriptedReply, buf: *mut c_char, size: c_int, scribble_on_failure: bool) -> c_int {
    match reply {
        ScriptedReply::Granted(payload) => {
            let bytes = payload.as_bytes();
            if buf.is_null() || size <= 0 || bytes.len() + 1 > size as usize {
                return ACTIVATION_SMALL_BUFFER;
            }
            ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buf, bytes.len());
            *buf.add(bytes.len()) = 0;
            ACTIVATION_OK
        }
        ScriptedReply::Status(code) => {
            if scribble_on_failure {
                scribble(buf, size);
            }
            *code
        }
    }
}

fn wide_field(text: &str) -> [u16; WIDE_FIELD_LEN] {
    let mut field = [0u16; WIDE_FIELD_LEN];
    // Keep one unit for the terminator
    for (slot, unit) in field.iter_mut().take(WIDE_FIELD_LEN - 1).zip(text.encode_utf16()) {
        *slot = unit;
    }
    field
}

fn record_begin(entry_point: &'static str, marker_name: *const c_char) {
    let name = unsafe { read_narrow(marker_name) };
    configure(|state| {
        state.open_regions.push(name.clone());
        state.marker_calls.push(MarkerCall::Begin { entry_point, name });
    });
}

// ============================================================================
// PROTECTION
// ============================================================================

pub unsafe extern "system" fn VMProtectBegin(marker_name: *const c_char) {
    record_begin("VMProtectBegin", marker_name);
}

pub unsafe extern "system" fn VMProtectBeginVirtualization(marker_name: *const c_char) {
    record_begin("VMProtectBeginVirtualization", marker_name);
}

pub unsafe extern "system" fn VMProtectBeginMutation(marker_name: *const c_char) {
    record_begin("VMProtectBeginMutation", marker_name);
}

pub unsafe extern "system" fn VMProtectBeginUltra(marker_name: *const c_char) {
    record_begin("VMProtectBeginUltra", marker_name);
}

pub unsafe extern "system" fn VMProtectBeginVirtualizationLockByKey(marker_name: *const c_char) {
    record_begin("VMProtectBeginVirtualizationLockByKey", marker_name);
}

pub unsafe extern "system" fn VMProtectBeginUltraLockByKey(marker_name: *const c_char) {
    record_begin("VMProtectBeginUltraLockByKey", marker_name);
}

pub unsafe extern "system" fn VMProtectEnd() {
    configure(|state| {
        state.marker_calls.push(MarkerCall::End);
        // Unpaired ends are recorded, never repaired
        if state.open_regions.pop().is_none() {
            state.unmatched_ends += 1;
        }
    });
}

// ============================================================================
// UTILS
// ============================================================================

pub unsafe extern "system" fn VMProtectIsProtected() -> bool {
    configure(|state| {
        state.probe_calls += 1;
        state.protected
    })
}

pub unsafe extern "system" fn VMProtectIsDebuggerPresent(kernel: bool) -> bool {
    configure(|state| {
        state.probe_calls += 1;
        if kernel {
            state.debugger || state.kernel_debugger
        } else {
            state.debugger
        }
    })
}

pub unsafe extern "system" fn VMProtectIsVirtualMachinePresent() -> bool {
    configure(|state| {
        state.probe_calls += 1;
        state.virtual_machine
    })
}

pub unsafe extern "system" fn VMProtectIsValidImageCRC() -> bool {
    configure(|state| {
        state.probe_calls += 1;
        state.image_crc_valid
    })
}

pub unsafe extern "system" fn VMProtectDecryptStringA(value: *const c_char) -> *const c_char {
    if value.is_null() {
        return ptr::null();
    }
    let literal = read_narrow(value);
    configure(|state| {
        let plain = state.translations.get(&literal).cloned().unwrap_or(literal);
        let buffer = CString::new(plain).unwrap_or_default();
        let out = buffer.as_ptr();
        state.live_strings.insert(out as usize, Allocation::Narrow(buffer));
        state.decrypted += 1;
        out
    })
}

pub unsafe extern "system" fn VMProtectDecryptStringW(value: *const u16) -> *const u16 {
    if value.is_null() {
        return ptr::null();
    }
    let literal = read_wide(value);
    configure(|state| {
        let key = String::from_utf16_lossy(&literal);
        let mut buffer: Vec<u16> = match state.translations.get(&key) {
            Some(plain) => plain.encode_utf16().collect(),
            None => literal,
        };
        buffer.push(0);
        let out = buffer.as_ptr();
        state.live_strings.insert(out as usize, Allocation::Wide(buffer));
        state.decrypted += 1;
        out
    })
}

pub unsafe extern "system" fn VMProtectFreeString(value: *const c_void) -> bool {
    configure(|state| match state.live_strings.remove(&(value as usize)) {
        Some(allocation) => {
            drop(allocation);
            state.released += 1;
            true
        }
        None => {
            state.invalid_releases += 1;
            false
        }
    })
}

// ============================================================================
// LICENSING
// ============================================================================

pub unsafe extern "system" fn VMProtectSetSerialNumber(serial: *const c_char) -> c_int {
    let serial = read_narrow(serial);
    configure(|state| {
        state.current_serial = if serial.is_empty() { None } else { Some(serial) };
        state.serial_state()
    })
}

pub unsafe extern "system" fn VMProtectGetSerialNumberState() -> c_int {
    inspect(|state| state.serial_state())
}

pub unsafe extern "system" fn VMProtectGetSerialNumberData(data: *mut VMProtectSerialNumberData, size: c_int) -> bool {
    configure(|state| {
        state.data_requests += 1;
        if data.is_null() || size as usize != std::mem::size_of::<VMProtectSerialNumberData>() {
            return false;
        }

        let record = state.current_serial.as_ref().and_then(|serial| state.licenses.get(serial));
        let Some(record) = record else {
            if state.scribble_on_failure {
                scribble(data.cast::<c_char>(), size);
            }
            return false;
        };

        let mut raw = VMProtectSerialNumberData::zeroed();
        raw.nState = record.state;
        // Packed fields cannot be borrowed, fill copies and move them in
        raw.wUserName = wide_field(&record.user_name);
        raw.wEMail = wide_field(&record.email);
        raw.dtExpire = record.expire;
        raw.dtMaxBuild = record.max_build;
        raw.bRunningTime = record.running_time;

        let len = record.user_data.len().min(USER_DATA_LEN);
        raw.nUserDataLength = len as u8;
        raw.bUserData[..len].copy_from_slice(&record.user_data[..len]);
        if state.scribble_on_failure {
            // Garbage past the reported length must never be read back
            raw.bUserData[len..].fill(SCRIBBLE);
        }

        ptr::write_unaligned(data, raw);
        true
    })
}

pub unsafe extern "system" fn VMProtectGetCurrentHWID(hwid: *mut c_char, size: c_int) -> c_int {
    configure(|state| {
        state.hwid_calls += 1;
        let bytes = state.hwid.as_bytes();
        if hwid.is_null() {
            return bytes.len() as c_int + 1;
        }
        if size <= 0 {
            return 0;
        }
        if state.hwid_unterminated && bytes.len() >= size as usize {
            ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), hwid, size as usize);
            return size;
        }
        let len = bytes.len().min(size as usize - 1);
        ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), hwid, len);
        *hwid.add(len) = 0;
        len as c_int + 1
    })
}

// ============================================================================
// ACTIVATION
// ============================================================================

pub unsafe extern "system" fn VMProtectActivateLicense(code: *const c_char, serial: *mut c_char, size: c_int) -> c_int {
    let code = read_narrow(code);
    configure(|state| {
        state.activation_calls += 1;
        let reply = state
            .activations
            .get(&code)
            .cloned()
            .unwrap_or(ScriptedReply::Status(ACTIVATION_NOT_AVAILABLE));
        write_reply(&reply, serial, size, state.scribble_on_failure)
    })
}

pub unsafe extern "system" fn VMProtectDeactivateLicense(serial: *const c_char) -> c_int {
    let serial = read_narrow(serial);
    configure(|state| {
        state.activation_calls += 1;
        state.deactivations.get(&serial).copied().unwrap_or(ACTIVATION_NOT_AVAILABLE)
    })
}

pub unsafe extern "system" fn VMProtectGetOfflineActivationString(code: *const c_char, buf: *mut c_char, size: c_int) -> c_int {
    let code = read_narrow(code);
    configure(|state| {
        state.activation_calls += 1;
        let reply = state
            .offline_activations
            .get(&code)
            .cloned()
            .unwrap_or(ScriptedReply::Status(ACTIVATION_NOT_AVAILABLE));
        write_reply(&reply, buf, size, state.scribble_on_failure)
    })
}

pub unsafe extern "system" fn VMProtectGetOfflineDeactivationString(serial: *const c_char, buf: *mut c_char, size: c_int) -> c_int {
    let serial = read_narrow(serial);
    configure(|state| {
        state.activation_calls += 1;
        let reply = state
            .offline_deactivations
            .get(&serial)
            .cloned()
            .unwrap_or(ScriptedReply::Status(ACTIVATION_NOT_AVAILABLE));
        write_reply(&reply, buf, size, state.scribble_on_failure)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_look_unprotected() {
        reset();
        unsafe {
            assert!(!VMProtectIsProtected());
            assert!(!VMProtectIsDebuggerPresent(true));
            assert!(!VMProtectIsVirtualMachinePresent());
            assert!(VMProtectIsValidImageCRC());
            assert_eq!(VMProtectGetSerialNumberState(), SERIAL_STATE_FLAG_INVALID);
        }
        assert_eq!(inspect(|s| s.probe_calls), 4);
    }

    #[test]
    fn test_free_unknown_pointer_is_counted() {
        reset();
        let bogus = 0x1000usize as *const c_void;
        let freed = unsafe { VMProtectFreeString(bogus) };
        assert!(!freed, "a pointer the stand-in never handed out cannot be released");
        assert_eq!(inspect(|s| s.invalid_releases), 1);
    }

    #[test]
    fn test_hwid_size_query_with_null_buffer() {
        reset();
        let needed = unsafe { VMProtectGetCurrentHWID(ptr::null_mut(), 0) };
        assert_eq!(needed as usize, DEFAULT_HWID.len() + 1);
    }

    #[test]
    fn test_granted_reply_that_does_not_fit() {
        reset();
        let mut buf = [0 as c_char; 4];
        let reply = ScriptedReply::Granted("TOO-LONG".to_string());
        let code = unsafe { write_reply(&reply, buf.as_mut_ptr(), buf.len() as c_int, false) };
        assert_eq!(code, ACTIVATION_SMALL_BUFFER);
    }

    #[test]
    fn test_end_without_begin_is_recorded() {
        reset();
        unsafe { VMProtectEnd() };
        assert_eq!(inspect(|s| s.unmatched_ends), 1);
    }
}
