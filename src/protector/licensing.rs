//! Serial-number licensing
//!
//! The SDK validates serials itself; this module installs them, reads the
//! resulting state bitmask and copies the serial descriptor out of the packed
//! native struct.
//!
//! **Descriptor copy**:
//! - name and e-mail are UTF-16 buffers, decoded up to the first NUL unit
//! - the user-data payload is bounded by its length byte, never by a terminator
//! - a failed query yields `None`, whatever the native side left in the buffer

use std::fmt;

use bitflags::bitflags;

use super::{ffi, marshal};
use crate::error::Result;

bitflags! {
    /// Validation state of the installed serial. Empty means fully valid.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SerialState: i32 {
        const CORRUPTED = ffi::SERIAL_STATE_FLAG_CORRUPTED;
        const INVALID = ffi::SERIAL_STATE_FLAG_INVALID;
        const BLACKLISTED = ffi::SERIAL_STATE_FLAG_BLACKLISTED;
        const DATE_EXPIRED = ffi::SERIAL_STATE_FLAG_DATE_EXPIRED;
        const RUNNING_TIME_OVER = ffi::SERIAL_STATE_FLAG_RUNNING_TIME_OVER;
        const BAD_HWID = ffi::SERIAL_STATE_FLAG_BAD_HWID;
        const MAX_BUILD_EXPIRED = ffi::SERIAL_STATE_FLAG_MAX_BUILD_EXPIRED;
    }
}

impl SerialState {
    pub const SUCCESS: SerialState = SerialState::empty();

    /// Keeps bits the SDK may add later instead of dropping them.
    pub fn from_native(raw: i32) -> Self {
        SerialState::from_bits_retain(raw)
    }

    pub fn is_valid(self) -> bool {
        self.is_empty()
    }

    /// One line per set flag, in bit order.
    pub fn reasons(self) -> Vec<&'static str> {
        let mut reasons: Vec<&'static str> = STATE_REASONS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, reason)| *reason)
            .collect();
        if self.bits() & !SerialState::all().bits() != 0 {
            reasons.push("unknown serial state flag");
        }
        reasons
    }
}

const STATE_REASONS: [(SerialState, &str); 7] = [
    (SerialState::CORRUPTED, "serial number is corrupted"),
    (SerialState::INVALID, "serial number is invalid"),
    (SerialState::BLACKLISTED, "serial number is blacklisted"),
    (SerialState::DATE_EXPIRED, "serial number has expired"),
    (SerialState::RUNNING_TIME_OVER, "running time limit is exhausted"),
    (SerialState::BAD_HWID, "serial number is bound to another machine"),
    (SerialState::MAX_BUILD_EXPIRED, "serial number does not cover this build"),
];

/// Calendar date as the SDK stores it. All zero means "not set".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub const fn new(year: u16, month: u8, day: u8) -> Self {
        Date { year, month, day }
    }

    pub fn is_set(&self) -> bool {
        self.year != 0 || self.month != 0 || self.day != 0
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl From<ffi::VMProtectDate> for Date {
    fn from(raw: ffi::VMProtectDate) -> Self {
        // Copy out of the packed struct before use
        let (year, month, day) = (raw.wYear, raw.bMonth, raw.bDay);
        Date { year, month, day }
    }
}

/// Everything the SDK knows about the installed serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialNumberData {
    pub state: SerialState,
    pub user_name: String,
    pub email: String,
    pub expire_date: Date,
    pub max_build_date: Date,
    /// Minutes the program may run per session; 0 when unlimited.
    pub running_time: i32,
    pub user_data: Vec<u8>,
}

impl SerialNumberData {
    fn from_native(raw: &ffi::VMProtectSerialNumberData) -> Self {
        // Copy every field out of the packed struct before touching it
        let state = raw.nState;
        let user_name = raw.wUserName;
        let email = raw.wEMail;
        let expire = raw.dtExpire;
        let max_build = raw.dtMaxBuild;
        let running_time = raw.bRunningTime;
        let user_data_len = usize::from(raw.nUserDataLength);
        let user_data = raw.bUserData;

        SerialNumberData {
            state: SerialState::from_native(state),
            user_name: marshal::string_from_wide(&user_name),
            email: marshal::string_from_wide(&email),
            expire_date: expire.into(),
            max_build_date: max_build.into(),
            running_time,
            user_data: user_data[..user_data_len.min(user_data.len())].to_vec(),
        }
    }
}

/// Install a serial and return the state the SDK computed for it.
pub fn set_serial_number(serial: &str) -> Result<SerialState> {
    let serial = marshal::to_native("serial", serial)?;
    log::trace!("VMProtectSetSerialNumber({} bytes)", serial.as_bytes().len());

    let state = SerialState::from_native(unsafe { ffi::VMProtectSetSerialNumber(serial.as_ptr()) });
    log::debug!("serial installed, state {:?}", state);
    Ok(state)
}

pub fn serial_number_state() -> SerialState {
    let state = SerialState::from_native(unsafe { ffi::VMProtectGetSerialNumberState() });
    log::trace!("VMProtectGetSerialNumberState() -> {:?}", state);
    state
}

/// Descriptor of the installed serial, `None` when the SDK has none to give.
pub fn serial_number_data() -> Option<SerialNumberData> {
    let mut raw = ffi::VMProtectSerialNumberData::zeroed();
    let size = std::mem::size_of::<ffi::VMProtectSerialNumberData>() as i32;

    let filled = unsafe { ffi::VMProtectGetSerialNumberData(&mut raw, size) };
    log::trace!("VMProtectGetSerialNumberData(size={}) -> {}", size, filled);
    if !filled {
        return None;
    }
    Some(SerialNumberData::from_native(&raw))
}
