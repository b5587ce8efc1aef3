//! License activation, online and offline
//!
//! **Online**: the SDK talks to the license server with its own transport.
//! Whatever it answers is handed back unchanged; nothing here retries or
//! caches.
//!
//! **Offline**: the SDK produces a text blob the user carries to the license
//! server by other means. Same result codes as online.
//!
//! A payload (serial or blob) exists only when the status is
//! [`ActivationStatus::Ok`]; for every other status the output buffer is
//! ignored.

use std::fmt;
use std::os::raw::{c_char, c_int};

use super::{ffi, marshal};
use crate::config::{OFFLINE_BLOB_CAPACITY, SERIAL_CAPACITY};
use crate::error::{ProtectionError, Result};

/// Result codes of the activation entry points. The numbering is fixed by the SDK.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationStatus {
    Ok = ffi::ACTIVATION_OK,
    SmallBuffer = ffi::ACTIVATION_SMALL_BUFFER,
    NoConnection = ffi::ACTIVATION_NO_CONNECTION,
    BadReply = ffi::ACTIVATION_BAD_REPLY,
    Banned = ffi::ACTIVATION_BANNED,
    Corrupted = ffi::ACTIVATION_CORRUPTED,
    BadCode = ffi::ACTIVATION_BAD_CODE,
    AlreadyUsed = ffi::ACTIVATION_ALREADY_USED,
    SerialUnknown = ffi::ACTIVATION_SERIAL_UNKNOWN,
    Expired = ffi::ACTIVATION_EXPIRED,
    NotAvailable = ffi::ACTIVATION_NOT_AVAILABLE,
}

impl ActivationStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == ActivationStatus::Ok
    }
}

impl TryFrom<i32> for ActivationStatus {
    type Error = i32;

    fn try_from(code: i32) -> std::result::Result<Self, i32> {
        Ok(match code {
            ffi::ACTIVATION_OK => ActivationStatus::Ok,
            ffi::ACTIVATION_SMALL_BUFFER => ActivationStatus::SmallBuffer,
            ffi::ACTIVATION_NO_CONNECTION => ActivationStatus::NoConnection,
            ffi::ACTIVATION_BAD_REPLY => ActivationStatus::BadReply,
            ffi::ACTIVATION_BANNED => ActivationStatus::Banned,
            ffi::ACTIVATION_CORRUPTED => ActivationStatus::Corrupted,
            ffi::ACTIVATION_BAD_CODE => ActivationStatus::BadCode,
            ffi::ACTIVATION_ALREADY_USED => ActivationStatus::AlreadyUsed,
            ffi::ACTIVATION_SERIAL_UNKNOWN => ActivationStatus::SerialUnknown,
            ffi::ACTIVATION_EXPIRED => ActivationStatus::Expired,
            ffi::ACTIVATION_NOT_AVAILABLE => ActivationStatus::NotAvailable,
            other => return Err(other),
        })
    }
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ActivationStatus::Ok => "activation succeeded",
            ActivationStatus::SmallBuffer => "reply did not fit the output buffer",
            ActivationStatus::NoConnection => "license server could not be reached",
            ActivationStatus::BadReply => "license server sent a malformed reply",
            ActivationStatus::Banned => "activation code is banned",
            ActivationStatus::Corrupted => "activation data is corrupted",
            ActivationStatus::BadCode => "activation code is not valid",
            ActivationStatus::AlreadyUsed => "activation code was already used",
            ActivationStatus::SerialUnknown => "serial number is unknown to the license server",
            ActivationStatus::Expired => "activation code has expired",
            ActivationStatus::NotAvailable => "activation is not available",
        };
        f.write_str(message)
    }
}

/// Answer of an activation request that produces a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationReply {
    /// Status was `Ok`; holds the serial or offline blob.
    Granted(String),
    /// Any other status. Never holds `Ok`.
    Denied(ActivationStatus),
}

impl ActivationReply {
    pub fn status(&self) -> ActivationStatus {
        match self {
            ActivationReply::Granted(_) => ActivationStatus::Ok,
            ActivationReply::Denied(status) => *status,
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            ActivationReply::Granted(payload) => Some(payload),
            ActivationReply::Denied(_) => None,
        }
    }

    pub fn into_payload(self) -> Option<String> {
        match self {
            ActivationReply::Granted(payload) => Some(payload),
            ActivationReply::Denied(_) => None,
        }
    }
}

fn map_status(entry_point: &'static str, code: c_int) -> Result<ActivationStatus> {
    ActivationStatus::try_from(code).map_err(|code| {
        log::warn!("{} returned undocumented status {}", entry_point, code);
        ProtectionError::UnknownActivationStatus { entry_point, code }
    })
}

type PayloadCall = unsafe extern "system" fn(*const c_char, *mut c_char, c_int) -> c_int;

/// Shared shape of the three entry points that write a payload on success.
fn request_payload(
    entry_point: &'static str,
    call: PayloadCall,
    argument: &'static str,
    value: &str,
    capacity: usize,
) -> Result<ActivationReply> {
    let value = marshal::to_native(argument, value)?;
    let mut buffer = marshal::OutBuffer::new(capacity);
    log::trace!("{}({} bytes, size={})", entry_point, value.as_bytes().len(), capacity);

    let code = unsafe { call(value.as_ptr(), buffer.as_mut_ptr(), buffer.capacity()) };
    let status = map_status(entry_point, code)?;
    if !status.is_ok() {
        log::debug!("{} denied: {}", entry_point, status);
        return Ok(ActivationReply::Denied(status));
    }

    let payload = buffer.into_string();
    if payload.is_empty() {
        log::warn!("{} accepted the request but wrote no reply", entry_point);
        return Err(ProtectionError::EmptyReply { entry_point, status });
    }
    log::debug!("{} granted", entry_point);
    Ok(ActivationReply::Granted(payload))
}

/// Activate online; the granted payload is the new serial.
pub fn activate_license(code: &str) -> Result<ActivationReply> {
    request_payload(
        "VMProtectActivateLicense",
        ffi::VMProtectActivateLicense,
        "code",
        code,
        SERIAL_CAPACITY,
    )
}

/// Deactivate a serial online.
pub fn deactivate_license(serial: &str) -> Result<ActivationStatus> {
    let serial = marshal::to_native("serial", serial)?;
    log::trace!("VMProtectDeactivateLicense({} bytes)", serial.as_bytes().len());

    let code = unsafe { ffi::VMProtectDeactivateLicense(serial.as_ptr()) };
    let status = map_status("VMProtectDeactivateLicense", code)?;
    log::debug!("VMProtectDeactivateLicense: {}", status);
    Ok(status)
}

/// Blob to hand to the license server for activation without a connection.
pub fn offline_activation_string(code: &str) -> Result<ActivationReply> {
    request_payload(
        "VMProtectGetOfflineActivationString",
        ffi::VMProtectGetOfflineActivationString,
        "code",
        code,
        OFFLINE_BLOB_CAPACITY,
    )
}

/// Blob to hand to the license server for deactivation without a connection.
pub fn offline_deactivation_string(serial: &str) -> Result<ActivationReply> {
    request_payload(
        "VMProtectGetOfflineDeactivationString",
        ffi::VMProtectGetOfflineDeactivationString,
        "serial",
        serial,
        OFFLINE_BLOB_CAPACITY,
    )
}

#[cfg(vmprotect_stand_in)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::protector::stand_in::{self, ScriptedReply};

    const ALL_CODES: std::ops::RangeInclusive<i32> = 0..=10;

    #[test]
    fn test_status_numbering_is_stable() {
        for code in ALL_CODES {
            let status = ActivationStatus::try_from(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(ActivationStatus::try_from(11), Err(11));
        assert_eq!(ActivationStatus::try_from(-1), Err(-1));
    }

    #[test]
    fn test_serial_only_with_ok_status() {
        for code in ALL_CODES {
            stand_in::reset();
            stand_in::configure(|s| {
                s.scribble_on_failure = true;
                let reply = if code == ffi::ACTIVATION_OK {
                    ScriptedReply::Granted("SERIAL-0001".to_string())
                } else {
                    ScriptedReply::Status(code)
                };
                s.activations.insert("CODE".to_string(), reply);
            });

            let reply = activate_license("CODE").unwrap();
            if code == ffi::ACTIVATION_OK {
                assert_eq!(reply, ActivationReply::Granted("SERIAL-0001".to_string()));
            } else {
                assert_eq!(reply.payload(), None, "status {} must not carry a serial", code);
                assert_eq!(reply.status().code(), code);
            }
        }
    }

    #[test]
    fn test_unscripted_activation_is_not_available() {
        stand_in::reset();
        let reply = activate_license("ANY").unwrap();
        assert_eq!(reply, ActivationReply::Denied(ActivationStatus::NotAvailable));
    }

    #[test]
    fn test_small_buffer_is_passed_through() {
        stand_in::reset();
        let huge = "S".repeat(SERIAL_CAPACITY);
        stand_in::configure(|s| {
            s.activations.insert("CODE".to_string(), ScriptedReply::Granted(huge));
        });
        let reply = activate_license("CODE").unwrap();
        assert_eq!(reply.status(), ActivationStatus::SmallBuffer);
        assert_eq!(stand_in::inspect(|s| s.activation_calls), 1, "no retry with a bigger buffer");
    }

    #[test]
    fn test_undocumented_status_is_a_boundary_error() {
        stand_in::reset();
        stand_in::configure(|s| {
            s.activations.insert("CODE".to_string(), ScriptedReply::Status(77));
            s.deactivations.insert("SERIAL".to_string(), -3);
        });
        assert_eq!(
            activate_license("CODE").unwrap_err(),
            ProtectionError::UnknownActivationStatus { entry_point: "VMProtectActivateLicense", code: 77 }
        );
        assert_eq!(
            deactivate_license("SERIAL").unwrap_err(),
            ProtectionError::UnknownActivationStatus { entry_point: "VMProtectDeactivateLicense", code: -3 }
        );
    }

    #[test]
    fn test_ok_with_empty_serial_keeps_the_accepted_status() {
        stand_in::reset();
        stand_in::configure(|s| {
            s.activations.insert("CODE".to_string(), ScriptedReply::Granted(String::new()));
        });
        let err = activate_license("CODE").unwrap_err();
        assert_eq!(
            err,
            ProtectionError::EmptyReply { entry_point: "VMProtectActivateLicense", status: ActivationStatus::Ok }
        );
        assert_eq!(stand_in::inspect(|s| s.activation_calls), 1, "the accepted request is not repeated");
    }

    #[test]
    fn test_deactivation_returns_status_only() {
        stand_in::reset();
        stand_in::configure(|s| {
            s.deactivations.insert("SERIAL".to_string(), ffi::ACTIVATION_OK);
            s.deactivations.insert("BANNED".to_string(), ffi::ACTIVATION_BANNED);
        });
        assert_eq!(deactivate_license("SERIAL").unwrap(), ActivationStatus::Ok);
        assert_eq!(deactivate_license("BANNED").unwrap(), ActivationStatus::Banned);
        assert_eq!(deactivate_license("OTHER").unwrap(), ActivationStatus::NotAvailable);
    }

    #[test]
    fn test_offline_blobs() {
        stand_in::reset();
        let blob = "QUNUSVZBVEU=".repeat(40);
        stand_in::configure(|s| {
            s.offline_activations.insert("CODE".to_string(), ScriptedReply::Granted(blob.clone()));
            s.offline_deactivations
                .insert("SERIAL".to_string(), ScriptedReply::Status(ffi::ACTIVATION_SERIAL_UNKNOWN));
        });

        let reply = offline_activation_string("CODE").unwrap();
        assert!(blob.len() > SERIAL_CAPACITY, "offline blobs use the larger buffer");
        assert_eq!(reply.into_payload(), Some(blob));

        let reply = offline_deactivation_string("SERIAL").unwrap();
        assert_eq!(reply, ActivationReply::Denied(ActivationStatus::SerialUnknown));
    }

    #[test]
    fn test_code_with_nul_is_rejected_before_the_call() {
        stand_in::reset();
        let err = offline_activation_string("AB\0C").unwrap_err();
        assert_eq!(err, ProtectionError::InteriorNul { argument: "code", position: 2 });
        assert_eq!(stand_in::inspect(|s| s.activation_calls), 0);
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(ActivationStatus::AlreadyUsed.to_string(), "activation code was already used");
        assert!(ActivationStatus::Ok.is_ok());
        assert!(!ActivationStatus::Expired.is_ok());
    }
}
