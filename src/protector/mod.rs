//! # VMProtect SDK wrappers
//!
//! One submodule per SDK area:
//! - [`markers`]: protected-region begin/end markers and the `protect!` macro
//! - [`environment`]: debugger, virtual-machine and image-integrity probes
//! - [`strings`]: decryption of encrypted literals with owned release
//! - [`licensing`]: serial installation, state and descriptor
//! - [`hardware_id`]: identifier of the current machine
//! - [`activation`]: online and offline activation and deactivation
//!
//! [`ffi`] holds the raw declarations. Every wrapper calls through it and
//! never caches an answer of the native side.

pub mod activation;
pub mod environment;
pub mod ffi;
pub mod hardware_id;
pub mod licensing;
pub mod markers;
mod marshal;
pub mod strings;

#[cfg(vmprotect_stand_in)]
pub mod stand_in;

pub use activation::{
    activate_license, deactivate_license, offline_activation_string, offline_deactivation_string,
    ActivationReply, ActivationStatus,
};
pub use environment::{
    is_debugger_present, is_protected, is_valid_image_crc, is_virtual_machine_present, EnvironmentReport,
};
pub use hardware_id::current_hwid;
pub use licensing::{serial_number_data, serial_number_state, set_serial_number, Date, SerialNumberData, SerialState};
pub use markers::{ProtectedRegion, RegionKind};
pub use strings::{decrypt_string, decrypt_wide, DecryptedString, DecryptedWideString};
