//! Compile-time configuration of the binding.
//!
//! **Backend selection**: the default `native` Cargo feature links the
//! prebuilt SDK. The `stand-in` feature overrides it and resolves every entry
//! point to the in-process stand-in; `build.rs` turns the choice into the
//! `vmprotect_stand_in` cfg.
//!
//! **Link settings** are read by `build.rs`:
//! - `VMPROTECT_SDK_DIR` - directory holding the SDK import library
//!   (defaults to `<crate>/bin`)
//! - `VMPROTECT_SDK_LIB` - library name override
//!   (defaults to `VMProtectSDK64` on 64-bit targets, `VMProtectSDK32` otherwise)
//!
//! **Buffer capacities** match the fixed native buffers the SDK fills.

/// Name of the SDK library this build was configured for.
pub const SDK_LIBRARY: &str = env!("VMPROTECT_SDK_LIB");

/// True when the crate links the real SDK instead of the stand-in.
pub const NATIVE_LINKED: bool = cfg!(not(vmprotect_stand_in));

/// Hardware-ID buffer, terminator included.
pub const HWID_CAPACITY: usize = 256;

/// Serial buffer filled by online activation, terminator included.
pub const SERIAL_CAPACITY: usize = 256;

/// Offline activation/deactivation blob buffer, terminator included.
pub const OFFLINE_BLOB_CAPACITY: usize = 1024;

/// Size of the packed serial-number descriptor handed to the SDK.
pub const SERIAL_DATA_SIZE: usize = 1296;

/// Human-readable name of the backend the entry points resolve to.
pub fn backend_name() -> &'static str {
    if NATIVE_LINKED {
        SDK_LIBRARY
    } else {
        "stand-in"
    }
}
