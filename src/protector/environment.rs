//! Environment probes answered by the protection SDK.
//!
//! Each probe asks the native library afresh. Nothing is cached: a debugger can
//! attach between two calls.

use super::ffi;

/// True when the running image was processed by the protection tool.
pub fn is_protected() -> bool {
    let protected = unsafe { ffi::VMProtectIsProtected() };
    log::trace!("VMProtectIsProtected() -> {}", protected);
    protected
}

/// Debugger check. `kernel` also looks for kernel-mode debuggers.
pub fn is_debugger_present(kernel: bool) -> bool {
    let present = unsafe { ffi::VMProtectIsDebuggerPresent(kernel) };
    log::trace!("VMProtectIsDebuggerPresent(kernel={}) -> {}", kernel, present);
    present
}

pub fn is_virtual_machine_present() -> bool {
    let present = unsafe { ffi::VMProtectIsVirtualMachinePresent() };
    log::trace!("VMProtectIsVirtualMachinePresent() -> {}", present);
    present
}

/// Integrity of the loaded image as checked by the SDK.
pub fn is_valid_image_crc() -> bool {
    let valid = unsafe { ffi::VMProtectIsValidImageCRC() };
    log::trace!("VMProtectIsValidImageCRC() -> {}", valid);
    valid
}

/// One reading of every probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub protected: bool,
    pub debugger: bool,
    pub kernel_debugger: bool,
    pub virtual_machine: bool,
    pub image_crc_valid: bool,
}

impl EnvironmentReport {
    /// Any debugger, a virtual machine, or a modified image.
    pub fn is_hostile(&self) -> bool {
        self.debugger || self.kernel_debugger || self.virtual_machine || !self.image_crc_valid
    }
}

/// Run every probe once, in a fixed order.
pub fn report() -> EnvironmentReport {
    let report = EnvironmentReport {
        protected: is_protected(),
        debugger: is_debugger_present(false),
        kernel_debugger: is_debugger_present(true),
        virtual_machine: is_virtual_machine_present(),
        image_crc_valid: is_valid_image_crc(),
    };
    log::debug!("environment: {:?}", report);
    report
}
