//! Protected-region markers
//!
//! A region starts with one of the `begin_*` calls and ends with [`end`]. The
//! protection tool finds these calls in the compiled image and virtualizes or
//! mutates the code between them; at run time they do nothing else.
//!
//! **Pairing**: `end` closes the most recently opened region. An `end` without
//! a preceding begin, or regions interleaved across threads, are undefined in
//! the SDK and are passed through unchanged. [`ProtectedRegion`] and the
//! [`protect!`](crate::protect) macro keep the pairing correct by construction.

use std::marker::PhantomData;

use super::{ffi, marshal};

/// Which begin entry point opens a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Protection chosen by the project settings of the protection tool.
    Default,
    Virtualization,
    Mutation,
    /// Mutation followed by virtualization.
    Ultra,
    /// Virtualization that only runs with a valid serial installed.
    VirtualizationLockByKey,
    UltraLockByKey,
}

impl RegionKind {
    pub fn entry_point(self) -> &'static str {
        match self {
            RegionKind::Default => "VMProtectBegin",
            RegionKind::Virtualization => "VMProtectBeginVirtualization",
            RegionKind::Mutation => "VMProtectBeginMutation",
            RegionKind::Ultra => "VMProtectBeginUltra",
            RegionKind::VirtualizationLockByKey => "VMProtectBeginVirtualizationLockByKey",
            RegionKind::UltraLockByKey => "VMProtectBeginUltraLockByKey",
        }
    }
}

/// Open a region of the given kind.
pub fn begin_region(kind: RegionKind, marker_name: &str) {
    let name = marshal::marker_name(marker_name);
    log::trace!("{}({} bytes)", kind.entry_point(), name.as_bytes().len());

    let name_ptr = name.as_ptr();
    unsafe {
        match kind {
            RegionKind::Default => ffi::VMProtectBegin(name_ptr),
            RegionKind::Virtualization => ffi::VMProtectBeginVirtualization(name_ptr),
            RegionKind::Mutation => ffi::VMProtectBeginMutation(name_ptr),
            RegionKind::Ultra => ffi::VMProtectBeginUltra(name_ptr),
            RegionKind::VirtualizationLockByKey => ffi::VMProtectBeginVirtualizationLockByKey(name_ptr),
            RegionKind::UltraLockByKey => ffi::VMProtectBeginUltraLockByKey(name_ptr),
        }
    }
    // `name` is dropped here, after the call returned
}

pub fn begin(marker_name: &str) {
    begin_region(RegionKind::Default, marker_name);
}

pub fn begin_virtualization(marker_name: &str) {
    begin_region(RegionKind::Virtualization, marker_name);
}

pub fn begin_mutation(marker_name: &str) {
    begin_region(RegionKind::Mutation, marker_name);
}

pub fn begin_ultra(marker_name: &str) {
    begin_region(RegionKind::Ultra, marker_name);
}

pub fn begin_virtualization_lock_by_key(marker_name: &str) {
    begin_region(RegionKind::VirtualizationLockByKey, marker_name);
}

pub fn begin_ultra_lock_by_key(marker_name: &str) {
    begin_region(RegionKind::UltraLockByKey, marker_name);
}

/// Close the most recently opened region.
pub fn end() {
    log::trace!("VMProtectEnd()");
    unsafe { ffi::VMProtectEnd() }
}

/// Scoped region: opened by [`ProtectedRegion::enter`], closed on drop.
///
/// Not `Send`: a region is closed on the thread that opened it.
#[must_use = "the region ends as soon as the guard is dropped"]
pub struct ProtectedRegion {
    kind: RegionKind,
    _not_send: PhantomData<*const ()>,
}

impl ProtectedRegion {
    pub fn enter(kind: RegionKind, marker_name: &str) -> Self {
        begin_region(kind, marker_name);
        ProtectedRegion {
            kind,
            _not_send: PhantomData,
        }
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }
}

impl Drop for ProtectedRegion {
    fn drop(&mut self) {
        end();
    }
}

/// Run a block inside a protected region and yield its value.
///
/// ```no_run
/// use vmprotect::protect;
///
/// let total = protect!(virtualization "price-check" => {
///     40 + 2
/// });
/// assert_eq!(total, 42);
/// ```
///
/// Kinds: `default`, `virtualization`, `mutation`, `ultra`,
/// `virtualization_lock_by_key`, `ultra_lock_by_key`.
#[macro_export]
macro_rules! protect {
    (default $name:expr => $body:block) => {
        $crate::protect!(@region Default, $name, $body)
    };
    (virtualization $name:expr => $body:block) => {
        $crate::protect!(@region Virtualization, $name, $body)
    };
    (mutation $name:expr => $body:block) => {
        $crate::protect!(@region Mutation, $name, $body)
    };
    (ultra $name:expr => $body:block) => {
        $crate::protect!(@region Ultra, $name, $body)
    };
    (virtualization_lock_by_key $name:expr => $body:block) => {
        $crate::protect!(@region VirtualizationLockByKey, $name, $body)
    };
    (ultra_lock_by_key $name:expr => $body:block) => {
        $crate::protect!(@region UltraLockByKey, $name, $body)
    };
    (@region $kind:ident, $name:expr, $body:block) => {{
        let _region = $crate::protector::markers::ProtectedRegion::enter(
            $crate::protector::markers::RegionKind::$kind,
            $name,
        );
        $body
    }};
}
