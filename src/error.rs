//! Boundary failures of the binding layer.
//!
//! Outcomes the protection SDK reports on purpose (a blacklisted serial, a
//! banned activation code, a failed data query) are ordinary values and never
//! show up here. This enum only covers the cases where an argument cannot be
//! carried across the call boundary, or where the native side answered outside
//! its documented contract.

use thiserror::Error;

use crate::protector::activation::ActivationStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtectionError {
    /// A string argument cannot become a native string without being cut short.
    #[error("argument `{argument}` contains an interior NUL byte at offset {position}")]
    InteriorNul {
        argument: &'static str,
        position: usize,
    },

    /// A literal handed to a decryption entry point is not terminated.
    #[error("`{argument}` is missing its trailing NUL terminator")]
    MissingTerminator { argument: &'static str },

    #[error("{entry_point} returned status {code}, which is not a documented activation result")]
    UnknownActivationStatus {
        entry_point: &'static str,
        code: i32,
    },

    #[error("{entry_point} returned a null pointer")]
    NullPointer { entry_point: &'static str },

    /// The native side reported `status` but wrote nothing into the output
    /// buffer. The server accepted the request, so the activation code may
    /// already be consumed.
    #[error("{entry_point} reported `{status}` with an empty reply, the activation code may already be consumed")]
    EmptyReply {
        entry_point: &'static str,
        status: ActivationStatus,
    },
}

pub type Result<T> = std::result::Result<T, ProtectionError>;
