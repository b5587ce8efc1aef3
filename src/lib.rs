//! # VMProtect SDK bindings
//!
//! Safe wrappers around the VMProtect protection SDK. The native library does
//! all the real work (virtualization, anti-debugging, license cryptography);
//! this crate marshals arguments across the call boundary and turns the
//! results into Rust types.
//!
//! ```no_run
//! use vmprotect::protector::{environment, licensing};
//!
//! let report = environment::report();
//! let state = licensing::set_serial_number("SERIAL-FROM-USER")?;
//! if !report.is_hostile() && state.is_valid() {
//!     if let Some(data) = licensing::serial_number_data() {
//!         println!("licensed to {}", data.user_name);
//!     }
//! }
//! # Ok::<(), vmprotect::ProtectionError>(())
//! ```
//!
//! The default `native` feature links the prebuilt SDK. The `stand-in`
//! feature swaps it for a scriptable in-process replacement used by the tests;
//! it is never part of a default build.

pub mod config;
pub mod error;
pub mod protector;

pub use error::{ProtectionError, Result};
