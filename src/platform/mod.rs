//! Platform-specific implementations.
//!
//! Only Linux has a real backend. Other targets build, but every
//! constructor reports [`Error::NotSupported`](crate::Error::NotSupported).

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::*;

#[cfg(not(target_os = "linux"))]
mod stub;
#[cfg(not(target_os = "linux"))]
pub use stub::*;
