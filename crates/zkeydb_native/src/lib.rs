//! # zkeydb native seam
//!
//! Low-level interface to the platform's certificate management library
//! (GSKit CMS on z/OS). This crate owns everything that sits below the
//! session core:
//!
//! - The [`GskBackend`] trait, the seam behind which the real library lives
//! - Opaque handles ([`RawHandle`]) and transient buffers ([`NativeBuffer`])
//! - Native return codes and their canonical message table
//! - The ASCII↔EBCDIC byte tables used by the native calling convention
//! - Binary file tagging for exported artifacts
//! - [`InMemoryGsk`], an in-memory emulator for tests
//!
//! Backends are **opaque key stores**: they understand labels, passwords and
//! binary streams, but the session core owns all lifecycle, transcoding and
//! error semantics.

pub mod backend;
pub mod buffer;
pub mod ebcdic;
pub mod filetag;
pub mod memory;
pub mod rc;

#[cfg(feature = "gskit")]
pub mod gskit;

pub use backend::{DatabaseType, GskBackend, RawHandle, TextMode};
pub use buffer::NativeBuffer;
pub use memory::{BufferAudit, InMemoryGsk};
pub use rc::{NativeResult, ReturnCode, GSK_OK};

#[cfg(feature = "gskit")]
pub use gskit::GskKit;
