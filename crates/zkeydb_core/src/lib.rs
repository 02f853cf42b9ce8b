//! # zkeydb core
//!
//! Session core for key databases and SAF key rings.
//!
//! This crate provides:
//! - [`Session`]: a handle-owning state machine that serializes all
//!   operations against one open database or ring
//! - ASCII↔EBCDIC transcoding around every native call ([`codec`])
//! - Deterministic release of transient native buffers ([`buffer`])
//! - Structured errors mapped from native return codes ([`error`])
//!
//! The native library itself stays behind the
//! [`zkeydb_native::GskBackend`] seam; its certificate formats and
//! algorithms are opaque here.
//!
//! ```rust
//! use std::sync::Arc;
//! use zkeydb_core::{Session, SessionState};
//! use zkeydb_native::InMemoryGsk;
//!
//! let mut session = Session::new(Arc::new(InMemoryGsk::new()));
//! session.create_database("/tmp/test.kdb", "Passw0rd!", 2500, 0)?;
//! assert_eq!(session.state(), SessionState::Open);
//! session.close()?;
//! # Ok::<(), zkeydb_core::KdbError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod codec;
pub mod error;
pub mod session;

pub use buffer::ExportGuard;
pub use codec::TranscodedString;
pub use error::{KdbError, KdbResult};
pub use session::{
    Session, SessionState, DEFAULT_RECORD_LENGTH, MAX_FILENAME_LEN, MIN_RECORD_LENGTH,
};
