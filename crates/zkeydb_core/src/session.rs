//! The key-database / key-ring session state machine.

use crate::buffer::ExportGuard;
use crate::codec::TranscodedString;
use crate::error::{self, KdbError, KdbResult};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use zkeydb_native::{filetag, GskBackend, RawHandle, ReturnCode};

/// Maximum filename length in bytes accepted by the native library.
pub const MAX_FILENAME_LEN: usize = 251;

/// Minimum record length for a new key database.
pub const MIN_RECORD_LENGTH: i32 = 2500;

/// Record length used when the caller passes 0.
pub const DEFAULT_RECORD_LENGTH: i32 = 5000;

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No database or ring has been opened yet.
    Unopened,
    /// A database or ring is open; data operations are available.
    Open,
    /// The session is closed. Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unopened => f.write_str("unopened"),
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// A session against one key database or SAF key ring.
///
/// A session owns at most one live native handle and serializes all
/// operations against it: every operation takes `&mut self`, runs one
/// bounded synchronous native call, and transcodes inputs and outputs
/// around it. Lifecycle:
///
/// ```text
/// Unopened ──create_database/open_database/open_key_ring──► Open
///     Open ──close (or drop)──► Closed (terminal)
/// ```
///
/// Data operations require `Open` and fail with
/// [`KdbError::InvalidState`] otherwise, without touching the native
/// handle. Independent sessions may share one backend; the backend is
/// process-wide state the way the native library itself is.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use zkeydb_core::Session;
/// use zkeydb_native::InMemoryGsk;
///
/// let gsk = Arc::new(InMemoryGsk::new());
/// let mut session = Session::new(gsk);
/// session.create_database("/tmp/keys.kdb", "Passw0rd!", 0, 0)?;
/// session.close()?;
/// # Ok::<(), zkeydb_core::KdbError>(())
/// ```
pub struct Session {
    backend: Arc<dyn GskBackend>,
    state: SessionState,
    handle: Option<RawHandle>,
}

impl Session {
    /// Creates an unopened session over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn GskBackend>) -> Self {
        Self {
            backend,
            state: SessionState::Unopened,
            handle: None,
        }
    }

    /// The session's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn require_unopened(&self) -> KdbResult<()> {
        if self.state == SessionState::Unopened {
            Ok(())
        } else {
            Err(KdbError::invalid_state(SessionState::Unopened, self.state))
        }
    }

    fn require_open(&self) -> KdbResult<RawHandle> {
        match (self.state, self.handle) {
            (SessionState::Open, Some(handle)) => Ok(handle),
            _ => Err(KdbError::invalid_state(SessionState::Open, self.state)),
        }
    }

    fn check_filename(filename: &str) -> KdbResult<()> {
        if filename.len() > MAX_FILENAME_LEN {
            return Err(KdbError::invalid_argument(format!(
                "filename is {} bytes, maximum is {MAX_FILENAME_LEN}",
                filename.len()
            )));
        }
        Ok(())
    }

    fn map_rc(&self, code: ReturnCode) -> KdbError {
        error::map_native(self.backend.as_ref(), code)
    }

    /// Opens a SAF key ring or z/OS PKCS #11 token by name.
    ///
    /// Requires `Unopened`; on success the session is `Open`.
    pub fn open_key_ring(&mut self, ring_name: &str) -> KdbResult<()> {
        self.require_unopened()?;
        let ring = TranscodedString::new(ring_name);
        let (handle, num_records) = self
            .backend
            .open_keyring(ring.as_bytes())
            .map_err(|rc| self.map_rc(rc))?;
        debug!(ring_name, num_records, "key ring opened");
        self.handle = Some(handle);
        self.state = SessionState::Open;
        Ok(())
    }

    /// Creates a new key database and leaves it open.
    ///
    /// `record_length` 0 selects the default of
    /// [`DEFAULT_RECORD_LENGTH`]; other values below
    /// [`MIN_RECORD_LENGTH`] are rejected. `expiration` is the password
    /// expiration as seconds since the POSIX epoch, 0 meaning never.
    /// Requires `Unopened`; on success the session is `Open`.
    pub fn create_database(
        &mut self,
        filename: &str,
        password: &str,
        record_length: i32,
        expiration: i64,
    ) -> KdbResult<()> {
        self.require_unopened()?;
        Self::check_filename(filename)?;
        let record_length = match record_length {
            0 => DEFAULT_RECORD_LENGTH,
            n if n < MIN_RECORD_LENGTH => {
                return Err(KdbError::invalid_argument(format!(
                    "record length {n} is below the minimum of {MIN_RECORD_LENGTH}"
                )));
            }
            n => n,
        };

        let filename_e = TranscodedString::new(filename);
        let password_e = TranscodedString::new(password);
        let handle = self
            .backend
            .create_database(
                filename_e.as_bytes(),
                password_e.as_bytes(),
                record_length,
                expiration,
            )
            .map_err(|rc| self.map_rc(rc))?;
        debug!(filename, record_length, "key database created");
        self.handle = Some(handle);
        self.state = SessionState::Open;
        Ok(())
    }

    /// Opens an existing key database read-write.
    ///
    /// Requires `Unopened`; on success the session is `Open`.
    pub fn open_database(&mut self, filename: &str, password: &str) -> KdbResult<()> {
        self.require_unopened()?;
        Self::check_filename(filename)?;
        let filename_e = TranscodedString::new(filename);
        let password_e = TranscodedString::new(password);
        let (handle, db_type, num_records) = self
            .backend
            .open_database(filename_e.as_bytes(), password_e.as_bytes(), true)
            .map_err(|rc| self.map_rc(rc))?;
        debug!(filename, ?db_type, num_records, "key database opened");
        self.handle = Some(handle);
        self.state = SessionState::Open;
        Ok(())
    }

    /// Imports a certificate and private key from a PKCS #12 file,
    /// storing them under `label`.
    ///
    /// The source file is fully buffered before the native call; a read
    /// failure is reported as [`KdbError::Io`], distinct from native
    /// failures. Requires `Open`.
    pub fn import_key(&mut self, filename: &str, password: &str, label: &str) -> KdbResult<()> {
        let handle = self.require_open()?;
        Self::check_filename(filename)?;
        let data = fs::read(filename)?;
        let password_e = TranscodedString::new(password);
        let label_e = TranscodedString::new(label);
        self.backend
            .import_key(handle, label_e.as_bytes(), password_e.as_bytes(), &data)
            .map_err(|rc| self.map_rc(rc))?;
        debug!(label, bytes = data.len(), "key imported");
        Ok(())
    }

    /// Exports the certificate and private key under `label` as a
    /// password-encrypted PKCS #12 file.
    ///
    /// The destination is written as binary and tagged as binary content.
    /// Requires `Open`.
    pub fn export_key_to_file(
        &mut self,
        filename: &str,
        password: &str,
        label: &str,
    ) -> KdbResult<()> {
        let handle = self.require_open()?;
        Self::check_filename(filename)?;
        let password_e = TranscodedString::new(password);
        let label_e = TranscodedString::new(label);
        let buffer = self
            .backend
            .export_key(handle, label_e.as_bytes(), password_e.as_bytes())
            .map_err(|rc| self.map_rc(rc))?;
        let guard = ExportGuard::new(self.backend.as_ref(), buffer);
        write_binary_file(filename.as_ref(), guard.as_bytes())?;
        debug!(label, filename, "key exported to file");
        Ok(())
    }

    /// Exports the certificate under `label` as a DER file.
    ///
    /// The destination is written as binary and tagged as binary content.
    /// Requires `Open`.
    pub fn export_cert_to_file(&mut self, filename: &str, label: &str) -> KdbResult<()> {
        let handle = self.require_open()?;
        Self::check_filename(filename)?;
        let label_e = TranscodedString::new(label);
        let buffer = self
            .backend
            .export_certificate(handle, label_e.as_bytes())
            .map_err(|rc| self.map_rc(rc))?;
        let guard = ExportGuard::new(self.backend.as_ref(), buffer);
        write_binary_file(filename.as_ref(), guard.as_bytes())?;
        debug!(label, filename, "certificate exported to file");
        Ok(())
    }

    /// Exports the certificate and private key under `label` as a
    /// password-encrypted PKCS #12 container in memory.
    ///
    /// Requires `Open`. The returned bytes are an independent copy; the
    /// transient native buffer is released before returning.
    pub fn export_key_to_buffer(&mut self, password: &str, label: &str) -> KdbResult<Vec<u8>> {
        let handle = self.require_open()?;
        let password_e = TranscodedString::new(password);
        let label_e = TranscodedString::new(label);
        let buffer = self
            .backend
            .export_key(handle, label_e.as_bytes(), password_e.as_bytes())
            .map_err(|rc| self.map_rc(rc))?;
        Ok(ExportGuard::new(self.backend.as_ref(), buffer).into_bytes())
    }

    /// Exports the certificate under `label` as DER bytes in memory.
    ///
    /// Requires `Open`. The returned bytes are an independent copy; the
    /// transient native buffer is released before returning.
    pub fn export_cert_to_buffer(&mut self, label: &str) -> KdbResult<Vec<u8>> {
        let handle = self.require_open()?;
        let label_e = TranscodedString::new(label);
        let buffer = self
            .backend
            .export_certificate(handle, label_e.as_bytes())
            .map_err(|rc| self.map_rc(rc))?;
        Ok(ExportGuard::new(self.backend.as_ref(), buffer).into_bytes())
    }

    /// Closes the native handle.
    ///
    /// Requires `Open`; on success the session is `Closed` (terminal).
    /// On native failure the session stays `Open` with its handle intact.
    pub fn close(&mut self) -> KdbResult<()> {
        let handle = self.require_open()?;
        self.backend
            .close_database(handle)
            .map_err(|rc| self.map_rc(rc))?;
        debug!("session closed");
        self.handle = None;
        self.state = SessionState::Closed;
        Ok(())
    }

    /// Resolves the message text for a native return code.
    ///
    /// Available in any state; never returns an empty string, even for
    /// zero or unknown codes.
    #[must_use]
    pub fn error_string(&self, code: ReturnCode) -> String {
        error::native_message(self.backend.as_ref(), code)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Open {
            if let Some(handle) = self.handle.take() {
                if let Err(code) = self.backend.close_database(handle) {
                    warn!(code, "failed to close native handle on drop");
                }
            }
            self.state = SessionState::Closed;
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Writes exported bytes and tags the destination as binary content.
fn write_binary_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)?;
    filetag::tag_binary(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkeydb_native::InMemoryGsk;

    fn session() -> (Arc<InMemoryGsk>, Session) {
        let gsk = Arc::new(InMemoryGsk::new());
        let s = Session::new(gsk.clone());
        (gsk, s)
    }

    #[test]
    fn new_session_is_unopened() {
        let (_, s) = session();
        assert_eq!(s.state(), SessionState::Unopened);
    }

    #[test]
    fn create_applies_default_record_length() {
        let (gsk, mut s) = session();
        s.create_database("/tmp/a.kdb", "pw", 0, 0).unwrap();
        assert_eq!(gsk.database_record_length("/tmp/a.kdb"), Some(5000));
    }

    #[test]
    fn create_rejects_short_record_length() {
        let (gsk, mut s) = session();
        let err = s.create_database("/tmp/a.kdb", "pw", 100, 0).unwrap_err();
        assert!(matches!(err, KdbError::InvalidArgument { .. }));
        // Rejected before any native call.
        assert!(!gsk.has_database("/tmp/a.kdb"));
        assert_eq!(s.state(), SessionState::Unopened);
    }

    #[test]
    fn create_accepts_minimum_record_length() {
        let (gsk, mut s) = session();
        s.create_database("/tmp/a.kdb", "pw", 2500, 0).unwrap();
        assert_eq!(gsk.database_record_length("/tmp/a.kdb"), Some(2500));
    }

    #[test]
    fn long_filename_rejected_before_native_call() {
        let (gsk, mut s) = session();
        s.create_database("/tmp/a.kdb", "pw", 0, 0).unwrap();

        let long_name = format!("/tmp/{}.p12", "x".repeat(300));
        let err = s.export_key_to_file(&long_name, "pw", "label1").unwrap_err();
        assert!(matches!(err, KdbError::InvalidArgument { .. }));
        assert_eq!(gsk.buffer_audit().allocated, 0);
    }

    #[test]
    fn second_open_on_same_session_fails() {
        let (_, mut s) = session();
        s.create_database("/tmp/a.kdb", "pw", 0, 0).unwrap();
        let err = s.open_database("/tmp/a.kdb", "pw").unwrap_err();
        assert!(matches!(
            err,
            KdbError::InvalidState {
                required: SessionState::Unopened,
                actual: SessionState::Open,
            }
        ));
        assert_eq!(s.state(), SessionState::Open);
    }

    #[test]
    fn data_operations_require_open() {
        let (_, mut s) = session();
        let err = s.export_cert_to_buffer("label1").unwrap_err();
        assert!(matches!(
            err,
            KdbError::InvalidState {
                required: SessionState::Open,
                actual: SessionState::Unopened,
            }
        ));
        assert_eq!(s.state(), SessionState::Unopened);
    }

    #[test]
    fn close_is_terminal() {
        let (_, mut s) = session();
        s.create_database("/tmp/a.kdb", "Passw0rd!", 2500, 0).unwrap();
        assert_eq!(s.state(), SessionState::Open);
        s.close().unwrap();
        assert_eq!(s.state(), SessionState::Closed);

        let err = s.export_cert_to_buffer("label1").unwrap_err();
        assert!(matches!(
            err,
            KdbError::InvalidState {
                actual: SessionState::Closed,
                ..
            }
        ));
        // A closed session cannot be reopened either.
        assert!(s.open_database("/tmp/a.kdb", "Passw0rd!").is_err());
        assert_eq!(s.state(), SessionState::Closed);
    }

    #[test]
    fn drop_closes_open_handle() {
        let (gsk, mut s) = session();
        s.create_database("/tmp/a.kdb", "pw", 0, 0).unwrap();
        assert_eq!(gsk.open_handles(), 1);
        drop(s);
        assert_eq!(gsk.open_handles(), 0);
    }

    #[test]
    fn native_failure_maps_to_structured_error() {
        let (_, mut s) = session();
        let err = s.open_database("/missing.kdb", "pw").unwrap_err();
        match err {
            KdbError::Native { code, message } => {
                assert_ne!(code, 0);
                assert_eq!(message, "Key database file not found");
            }
            other => panic!("expected native error, got {other:?}"),
        }
        assert_eq!(s.state(), SessionState::Unopened);
    }

    #[test]
    fn error_string_works_in_any_state() {
        let (_, mut s) = session();
        assert!(!s.error_string(0).is_empty());
        assert!(!s.error_string(987_654).is_empty());

        s.create_database("/tmp/a.kdb", "pw", 0, 0).unwrap();
        s.close().unwrap();
        assert!(!s.error_string(0).is_empty());
    }
}
