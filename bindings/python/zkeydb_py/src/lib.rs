//! Python bindings for zkeydb.
//!
//! Exposes the session core as a `zkeydb.KeyDb` class with the historic
//! `py_zcrypto` method surface, and a structured `GSKError` exception
//! carrying the native `(code, message)` pair.

use pyo3::create_exception;
use pyo3::exceptions::{PyIOError, PyOSError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;
use std::sync::Arc;
use zkeydb_core::{KdbError, Session};

/// Library version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

create_exception!(
    zkeydb,
    GSKError,
    PyOSError,
    "Native certificate-management failure; args are (code, message)."
);

/// Maps a core error onto the Python exception hierarchy.
fn to_py_err(err: KdbError) -> PyErr {
    match err {
        KdbError::Native { code, message } => GSKError::new_err((code, message)),
        KdbError::InvalidState { .. } => PyRuntimeError::new_err(err.to_string()),
        KdbError::Io(io) => PyIOError::new_err(io.to_string()),
        KdbError::InvalidArgument { .. } => PyValueError::new_err(err.to_string()),
    }
}

#[cfg(feature = "gskit")]
fn default_backend() -> Arc<dyn zkeydb_native::GskBackend> {
    Arc::new(zkeydb_native::GskKit::new())
}

#[cfg(not(feature = "gskit"))]
fn default_backend() -> Arc<dyn zkeydb_native::GskBackend> {
    Arc::new(zkeydb_native::InMemoryGsk::new())
}

/// Session over one key database or SAF key ring.
#[pyclass]
pub struct KeyDb {
    inner: Session,
}

#[pymethods]
impl KeyDb {
    /// Creates an unopened session.
    #[new]
    fn new() -> Self {
        Self {
            inner: Session::new(default_backend()),
        }
    }

    /// Opens a SAF digital certificate key ring or z/OS PKCS #11 token.
    ///
    /// Args:
    ///     ring_name: the SAF key ring or z/OS PKCS #11 token name.
    fn open_key_ring(&mut self, ring_name: &str) -> PyResult<()> {
        self.inner.open_key_ring(ring_name).map_err(to_py_err)
    }

    /// Creates a key database.
    ///
    /// Args:
    ///     filename: database filename, at most 251 characters.
    ///     password: database password.
    ///     record_length: database record length, minimum 2500;
    ///         0 selects the default of 5000.
    ///     pwd_expiration: password expiration as seconds since the
    ///         POSIX epoch; 0 means the password does not expire.
    #[pyo3(name = "create_KDB", signature = (filename, password, record_length=0, pwd_expiration=0))]
    fn create_kdb(
        &mut self,
        filename: &str,
        password: &str,
        record_length: i32,
        pwd_expiration: i64,
    ) -> PyResult<()> {
        self.inner
            .create_database(filename, password, record_length, pwd_expiration)
            .map_err(to_py_err)
    }

    /// Opens a key database read-write.
    ///
    /// Args:
    ///     filename: database filename, at most 251 characters.
    ///     password: database password.
    #[pyo3(name = "open_KDB")]
    fn open_kdb(&mut self, filename: &str, password: &str) -> PyResult<()> {
        self.inner.open_database(filename, password).map_err(to_py_err)
    }

    /// Imports a certificate and associated private key.
    ///
    /// Args:
    ///     filename: PKCS #12 file to import from.
    ///     password: password of the imported file.
    ///     label: label for the new database record.
    fn import_key(&mut self, filename: &str, password: &str, label: &str) -> PyResult<()> {
        self.inner.import_key(filename, password, label).map_err(to_py_err)
    }

    /// Exports a certificate and its private key to a PKCS #12 file.
    ///
    /// Args:
    ///     filename: destination file, written binary-tagged.
    ///     password: password for the exported file.
    ///     label: label of the database record.
    fn export_key_to_file(
        &mut self,
        filename: &str,
        password: &str,
        label: &str,
    ) -> PyResult<()> {
        self.inner
            .export_key_to_file(filename, password, label)
            .map_err(to_py_err)
    }

    /// Exports a certificate to a DER file.
    ///
    /// Args:
    ///     filename: destination file, written binary-tagged.
    ///     label: label of the database record.
    fn export_cert_to_file(&mut self, filename: &str, label: &str) -> PyResult<()> {
        self.inner.export_cert_to_file(filename, label).map_err(to_py_err)
    }

    /// Exports a certificate and its private key as PKCS #12 bytes.
    ///
    /// Args:
    ///     password: password for the exported container.
    ///     label: label of the database record.
    fn export_key_to_buffer<'py>(
        &mut self,
        py: Python<'py>,
        password: &str,
        label: &str,
    ) -> PyResult<Bound<'py, PyBytes>> {
        self.inner
            .export_key_to_buffer(password, label)
            .map(|bytes| PyBytes::new(py, &bytes))
            .map_err(to_py_err)
    }

    /// Exports a certificate as DER bytes.
    ///
    /// Args:
    ///     label: label of the database record.
    fn export_cert_to_buffer<'py>(
        &mut self,
        py: Python<'py>,
        label: &str,
    ) -> PyResult<Bound<'py, PyBytes>> {
        self.inner
            .export_cert_to_buffer(label)
            .map(|bytes| PyBytes::new(py, &bytes))
            .map_err(to_py_err)
    }

    /// Closes the database or ring.
    fn close_database(&mut self) -> PyResult<()> {
        self.inner.close().map_err(to_py_err)
    }

    /// Returns the message text for a native error code.
    ///
    /// Args:
    ///     error: integer error number.
    fn get_error_string(&self, error: i32) -> String {
        self.inner.error_string(error)
    }

    fn __repr__(&self) -> String {
        format!("KeyDb(state={})", self.inner.state())
    }
}

/// Python module initialization.
#[pymodule]
fn zkeydb(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<KeyDb>()?;
    m.add("GSKError", m.py().get_type::<GSKError>())?;
    m.add_function(wrap_pyfunction!(version, m)?)?;
    Ok(())
}

/// Returns the zkeydb library version.
#[pyfunction]
fn version() -> &'static str {
    VERSION
}
