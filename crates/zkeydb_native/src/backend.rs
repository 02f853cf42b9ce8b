//! Native backend trait definition.

use crate::buffer::NativeBuffer;
use crate::rc::{NativeResult, ReturnCode};

/// An opaque handle to an open key database or key ring.
///
/// Handles are minted by a backend and are meaningful only to the backend
/// that produced them. The session core owns at most one live handle at a
/// time and is responsible for closing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    /// Wraps a backend-specific handle value.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the backend-specific handle value.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// The kind of database discovered by an open call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    /// A key database holding certificates and private keys.
    Key,
    /// A certificate-request database.
    Request,
}

/// Thread text-encoding mode for native message lookup.
///
/// The native library formats its message text in the mode that is current
/// on the calling thread. Message lookup must run in EBCDIC mode and the
/// prior mode must be restored afterwards; see
/// [`GskBackend::swap_text_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    /// ASCII / enhanced-ASCII mode.
    Ascii,
    /// EBCDIC (platform-native) mode.
    Ebcdic,
}

/// A low-level certificate-management backend.
///
/// Backends are **opaque key stores** in the shape of the GSKit CMS API:
/// they understand filenames, labels, passwords and binary streams, and
/// report outcomes as integer return codes. The session core owns all
/// lifecycle gating, transcoding and error mapping.
///
/// # Calling convention
///
/// - Every string parameter is an **EBCDIC, NUL-terminated** byte slice;
///   callers transcode before crossing this seam, exactly once per call.
/// - Zero return code always means success; methods model this as
///   [`NativeResult`], whose `Err` carries the non-zero code.
/// - Buffers returned by export calls are owned by the backend's allocator
///   and must be released through [`GskBackend::free_buffer`] exactly once.
/// - Handles are not reentrant: no two calls may run concurrently against
///   the same handle.
///
/// # Implementors
///
/// - [`crate::InMemoryGsk`] - in-memory emulator for tests
/// - `GskKit` (feature `gskit`) - the real GSKit CMS library on z/OS
pub trait GskBackend: Send + Sync {
    /// Opens a SAF key ring or PKCS #11 token by name.
    ///
    /// Returns the new handle and the number of records on the ring.
    fn open_keyring(&self, ring_name: &[u8]) -> NativeResult<(RawHandle, i32)>;

    /// Creates a new key database.
    ///
    /// `record_length` is the database record length in bytes;
    /// `expiration` is the password expiration as seconds since the POSIX
    /// epoch, with 0 meaning the password never expires. The database is
    /// left open and its handle returned.
    fn create_database(
        &self,
        filename: &[u8],
        password: &[u8],
        record_length: i32,
        expiration: i64,
    ) -> NativeResult<RawHandle>;

    /// Opens an existing key database.
    ///
    /// `update` requests read-write access. Returns the handle, the
    /// discovered database type and the number of records.
    fn open_database(
        &self,
        filename: &[u8],
        password: &[u8],
        update: bool,
    ) -> NativeResult<(RawHandle, DatabaseType, i32)>;

    /// Imports a certificate and its private key from a PKCS #12 stream,
    /// storing them under `label`.
    fn import_key(
        &self,
        handle: RawHandle,
        label: &[u8],
        password: &[u8],
        data: &[u8],
    ) -> NativeResult<()>;

    /// Exports the certificate and private key stored under `label` as a
    /// binary PKCS #12 V3 container encrypted with
    /// pbeWithSha1And3DesCbc under `password`.
    fn export_key(
        &self,
        handle: RawHandle,
        label: &[u8],
        password: &[u8],
    ) -> NativeResult<NativeBuffer>;

    /// Exports the certificate stored under `label` as binary DER.
    fn export_certificate(&self, handle: RawHandle, label: &[u8]) -> NativeResult<NativeBuffer>;

    /// Closes an open database or ring handle.
    fn close_database(&self, handle: RawHandle) -> NativeResult<()>;

    /// Returns the message text for a return code.
    ///
    /// The bytes are encoded per the thread's current text mode; callers
    /// wanting the canonical EBCDIC text must swap to
    /// [`TextMode::Ebcdic`] first and restore the prior mode afterwards.
    /// Never empty, even for unknown codes.
    fn strerror(&self, rc: ReturnCode) -> Vec<u8>;

    /// Sets the thread text mode, returning the prior mode.
    fn swap_text_mode(&self, mode: TextMode) -> TextMode;

    /// Releases a buffer previously returned by an export call.
    ///
    /// The buffer's contents are gone after this returns. Releasing the
    /// same buffer twice is a caller bug; the emulator records it.
    fn free_buffer(&self, buffer: &mut NativeBuffer);
}
