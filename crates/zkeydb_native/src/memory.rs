//! In-memory backend emulator for testing.

use crate::backend::{DatabaseType, GskBackend, RawHandle, TextMode};
use crate::buffer::NativeBuffer;
use crate::ebcdic;
use crate::rc::{self, NativeResult, ReturnCode};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Magic prefix of the emulator's stand-in PKCS #12 container.
const P12_MAGIC: &[u8; 6] = b"ZKP12\x01";

/// Allocation counters for transient buffers.
///
/// Every buffer handed out by the emulator is tracked until it is released;
/// tests use these counters to prove the exactly-once release invariant on
/// both success and failure paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferAudit {
    /// Buffers handed out by export calls.
    pub allocated: u64,
    /// Buffers released through `free_buffer`.
    pub freed: u64,
    /// Releases of buffers that were not outstanding.
    pub double_frees: u64,
}

#[derive(Debug, Clone)]
struct KeyRecord {
    certificate: Vec<u8>,
    private_key: Option<Vec<u8>>,
}

#[derive(Debug)]
struct KeyDatabase {
    password: Vec<u8>,
    record_length: i32,
    #[allow(dead_code)] // Retained but not interpreted by the emulator.
    expiration: i64,
    records: BTreeMap<Vec<u8>, KeyRecord>,
}

#[derive(Debug)]
enum HandleTarget {
    Database(Vec<u8>),
    Ring(Vec<u8>),
}

#[derive(Debug, Default)]
struct State {
    text_mode: Option<TextMode>,
    next_handle: u64,
    next_buffer: u64,
    databases: HashMap<Vec<u8>, KeyDatabase>,
    rings: HashMap<Vec<u8>, BTreeMap<Vec<u8>, KeyRecord>>,
    handles: HashMap<RawHandle, HandleTarget>,
    outstanding: HashSet<u64>,
    audit: BufferAudit,
}

/// An in-memory emulation of the native certificate-management library.
///
/// This backend keeps key databases and rings in memory and is suitable
/// for:
/// - Unit and integration tests of the session core
/// - Running the Python binding without a z/OS link environment
///
/// It honors the native calling convention (EBCDIC NUL-terminated strings,
/// integer return codes, caller-released buffers) and produces stand-in
/// PKCS #12 containers and DER streams that round-trip through its own
/// import/export calls.
///
/// # Example
///
/// ```rust
/// use zkeydb_native::InMemoryGsk;
///
/// let gsk = InMemoryGsk::new();
/// gsk.add_ring("RING01");
/// assert_eq!(gsk.open_handles(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGsk {
    state: Mutex<State>,
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes.split_last() {
        Some((0, rest)) => rest,
        _ => bytes,
    }
}

fn to_ebcdic(s: &str) -> Vec<u8> {
    let mut bytes = s.as_bytes().to_vec();
    ebcdic::a2e(&mut bytes);
    bytes
}

fn put_chunk(out: &mut Vec<u8>, chunk: &[u8]) {
    out.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk);
}

fn get_chunk<'a>(data: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let len_end = pos.checked_add(4)?;
    let len = u32::from_be_bytes(data.get(*pos..len_end)?.try_into().ok()?) as usize;
    let end = len_end.checked_add(len)?;
    let chunk = data.get(len_end..end)?;
    *pos = end;
    Some(chunk)
}

impl InMemoryGsk {
    /// Creates an empty emulator with no databases or rings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an (empty) SAF key ring under `name`.
    pub fn add_ring(&self, name: &str) {
        let mut state = self.state.lock();
        state.rings.entry(to_ebcdic(name)).or_default();
    }

    /// Places a record on a ring, creating the ring if needed.
    ///
    /// Useful for testing exports from access-control-managed rings that
    /// cannot be populated through the import API.
    pub fn add_ring_record(
        &self,
        ring: &str,
        label: &str,
        certificate: &[u8],
        private_key: Option<&[u8]>,
    ) {
        let mut state = self.state.lock();
        state.rings.entry(to_ebcdic(ring)).or_default().insert(
            to_ebcdic(label),
            KeyRecord {
                certificate: certificate.to_vec(),
                private_key: private_key.map(<[u8]>::to_vec),
            },
        );
    }

    /// Builds a stand-in PKCS #12 container the emulator's import call
    /// accepts. The password is recoded to EBCDIC, matching what an
    /// importing session supplies after transcoding.
    #[must_use]
    pub fn encode_pkcs12(certificate: &[u8], private_key: &[u8], password: &str) -> Vec<u8> {
        let mut out = P12_MAGIC.to_vec();
        put_chunk(&mut out, &to_ebcdic(password));
        put_chunk(&mut out, certificate);
        put_chunk(&mut out, private_key);
        out
    }

    /// Current buffer allocation counters.
    #[must_use]
    pub fn buffer_audit(&self) -> BufferAudit {
        self.state.lock().audit
    }

    /// Number of buffers handed out but not yet released.
    #[must_use]
    pub fn outstanding_buffers(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    /// Number of live database/ring handles.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.state.lock().handles.len()
    }

    /// Whether a database exists under `filename`.
    #[must_use]
    pub fn has_database(&self, filename: &str) -> bool {
        self.state.lock().databases.contains_key(&to_ebcdic(filename))
    }

    /// The record length a database was created with, if it exists.
    #[must_use]
    pub fn database_record_length(&self, filename: &str) -> Option<i32> {
        self.state
            .lock()
            .databases
            .get(&to_ebcdic(filename))
            .map(|db| db.record_length)
    }

    fn mint_handle(state: &mut State, target: HandleTarget) -> RawHandle {
        state.next_handle += 1;
        let handle = RawHandle::new(state.next_handle);
        state.handles.insert(handle, target);
        handle
    }

    fn alloc_buffer(state: &mut State, data: Vec<u8>) -> NativeBuffer {
        state.next_buffer += 1;
        let id = state.next_buffer;
        state.outstanding.insert(id);
        state.audit.allocated += 1;
        NativeBuffer::new(id, data)
    }

    fn parse_container(data: &[u8]) -> Option<(Vec<u8>, Vec<u8>, Vec<u8>)> {
        let body = data.strip_prefix(P12_MAGIC.as_slice())?;
        let mut pos = 0;
        let password = get_chunk(body, &mut pos)?.to_vec();
        let certificate = get_chunk(body, &mut pos)?.to_vec();
        let private_key = get_chunk(body, &mut pos)?.to_vec();
        if pos == body.len() {
            Some((password, certificate, private_key))
        } else {
            None
        }
    }

    fn record_for<'a>(
        state: &'a mut State,
        handle: RawHandle,
        label: &[u8],
    ) -> Result<&'a KeyRecord, ReturnCode> {
        let records = Self::records_for(state, handle)?;
        records
            .get(trim_nul(label))
            .ok_or(rc::GSK_ERR_RECORD_NOT_FOUND)
    }

    fn records_for<'a>(
        state: &'a mut State,
        handle: RawHandle,
    ) -> Result<&'a mut BTreeMap<Vec<u8>, KeyRecord>, ReturnCode> {
        // Borrow-split: resolve the target key first, then the store.
        let target = match state.handles.get(&handle) {
            Some(HandleTarget::Database(name)) => HandleTarget::Database(name.clone()),
            Some(HandleTarget::Ring(name)) => HandleTarget::Ring(name.clone()),
            None => return Err(rc::GSK_ERR_BAD_HANDLE),
        };
        match target {
            HandleTarget::Database(name) => state
                .databases
                .get_mut(&name)
                .map(|db| &mut db.records)
                .ok_or(rc::GSK_ERR_BAD_HANDLE),
            HandleTarget::Ring(name) => {
                state.rings.get_mut(&name).ok_or(rc::GSK_ERR_BAD_HANDLE)
            }
        }
    }
}

impl GskBackend for InMemoryGsk {
    fn open_keyring(&self, ring_name: &[u8]) -> NativeResult<(RawHandle, i32)> {
        let mut state = self.state.lock();
        let name = trim_nul(ring_name).to_vec();
        let count = match state.rings.get(&name) {
            Some(records) => records.len() as i32,
            None => return Err(rc::GSK_ERR_KEYRING_OPEN_FAILED),
        };
        let handle = Self::mint_handle(&mut state, HandleTarget::Ring(name));
        Ok((handle, count))
    }

    fn create_database(
        &self,
        filename: &[u8],
        password: &[u8],
        record_length: i32,
        expiration: i64,
    ) -> NativeResult<RawHandle> {
        let mut state = self.state.lock();
        let name = trim_nul(filename).to_vec();
        if state.databases.contains_key(&name) {
            return Err(rc::GSK_ERR_KEYFILE_EXISTS);
        }
        state.databases.insert(
            name.clone(),
            KeyDatabase {
                password: trim_nul(password).to_vec(),
                record_length,
                expiration,
                records: BTreeMap::new(),
            },
        );
        Ok(Self::mint_handle(&mut state, HandleTarget::Database(name)))
    }

    fn open_database(
        &self,
        filename: &[u8],
        password: &[u8],
        _update: bool,
    ) -> NativeResult<(RawHandle, DatabaseType, i32)> {
        let mut state = self.state.lock();
        let name = trim_nul(filename).to_vec();
        let count = match state.databases.get(&name) {
            Some(db) if db.password == trim_nul(password) => db.records.len() as i32,
            Some(_) => return Err(rc::GSK_ERR_BAD_PASSWORD),
            None => return Err(rc::GSK_ERR_KEYFILE_NOT_FOUND),
        };
        let handle = Self::mint_handle(&mut state, HandleTarget::Database(name));
        Ok((handle, DatabaseType::Key, count))
    }

    fn import_key(
        &self,
        handle: RawHandle,
        label: &[u8],
        password: &[u8],
        data: &[u8],
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        let (container_password, certificate, private_key) =
            Self::parse_container(data).ok_or(rc::GSK_ERR_BAD_IMPORT_DATA)?;
        if container_password != trim_nul(password) {
            return Err(rc::GSK_ERR_BAD_PASSWORD);
        }
        let records = Self::records_for(&mut state, handle)?;
        let label = trim_nul(label).to_vec();
        if records.contains_key(&label) {
            return Err(rc::GSK_ERR_DUPLICATE_LABEL);
        }
        records.insert(
            label,
            KeyRecord {
                certificate,
                private_key: Some(private_key),
            },
        );
        Ok(())
    }

    fn export_key(
        &self,
        handle: RawHandle,
        label: &[u8],
        password: &[u8],
    ) -> NativeResult<NativeBuffer> {
        let mut state = self.state.lock();
        let record = Self::record_for(&mut state, handle, label)?;
        let private_key = record
            .private_key
            .clone()
            .ok_or(rc::GSK_ERR_NO_PRIVATE_KEY)?;
        let certificate = record.certificate.clone();

        let mut container = P12_MAGIC.to_vec();
        put_chunk(&mut container, trim_nul(password));
        put_chunk(&mut container, &certificate);
        put_chunk(&mut container, &private_key);
        Ok(Self::alloc_buffer(&mut state, container))
    }

    fn export_certificate(&self, handle: RawHandle, label: &[u8]) -> NativeResult<NativeBuffer> {
        let mut state = self.state.lock();
        let der = Self::record_for(&mut state, handle, label)?.certificate.clone();
        Ok(Self::alloc_buffer(&mut state, der))
    }

    fn close_database(&self, handle: RawHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.handles.remove(&handle).is_none() {
            return Err(rc::GSK_ERR_BAD_HANDLE);
        }
        Ok(())
    }

    fn strerror(&self, code: ReturnCode) -> Vec<u8> {
        let mut message = rc::message_for(code).into_bytes();
        // The library formats messages per the current thread mode; the
        // emulator models that process-wide.
        if self.state.lock().text_mode == Some(TextMode::Ebcdic) {
            ebcdic::a2e(&mut message);
        }
        message
    }

    fn swap_text_mode(&self, mode: TextMode) -> TextMode {
        self.state
            .lock()
            .text_mode
            .replace(mode)
            .unwrap_or(TextMode::Ascii)
    }

    fn free_buffer(&self, buffer: &mut NativeBuffer) {
        let mut state = self.state.lock();
        let id = buffer.id();
        drop(buffer.take());
        if state.outstanding.remove(&id) {
            state.audit.freed += 1;
        } else {
            state.audit.double_frees += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(s: &str) -> Vec<u8> {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        ebcdic::a2e(&mut bytes);
        bytes
    }

    #[test]
    fn create_then_open_database() {
        let gsk = InMemoryGsk::new();
        let handle = gsk
            .create_database(&e("/tmp/a.kdb"), &e("secret"), 5000, 0)
            .unwrap();
        gsk.close_database(handle).unwrap();

        let (_, db_type, count) = gsk.open_database(&e("/tmp/a.kdb"), &e("secret"), true).unwrap();
        assert_eq!(db_type, DatabaseType::Key);
        assert_eq!(count, 0);
    }

    #[test]
    fn create_rejects_existing_database() {
        let gsk = InMemoryGsk::new();
        gsk.create_database(&e("/tmp/a.kdb"), &e("pw"), 5000, 0).unwrap();
        let err = gsk
            .create_database(&e("/tmp/a.kdb"), &e("pw"), 5000, 0)
            .unwrap_err();
        assert_eq!(err, rc::GSK_ERR_KEYFILE_EXISTS);
    }

    #[test]
    fn open_rejects_wrong_password() {
        let gsk = InMemoryGsk::new();
        gsk.create_database(&e("/tmp/a.kdb"), &e("right"), 5000, 0).unwrap();
        let err = gsk
            .open_database(&e("/tmp/a.kdb"), &e("wrong"), true)
            .unwrap_err();
        assert_eq!(err, rc::GSK_ERR_BAD_PASSWORD);
    }

    #[test]
    fn open_missing_database_fails() {
        let gsk = InMemoryGsk::new();
        let err = gsk.open_database(&e("/nope.kdb"), &e("pw"), true).unwrap_err();
        assert_eq!(err, rc::GSK_ERR_KEYFILE_NOT_FOUND);
    }

    #[test]
    fn keyring_must_be_defined() {
        let gsk = InMemoryGsk::new();
        assert_eq!(
            gsk.open_keyring(&e("NOPE")).unwrap_err(),
            rc::GSK_ERR_KEYRING_OPEN_FAILED
        );

        gsk.add_ring("RING01");
        let (_, count) = gsk.open_keyring(&e("RING01")).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn import_export_round_trip() {
        let gsk = InMemoryGsk::new();
        let handle = gsk
            .create_database(&e("/tmp/a.kdb"), &e("pw"), 5000, 0)
            .unwrap();

        let container = InMemoryGsk::encode_pkcs12(b"CERT", b"KEY", "p12pw");
        gsk.import_key(handle, &e("label1"), &e("p12pw"), &container)
            .unwrap();

        let mut cert = gsk.export_certificate(handle, &e("label1")).unwrap();
        assert_eq!(cert.as_bytes(), b"CERT");
        gsk.free_buffer(&mut cert);

        let mut key = gsk.export_key(handle, &e("label1"), &e("otherpw")).unwrap();
        let (password, certificate, private_key) =
            InMemoryGsk::parse_container(key.as_bytes()).unwrap();
        assert_eq!(password, trim_nul(&e("otherpw")));
        assert_eq!(certificate, b"CERT");
        assert_eq!(private_key, b"KEY");
        gsk.free_buffer(&mut key);

        let audit = gsk.buffer_audit();
        assert_eq!(audit.allocated, 2);
        assert_eq!(audit.freed, 2);
        assert_eq!(audit.double_frees, 0);
        assert_eq!(gsk.outstanding_buffers(), 0);
    }

    #[test]
    fn import_rejects_wrong_password_and_garbage() {
        let gsk = InMemoryGsk::new();
        let handle = gsk
            .create_database(&e("/tmp/a.kdb"), &e("pw"), 5000, 0)
            .unwrap();

        let container = InMemoryGsk::encode_pkcs12(b"C", b"K", "good");
        assert_eq!(
            gsk.import_key(handle, &e("l"), &e("bad"), &container).unwrap_err(),
            rc::GSK_ERR_BAD_PASSWORD
        );
        assert_eq!(
            gsk.import_key(handle, &e("l"), &e("good"), b"not a container").unwrap_err(),
            rc::GSK_ERR_BAD_IMPORT_DATA
        );
    }

    #[test]
    fn import_rejects_duplicate_label() {
        let gsk = InMemoryGsk::new();
        let handle = gsk
            .create_database(&e("/tmp/a.kdb"), &e("pw"), 5000, 0)
            .unwrap();
        let container = InMemoryGsk::encode_pkcs12(b"C", b"K", "p");
        gsk.import_key(handle, &e("l"), &e("p"), &container).unwrap();
        assert_eq!(
            gsk.import_key(handle, &e("l"), &e("p"), &container).unwrap_err(),
            rc::GSK_ERR_DUPLICATE_LABEL
        );
    }

    #[test]
    fn export_cert_only_record_has_no_key() {
        let gsk = InMemoryGsk::new();
        gsk.add_ring_record("RING01", "certonly", b"CERT", None);
        let (handle, count) = gsk.open_keyring(&e("RING01")).unwrap();
        assert_eq!(count, 1);

        assert_eq!(
            gsk.export_key(handle, &e("certonly"), &e("pw")).unwrap_err(),
            rc::GSK_ERR_NO_PRIVATE_KEY
        );
        assert_eq!(
            gsk.export_certificate(handle, &e("missing")).unwrap_err(),
            rc::GSK_ERR_RECORD_NOT_FOUND
        );
    }

    #[test]
    fn closed_handle_is_rejected() {
        let gsk = InMemoryGsk::new();
        let handle = gsk
            .create_database(&e("/tmp/a.kdb"), &e("pw"), 5000, 0)
            .unwrap();
        gsk.close_database(handle).unwrap();
        assert_eq!(gsk.close_database(handle).unwrap_err(), rc::GSK_ERR_BAD_HANDLE);
        assert_eq!(
            gsk.export_certificate(handle, &e("l")).unwrap_err(),
            rc::GSK_ERR_BAD_HANDLE
        );
    }

    #[test]
    fn strerror_follows_text_mode() {
        let gsk = InMemoryGsk::new();

        // Default mode is ASCII: text comes back readable as-is.
        let ascii = gsk.strerror(rc::GSK_ERR_BAD_PASSWORD);
        assert_eq!(ascii, b"Key database password is not correct".to_vec());

        let prior = gsk.swap_text_mode(TextMode::Ebcdic);
        assert_eq!(prior, TextMode::Ascii);
        let mut native = gsk.strerror(rc::GSK_ERR_BAD_PASSWORD);
        assert_ne!(native, ascii);
        ebcdic::e2a(&mut native);
        assert_eq!(native, ascii);

        assert_eq!(gsk.swap_text_mode(TextMode::Ascii), TextMode::Ebcdic);
    }

    #[test]
    fn double_free_is_recorded() {
        let gsk = InMemoryGsk::new();
        gsk.add_ring_record("R", "l", b"CERT", None);
        let (handle, _) = gsk.open_keyring(&e("R")).unwrap();
        let mut buf = gsk.export_certificate(handle, &e("l")).unwrap();
        gsk.free_buffer(&mut buf);
        gsk.free_buffer(&mut buf);
        assert_eq!(gsk.buffer_audit().double_frees, 1);
    }
}
