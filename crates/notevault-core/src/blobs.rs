//! Envelope file store: per-attachment authenticated encryption.
//!
//! Each attachment is stored as `<dir>/<file_id>` with the layout
//!
//! ```text
//! header  = "NVB1" | salt[32] | nonce_prefix[7]
//! segment = AES-256-GCM(blob_key, nonce, plaintext[<=4096], aad = header)
//! nonce   = nonce_prefix[7] | counter (u32 BE) | last_flag (u8)
//! ```
//!
//! The blob key is `HKDF-SHA256(master, salt, "notevault blob v1" || file_id)`,
//! so a blob copied under another id no longer decrypts. The counter rejects
//! reordered segments and the last-segment flag rejects truncation, including
//! truncation exactly at a segment boundary.

use std::fs::{self, File};
use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{random_bytes, KeyMaterial, KEY_LENGTH};
use crate::error::{Result, VaultError};
use crate::fs::{commit_temp, create_temp_for, is_temp_name};

/// Plaintext bytes per segment.
pub const SEGMENT_SIZE: usize = 4096;

const TAG_LEN: usize = 16;
const MAGIC: &[u8; 4] = b"NVB1";
const SALT_LEN: usize = 32;
const NONCE_PREFIX_LEN: usize = 7;
const HKDF_INFO: &[u8] = b"notevault blob v1";

/// Bytes of header preceding the first segment.
pub const HEADER_LEN: usize = MAGIC.len() + SALT_LEN + NONCE_PREFIX_LEN;

const SEALED_SEGMENT_LEN: usize = SEGMENT_SIZE + TAG_LEN;

/// Result of storing one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub file_id: String,
    /// Plaintext length in bytes.
    pub size: u64,
}

/// Directory of encrypted attachments keyed by generated file id.
pub struct EnvelopeFileStore {
    dir: PathBuf,
    master: KeyMaterial,
}

impl std::fmt::Debug for EnvelopeFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeFileStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl EnvelopeFileStore {
    /// Open (creating if needed) the blob directory.
    pub fn open(dir: impl Into<PathBuf>, master: KeyMaterial) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, master })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encrypt everything `source` yields into a new blob.
    ///
    /// The plaintext is streamed one segment at a time. The blob becomes
    /// visible under its id only once fully written.
    #[instrument(level = "debug", skip(self, source))]
    pub fn put<R: Read>(&self, mut source: R, declared_name: &str) -> Result<StoredBlob> {
        let file_id = Uuid::new_v4().to_string();
        let destination = self.dir.join(&file_id);
        let (temp_path, file) = create_temp_for(&destination)?;

        let written = (|| -> Result<(File, u64)> {
            let mut writer = BlobWriter::new(file, &self.master, &file_id)?;
            let mut buf = Zeroizing::new(vec![0u8; SEGMENT_SIZE]);
            loop {
                let n = match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };
                writer.write_all(&buf[..n])?;
            }
            writer.finish()
        })();

        let (file, size) = match written {
            Ok(done) => done,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };
        commit_temp(&temp_path, file, &destination)?;
        debug!(file_id = %file_id, size, "Stored blob");
        Ok(StoredBlob { file_id, size })
    }

    /// Open a blob for streaming decryption.
    pub fn get(&self, file_id: &str) -> Result<BlobReader<BufReader<File>>> {
        let path = self.path_for(file_id)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(VaultError::NotFound(format!("Blob {}", file_id)));
            }
            Err(e) => return Err(e.into()),
        };
        BlobReader::new(BufReader::new(file), &self.master, file_id)
    }

    /// Decrypt a whole blob into memory.
    pub fn read_all(&self, file_id: &str) -> Result<Zeroizing<Vec<u8>>> {
        let mut reader = self.get(file_id)?;
        let mut out = Zeroizing::new(Vec::new());
        reader.read_to_end(&mut out).map_err(read_error)?;
        Ok(out)
    }

    /// Remove a blob. Deleting a missing blob succeeds.
    pub fn delete(&self, file_id: &str) -> Result<()> {
        let path = self.path_for(file_id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(file_id, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Plaintext size computed from the ciphertext length, `None` when the
    /// blob does not exist.
    pub fn size(&self, file_id: &str) -> Result<Option<u64>> {
        let path = self.path_for(file_id)?;
        match fs::metadata(&path) {
            Ok(meta) => plaintext_len(meta.len()).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a blob exists for `file_id`.
    pub fn exists(&self, file_id: &str) -> Result<bool> {
        Ok(self.path_for(file_id)?.is_file())
    }

    /// Ids of every stored blob, sorted. Temp files and foreign names are
    /// skipped.
    pub fn list_file_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_temp_name(name) {
                debug!(name, "Skipping temp file");
                continue;
            }
            if validate_file_id(name).is_err() {
                warn!(name, "Ignoring unexpected file in blob directory");
                continue;
            }
            ids.push(name.to_string());
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete temp files left by interrupted writes that are older than
    /// `max_age`. Returns how many were removed.
    pub fn remove_stale_temp_files(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if !name.to_str().is_some_and(is_temp_name) || !entry.file_type()?.is_file() {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            // Future timestamps count as fresh
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    fn path_for(&self, file_id: &str) -> Result<PathBuf> {
        validate_file_id(file_id)?;
        Ok(self.dir.join(file_id))
    }
}

/// File ids are canonical lowercase hyphenated UUIDs.
pub fn validate_file_id(file_id: &str) -> Result<()> {
    match Uuid::parse_str(file_id) {
        Ok(uuid) if uuid.hyphenated().to_string() == file_id => Ok(()),
        _ => Err(VaultError::InvalidInput(format!(
            "Invalid file id: {:?}",
            file_id
        ))),
    }
}

/// Map an error from reading a [`BlobReader`] back into the vault error type.
pub fn read_error(err: io::Error) -> VaultError {
    if err.kind() == ErrorKind::InvalidData {
        VaultError::Integrity(err.to_string())
    } else {
        VaultError::Io { source: err }
    }
}

fn plaintext_len(blob_len: u64) -> Result<u64> {
    let header = HEADER_LEN as u64;
    let sealed = SEALED_SEGMENT_LEN as u64;
    let tag = TAG_LEN as u64;
    if blob_len < header + tag {
        return Err(VaultError::Integrity("Blob shorter than header".to_string()));
    }
    let body = blob_len - header;
    let full = body / sealed;
    let rest = body % sealed;
    if rest == 0 {
        return Ok(full * SEGMENT_SIZE as u64);
    }
    if rest < tag {
        return Err(VaultError::Integrity(
            "Blob ends inside a segment tag".to_string(),
        ));
    }
    Ok(full * SEGMENT_SIZE as u64 + rest - tag)
}

fn derive_blob_cipher(master: &KeyMaterial, salt: &[u8], file_id: &str) -> Result<Aes256Gcm> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master.as_bytes());
    let mut info = Vec::with_capacity(HKDF_INFO.len() + file_id.len());
    info.extend_from_slice(HKDF_INFO);
    info.extend_from_slice(file_id.as_bytes());
    let mut okm = Zeroizing::new([0u8; KEY_LENGTH]);
    hk.expand(&info, okm.as_mut())
        .map_err(|e| VaultError::Crypto(format!("HKDF expand failed: {}", e)))?;
    Aes256Gcm::new_from_slice(okm.as_ref())
        .map_err(|e| VaultError::Crypto(format!("Cipher init failed: {}", e)))
}

fn segment_nonce(prefix: &[u8; NONCE_PREFIX_LEN], counter: u32, last: bool) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..NONCE_PREFIX_LEN].copy_from_slice(prefix);
    nonce[NONCE_PREFIX_LEN..11].copy_from_slice(&counter.to_be_bytes());
    nonce[11] = u8::from(last);
    nonce
}

fn integrity(msg: impl Into<String>) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg.into())
}

/// Streaming encryptor. Buffers at most one segment of plaintext.
pub struct BlobWriter<W: Write> {
    inner: W,
    cipher: Aes256Gcm,
    header: [u8; HEADER_LEN],
    nonce_prefix: [u8; NONCE_PREFIX_LEN],
    buffer: Zeroizing<Vec<u8>>,
    counter: u32,
    total: u64,
}

impl<W: Write> BlobWriter<W> {
    /// Write a fresh header to `inner` and prepare to encrypt.
    pub fn new(mut inner: W, master: &KeyMaterial, file_id: &str) -> Result<Self> {
        let salt = random_bytes::<SALT_LEN>()?;
        let nonce_prefix = random_bytes::<NONCE_PREFIX_LEN>()?;
        let mut header = [0u8; HEADER_LEN];
        header[..MAGIC.len()].copy_from_slice(MAGIC);
        header[MAGIC.len()..MAGIC.len() + SALT_LEN].copy_from_slice(&salt);
        header[MAGIC.len() + SALT_LEN..].copy_from_slice(&nonce_prefix);

        let cipher = derive_blob_cipher(master, &salt, file_id)?;
        inner.write_all(&header)?;
        Ok(Self {
            inner,
            cipher,
            header,
            nonce_prefix,
            buffer: Zeroizing::new(Vec::with_capacity(SEGMENT_SIZE)),
            counter: 0,
            total: 0,
        })
    }

    fn seal_buffer(&mut self, last: bool) -> io::Result<()> {
        let nonce = segment_nonce(&self.nonce_prefix, self.counter, last);
        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &self.buffer,
                    aad: &self.header,
                },
            )
            .map_err(|_| io::Error::new(ErrorKind::Other, "Segment encryption failed"))?;
        self.inner.write_all(&sealed)?;
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or_else(|| io::Error::new(ErrorKind::Other, "Blob too large"))?;
        self.buffer.clear();
        Ok(())
    }

    /// Seal the final segment and hand back the sink with the plaintext length.
    pub fn finish(mut self) -> Result<(W, u64)> {
        self.seal_buffer(true)?;
        self.inner.flush()?;
        Ok((self.inner, self.total))
    }
}

impl<W: Write> Write for BlobWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        // A full buffer is only sealed once more data arrives, so the last
        // segment is always sealed by `finish` with the last flag set.
        if self.buffer.len() == SEGMENT_SIZE {
            self.seal_buffer(false)?;
        }
        let take = data.len().min(SEGMENT_SIZE - self.buffer.len());
        self.buffer.extend_from_slice(&data[..take]);
        self.total += take as u64;
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streaming decryptor.
///
/// Authentication failures surface as `io::ErrorKind::InvalidData`; use
/// [`read_error`] to convert them to [`VaultError::Integrity`].
pub struct BlobReader<R: Read> {
    inner: R,
    cipher: Aes256Gcm,
    header: [u8; HEADER_LEN],
    nonce_prefix: [u8; NONCE_PREFIX_LEN],
    plain: Zeroizing<Vec<u8>>,
    pos: usize,
    counter: u32,
    lookahead: Option<u8>,
    done: bool,
}

impl<R: Read> BlobReader<R> {
    /// Read and check the header of a blob stored as `file_id`.
    pub fn new(mut inner: R, master: &KeyMaterial, file_id: &str) -> Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        inner.read_exact(&mut header).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                VaultError::Integrity(format!("Blob {} has a truncated header", file_id))
            } else {
                e.into()
            }
        })?;
        if &header[..MAGIC.len()] != MAGIC {
            return Err(VaultError::Integrity(format!(
                "Blob {} has an unknown format",
                file_id
            )));
        }
        let salt = &header[MAGIC.len()..MAGIC.len() + SALT_LEN];
        let mut nonce_prefix = [0u8; NONCE_PREFIX_LEN];
        nonce_prefix.copy_from_slice(&header[MAGIC.len() + SALT_LEN..]);
        let cipher = derive_blob_cipher(master, salt, file_id)?;
        Ok(Self {
            inner,
            cipher,
            header,
            nonce_prefix,
            plain: Zeroizing::new(Vec::new()),
            pos: 0,
            counter: 0,
            lookahead: None,
            done: false,
        })
    }

    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        if let Some(byte) = self.lookahead.take() {
            buf[0] = byte;
            filled = 1;
        }
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn peek_eof(&mut self) -> io::Result<bool> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(true),
                Ok(_) => {
                    self.lookahead = Some(byte[0]);
                    return Ok(false);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn next_segment(&mut self) -> io::Result<()> {
        let mut sealed = vec![0u8; SEALED_SEGMENT_LEN];
        let n = self.fill(&mut sealed)?;
        if n < TAG_LEN {
            return Err(integrity(format!(
                "Blob truncated before segment {}",
                self.counter
            )));
        }
        let last = n < SEALED_SEGMENT_LEN || self.peek_eof()?;
        let nonce = segment_nonce(&self.nonce_prefix, self.counter, last);
        let plain = self
            .cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &sealed[..n],
                    aad: &self.header,
                },
            )
            .map_err(|_| {
                warn!(segment = self.counter, "Blob segment failed authentication");
                integrity(format!(
                    "Segment {} failed authentication (tampered or truncated)",
                    self.counter
                ))
            })?;
        self.plain = Zeroizing::new(plain);
        self.pos = 0;
        self.counter = self.counter.wrapping_add(1);
        self.done = last;
        Ok(())
    }
}

impl<R: Read> Read for BlobReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos == self.plain.len() {
            if self.done {
                return Ok(0);
            }
            self.next_segment()?;
        }
        let n = buf.len().min(self.plain.len() - self.pos);
        buf[..n].copy_from_slice(&self.plain[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
