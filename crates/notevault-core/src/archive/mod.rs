//! Backup container codec.
//!
//! The container is a zip with, in this order:
//!
//! - `notes.json`: `{"notes":[{"id","title","content","lastModified"}]}`
//! - `files/<file_id>`: raw attachment bytes, one entry per attachment
//! - `files.json`: `{"files":[{"fileId","originalFileName","mimeType",
//!   "fileSize","uploadDate","sha256"}]}`
//!
//! Archives without `files.json` are read as the legacy layout, where
//! attachments live under `files/<originalFileName>` and their MIME type is
//! guessed from the extension. An archive whose attachment entries are named
//! by file id must carry `files.json`.
//!
//! The payload is not authenticated, so parsing also checks the zip
//! structure byte for byte in addition to the per-entry CRCs.

mod layout;

use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use zeroize::Zeroizing;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::blobs::{read_error, validate_file_id, SEGMENT_SIZE};
use crate::error::{Result, VaultError};
use crate::mime::guess_mime_type;
use crate::storage::{FileMetadata, NewNote, Note};

pub const NOTES_ENTRY: &str = "notes.json";
pub const FILES_MANIFEST_ENTRY: &str = "files.json";
pub const FILES_PREFIX: &str = "files/";

/// A note as serialized in `notes.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedNote {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub last_modified: i64,
}

impl From<&Note> for ArchivedNote {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            content: note.content.clone(),
            last_modified: note.last_modified,
        }
    }
}

impl From<ArchivedNote> for NewNote {
    fn from(note: ArchivedNote) -> Self {
        NewNote {
            title: note.title,
            content: note.content,
            last_modified: note.last_modified,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NotesDocument {
    notes: Vec<ArchivedNote>,
}

/// One attachment record in `files.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedFileRecord {
    pub file_id: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub upload_date: i64,
    pub sha256: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FilesDocument {
    files: Vec<ArchivedFileRecord>,
}

/// Outcome of adding one attachment to an archive.
#[derive(Debug)]
pub enum AttachmentWrite {
    Written,
    /// The source could not be read; the entry was dropped from the archive.
    Skipped(VaultError),
}

fn zip_write_error(err: ZipError) -> VaultError {
    VaultError::Storage(format!("Archive write failed: {}", err))
}

fn corrupt(err: impl std::fmt::Display) -> VaultError {
    VaultError::CorruptArchive(err.to_string())
}

/// Builds a container in memory.
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    records: Vec<ArchivedFileRecord>,
    notes_written: bool,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            records: Vec::new(),
            notes_written: false,
        }
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
    }

    /// Write `notes.json`. Must be called once, before any attachment.
    pub fn write_notes(&mut self, notes: &[Note]) -> Result<()> {
        if self.notes_written {
            return Err(VaultError::InvalidInput(
                "Notes already written to archive".to_string(),
            ));
        }
        let document = NotesDocument {
            notes: notes.iter().map(ArchivedNote::from).collect(),
        };
        let json = Zeroizing::new(serde_json::to_vec(&document)?);
        self.zip
            .start_file(NOTES_ENTRY, Self::options())
            .map_err(zip_write_error)?;
        self.zip.write_all(&json)?;
        self.notes_written = true;
        Ok(())
    }

    /// Add one attachment as `files/<file_id>`.
    ///
    /// `source` is read to the end before its entry is started, so a failure
    /// reading it leaves nothing behind in the container and is returned as
    /// [`AttachmentWrite::Skipped`]. Failures writing the container are
    /// errors.
    pub fn add_file<R: Read>(
        &mut self,
        metadata: &FileMetadata,
        mut source: R,
    ) -> Result<AttachmentWrite> {
        if !self.notes_written {
            return Err(VaultError::InvalidInput(
                "Notes must be written before attachments".to_string(),
            ));
        }
        let mut data = Zeroizing::new(Vec::with_capacity(SEGMENT_SIZE));
        if let Err(e) = source.read_to_end(&mut data) {
            return Ok(AttachmentWrite::Skipped(read_error(e)));
        }
        let size = data.len() as u64;

        let name = format!("{}{}", FILES_PREFIX, metadata.file_id);
        self.zip
            .start_file(name, Self::options())
            .map_err(zip_write_error)?;
        self.zip.write_all(&data)?;

        if size != metadata.file_size {
            warn!(
                file_id = %metadata.file_id,
                recorded = metadata.file_size,
                actual = size,
                "Attachment size differs from its metadata"
            );
        }
        self.records.push(ArchivedFileRecord {
            file_id: metadata.file_id.clone(),
            original_file_name: metadata.original_file_name.clone(),
            mime_type: metadata.mime_type.clone(),
            file_size: size,
            upload_date: metadata.upload_date,
            sha256: hex::encode(Sha256::digest(data.as_slice())),
        });
        Ok(AttachmentWrite::Written)
    }

    /// Number of attachments written so far.
    pub fn file_count(&self) -> usize {
        self.records.len()
    }

    /// Write `files.json` and return the container bytes.
    pub fn finish(mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !self.notes_written {
            return Err(VaultError::InvalidInput(
                "Archive has no notes entry".to_string(),
            ));
        }
        let document = FilesDocument {
            files: std::mem::take(&mut self.records),
        };
        let json = serde_json::to_vec(&document)?;
        self.zip
            .start_file(FILES_MANIFEST_ENTRY, Self::options())
            .map_err(zip_write_error)?;
        self.zip.write_all(&json)?;
        let cursor = self.zip.finish().map_err(zip_write_error)?;
        Ok(Zeroizing::new(cursor.into_inner()))
    }
}

/// An attachment recovered from a container.
#[derive(Debug)]
pub struct ArchivedAttachment {
    /// Id the attachment had in the exporting vault (legacy: the entry name).
    pub source_id: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub data: Zeroizing<Vec<u8>>,
    /// Why the bytes do not match their sidecar record, if they don't.
    pub problem: Option<String>,
}

impl ArchivedAttachment {
    pub fn is_intact(&self) -> bool {
        self.problem.is_none()
    }
}

/// A fully read and structurally validated container.
#[derive(Debug)]
pub struct ParsedArchive {
    pub notes: Vec<ArchivedNote>,
    pub attachments: Vec<ArchivedAttachment>,
    /// True when the container had no `files.json`.
    pub legacy: bool,
}

fn read_entry<R: Read>(entry: &mut R, name: &str) -> Result<Zeroizing<Vec<u8>>> {
    let mut data = Zeroizing::new(Vec::new());
    entry
        .read_to_end(&mut data)
        .map_err(|e| corrupt(format!("Entry {} unreadable: {}", name, e)))?;
    Ok(data)
}

/// Read and validate a whole container.
///
/// Every entry is read, so any CRC failure surfaces here as
/// `CorruptArchive` before the caller writes anything. So does any local
/// header, gap or end record that disagrees with the central directory. A
/// missing or malformed `notes.json` is `CorruptArchive`. With a
/// `files.json` present the `files/` entries must match it exactly; without
/// one, entries named by file id are `CorruptArchive`. Attachments whose bytes
/// disagree with their record come back with [`ArchivedAttachment::problem`]
/// set rather than failing the whole container.
pub fn parse_archive(bytes: &[u8]) -> Result<ParsedArchive> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;

    let mut notes: Option<Vec<ArchivedNote>> = None;
    let mut manifest: Option<Vec<ArchivedFileRecord>> = None;
    let mut blobs: Vec<(String, Zeroizing<Vec<u8>>)> = Vec::new();
    let mut seen = HashSet::new();
    let mut layouts = Vec::with_capacity(zip.len());

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(corrupt)?;
        layouts.push(layout::EntryLayout {
            header_start: entry.header_start(),
            central_start: entry.central_header_start(),
            data_start: entry.data_start(),
            compressed_size: entry.compressed_size(),
        });
        let name = entry.name().to_string();
        if !seen.insert(name.clone()) {
            return Err(corrupt(format!("Duplicate entry {}", name)));
        }

        if name == NOTES_ENTRY {
            let data = read_entry(&mut entry, &name)?;
            let document: NotesDocument = serde_json::from_slice(&data)
                .map_err(|e| corrupt(format!("Invalid {}: {}", NOTES_ENTRY, e)))?;
            notes = Some(document.notes);
        } else if name == FILES_MANIFEST_ENTRY {
            let data = read_entry(&mut entry, &name)?;
            let document: FilesDocument = serde_json::from_slice(&data)
                .map_err(|e| corrupt(format!("Invalid {}: {}", FILES_MANIFEST_ENTRY, e)))?;
            manifest = Some(document.files);
        } else if let Some(rest) = name.strip_prefix(FILES_PREFIX) {
            if entry.is_dir() || rest.is_empty() {
                continue;
            }
            let data = read_entry(&mut entry, &name)?;
            blobs.push((rest.to_string(), data));
        } else {
            // Unknown entries are skipped but still checksummed.
            debug!(entry = %name, "Ignoring unknown archive entry");
            io::copy(&mut entry, &mut io::sink())
                .map_err(|e| corrupt(format!("Entry {} unreadable: {}", name, e)))?;
        }
    }

    layout::check_layout(bytes, &layouts)?;

    let notes = notes.ok_or_else(|| corrupt(format!("Archive has no {}", NOTES_ENTRY)))?;

    let legacy = manifest.is_none();
    if legacy && blobs.iter().any(|(name, _)| validate_file_id(name).is_ok()) {
        return Err(corrupt(format!(
            "Attachments are stored by id but {} is missing",
            FILES_MANIFEST_ENTRY
        )));
    }
    let attachments = match manifest {
        Some(records) => match_manifest(records, blobs)?,
        None => blobs
            .into_iter()
            .map(|(name, data)| ArchivedAttachment {
                source_id: name.clone(),
                mime_type: guess_mime_type(&name).to_string(),
                original_file_name: name,
                data,
                problem: None,
            })
            .collect(),
    };

    Ok(ParsedArchive {
        notes,
        attachments,
        legacy,
    })
}

fn match_manifest(
    records: Vec<ArchivedFileRecord>,
    blobs: Vec<(String, Zeroizing<Vec<u8>>)>,
) -> Result<Vec<ArchivedAttachment>> {
    let mut by_id: HashMap<String, ArchivedFileRecord> = HashMap::with_capacity(records.len());
    for record in records {
        if by_id.contains_key(&record.file_id) {
            return Err(corrupt(format!(
                "{} lists {} twice",
                FILES_MANIFEST_ENTRY, record.file_id
            )));
        }
        by_id.insert(record.file_id.clone(), record);
    }

    let entry_ids: HashSet<&str> = blobs.iter().map(|(id, _)| id.as_str()).collect();
    if entry_ids.len() != by_id.len() || !by_id.keys().all(|id| entry_ids.contains(id.as_str()))
    {
        return Err(corrupt(format!(
            "Attachment entries do not match {}",
            FILES_MANIFEST_ENTRY
        )));
    }

    let mut attachments = Vec::with_capacity(blobs.len());
    for (id, data) in blobs {
        let record = by_id
            .remove(&id)
            .ok_or_else(|| corrupt(format!("No record for attachment {}", id)))?;
        let problem = if data.len() as u64 != record.file_size {
            Some(format!(
                "expected {} bytes, found {}",
                record.file_size,
                data.len()
            ))
        } else if hex::encode(Sha256::digest(data.as_slice()))
            != record.sha256.to_ascii_lowercase()
        {
            Some("SHA-256 digest mismatch".to_string())
        } else {
            None
        };
        attachments.push(ArchivedAttachment {
            source_id: id,
            original_file_name: record.original_file_name,
            mime_type: record.mime_type,
            data,
            problem,
        });
    }
    Ok(attachments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: i64, title: &str) -> Note {
        Note {
            id,
            title: title.to_string(),
            content: format!("{} content", title),
            last_modified: 1_700_000_000_000 + id,
        }
    }

    fn meta(file_id: &str, name: &str, size: u64) -> FileMetadata {
        FileMetadata {
            id: 1,
            file_id: file_id.to_string(),
            original_file_name: name.to_string(),
            mime_type: guess_mime_type(name).to_string(),
            file_size: size,
            upload_date: 1_700_000_000_000,
        }
    }

    const ID_A: &str = "11111111-1111-4111-8111-111111111111";
    const ID_B: &str = "22222222-2222-4222-8222-222222222222";

    fn raw_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_write_then_parse() {
        let mut writer = ArchiveWriter::new();
        writer.write_notes(&[note(1, "one"), note(2, "two")]).unwrap();
        writer.add_file(&meta(ID_A, "hello.txt", 10), &b"0123456789"[..]).unwrap();
        writer.add_file(&meta(ID_B, "hello.txt", 3), &b"abc"[..]).unwrap();
        let bytes = writer.finish().unwrap();

        let parsed = parse_archive(&bytes).unwrap();
        assert!(!parsed.legacy);
        assert_eq!(parsed.notes.len(), 2);
        assert_eq!(parsed.notes[1].title, "two");
        assert_eq!(parsed.attachments.len(), 2);
        assert!(parsed.attachments.iter().all(|a| a.is_intact()));
        assert_eq!(parsed.attachments[0].source_id, ID_A);
        assert_eq!(parsed.attachments[0].data.as_slice(), b"0123456789");
        assert_eq!(parsed.attachments[1].original_file_name, "hello.txt");
    }

    #[test]
    fn test_entry_order_notes_first_manifest_last() {
        let mut writer = ArchiveWriter::new();
        writer.write_notes(&[note(1, "n")]).unwrap();
        writer.add_file(&meta(ID_A, "a.txt", 1), &b"a"[..]).unwrap();
        let bytes = writer.finish().unwrap();

        let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                NOTES_ENTRY.to_string(),
                format!("files/{}", ID_A),
                FILES_MANIFEST_ENTRY.to_string()
            ]
        );
    }

    #[test]
    fn test_notes_json_field_names() {
        let json = serde_json::to_value(ArchivedNote::from(&note(7, "t"))).unwrap();
        assert_eq!(json["lastModified"], 1_700_000_000_007i64);
        assert!(json.get("last_modified").is_none());
    }

    #[test]
    fn test_unreadable_source_is_skipped() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::InvalidData, "tag mismatch"))
            }
        }

        let mut writer = ArchiveWriter::new();
        writer.write_notes(&[note(1, "n")]).unwrap();
        let outcome = writer.add_file(&meta(ID_A, "bad.bin", 5), Failing).unwrap();
        assert!(matches!(
            outcome,
            AttachmentWrite::Skipped(VaultError::Integrity(_))
        ));
        writer.add_file(&meta(ID_B, "ok.txt", 2), &b"ok"[..]).unwrap();
        assert_eq!(writer.file_count(), 1);

        let parsed = parse_archive(&writer.finish().unwrap()).unwrap();
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].source_id, ID_B);
    }

    #[test]
    fn test_missing_notes_is_corrupt() {
        let bytes = raw_zip(&[("files/readme.txt", &b"hi"[..])]);
        assert!(matches!(
            parse_archive(&bytes),
            Err(VaultError::CorruptArchive(_))
        ));
    }

    #[test]
    fn test_malformed_notes_is_corrupt() {
        let bytes = raw_zip(&[(NOTES_ENTRY, &b"{\"notes\": [ {\"title\": 3} ]}"[..])]);
        assert!(matches!(
            parse_archive(&bytes),
            Err(VaultError::CorruptArchive(_))
        ));
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        assert!(matches!(
            parse_archive(b"definitely not a zip file"),
            Err(VaultError::CorruptArchive(_))
        ));
    }

    #[test]
    fn test_legacy_layout_is_accepted() {
        let notes = br#"{"notes":[{"id":3,"title":"legacy","content":"c","lastModified":5}]}"#;
        let bytes = raw_zip(&[
            (NOTES_ENTRY, &notes[..]),
            ("files/photo.png", &b"\x89PNG"[..]),
            ("extra/ignored.bin", &b"whatever"[..]),
        ]);
        let parsed = parse_archive(&bytes).unwrap();
        assert!(parsed.legacy);
        assert_eq!(parsed.notes[0].title, "legacy");
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].original_file_name, "photo.png");
        assert_eq!(parsed.attachments[0].mime_type, "image/png");
        assert!(parsed.attachments[0].is_intact());
    }

    #[test]
    fn test_manifest_mismatch_is_corrupt() {
        let notes = br#"{"notes":[]}"#;
        let manifest = format!(
            r#"{{"files":[{{"fileId":"{}","originalFileName":"a","mimeType":"text/plain","fileSize":1,"uploadDate":0,"sha256":"00"}}]}}"#,
            ID_A
        );
        let bytes = raw_zip(&[
            (NOTES_ENTRY, &notes[..]),
            ("files/some-other-name", &b"a"[..]),
            (FILES_MANIFEST_ENTRY, manifest.as_bytes()),
        ]);
        assert!(matches!(
            parse_archive(&bytes),
            Err(VaultError::CorruptArchive(_))
        ));
    }

    #[test]
    fn test_truncated_attachment_is_per_file_problem() {
        let full = b"0123456789";
        let digest = hex::encode(Sha256::digest(full));
        let manifest = format!(
            r#"{{"files":[{{"fileId":"{}","originalFileName":"hello.txt","mimeType":"text/plain","fileSize":10,"uploadDate":0,"sha256":"{}"}}]}}"#,
            ID_A, digest
        );
        let name = format!("files/{}", ID_A);
        let bytes = raw_zip(&[
            (NOTES_ENTRY, &br#"{"notes":[]}"#[..]),
            (name.as_str(), &full[..4]),
            (FILES_MANIFEST_ENTRY, manifest.as_bytes()),
        ]);
        let parsed = parse_archive(&bytes).unwrap();
        assert_eq!(parsed.attachments.len(), 1);
        assert!(!parsed.attachments[0].is_intact());
    }

    #[test]
    fn test_digest_mismatch_is_per_file_problem() {
        let manifest = format!(
            r#"{{"files":[{{"fileId":"{}","originalFileName":"x","mimeType":"text/plain","fileSize":3,"uploadDate":0,"sha256":"{}"}}]}}"#,
            ID_A,
            hex::encode(Sha256::digest(b"abc"))
        );
        let name = format!("files/{}", ID_A);
        let bytes = raw_zip(&[
            (NOTES_ENTRY, &br#"{"notes":[]}"#[..]),
            (name.as_str(), &b"abd"[..]),
            (FILES_MANIFEST_ENTRY, manifest.as_bytes()),
        ]);
        let parsed = parse_archive(&bytes).unwrap();
        assert_eq!(
            parsed.attachments[0].problem.as_deref(),
            Some("SHA-256 digest mismatch")
        );
    }

    fn sample_archive() -> Vec<u8> {
        let mut writer = ArchiveWriter::new();
        writer.write_notes(&[note(1, "A")]).unwrap();
        writer
            .add_file(&meta(ID_A, "hello.txt", 10), &b"0123456789"[..])
            .unwrap();
        writer.finish().unwrap().to_vec()
    }

    fn positions_of(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
        haystack
            .windows(needle.len())
            .enumerate()
            .filter(|(_, window)| *window == needle)
            .map(|(at, _)| at)
            .collect()
    }

    fn assert_corrupt(bytes: &[u8]) {
        let result = parse_archive(bytes);
        assert!(
            matches!(result, Err(VaultError::CorruptArchive(_))),
            "expected CorruptArchive, got {:?}",
            result
        );
    }

    #[test]
    fn test_renamed_manifest_in_central_directory_is_corrupt() {
        let bytes = sample_archive();
        let found = positions_of(&bytes, FILES_MANIFEST_ENTRY.as_bytes());
        // Local header first, central directory last
        assert_eq!(found.len(), 2);

        let mut raw = bytes.clone();
        raw[found[1]] ^= 0x01;
        assert_corrupt(&raw);

        let mut raw = bytes;
        raw[found[0]] ^= 0x01;
        assert_corrupt(&raw);
    }

    #[test]
    fn test_id_named_entries_need_manifest() {
        let notes = br#"{"notes":[{"id":1,"title":"t","content":"","lastModified":1}]}"#;
        let name = format!("files/{}", ID_A);
        let bytes = raw_zip(&[(NOTES_ENTRY, &notes[..]), (name.as_str(), &b"data"[..])]);
        assert_corrupt(&bytes);
    }

    #[test]
    fn test_local_header_fields_must_match_central_directory() {
        let bytes = sample_archive();
        // version, flags, method, time, date and crc of the first local header
        for offset in 4..18 {
            let mut raw = bytes.clone();
            raw[offset] ^= 0x01;
            assert_corrupt(&raw);
        }
    }

    #[test]
    fn test_trailing_or_leading_bytes_are_corrupt() {
        let bytes = sample_archive();

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_corrupt(&trailing);

        let mut leading = vec![0u8];
        leading.extend_from_slice(&bytes);
        assert_corrupt(&leading);
    }

    #[test]
    fn test_skipped_attachment_leaves_clean_layout() {
        struct HalfRead(usize);
        impl Read for HalfRead {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0 == 0 {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, "tag mismatch"));
                }
                let n = buf.len().min(self.0);
                buf[..n].fill(b'x');
                self.0 -= n;
                Ok(n)
            }
        }

        let mut writer = ArchiveWriter::new();
        writer.write_notes(&[note(1, "n")]).unwrap();
        let outcome = writer
            .add_file(&meta(ID_A, "big.bin", 20_000), HalfRead(10_000))
            .unwrap();
        assert!(matches!(outcome, AttachmentWrite::Skipped(_)));
        writer.add_file(&meta(ID_B, "ok.txt", 2), &b"ok"[..]).unwrap();

        let parsed = parse_archive(&writer.finish().unwrap()).unwrap();
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].data.as_slice(), b"ok");
    }

    #[test]
    fn test_crc_failure_is_corrupt() {
        let mut writer = ArchiveWriter::new();
        writer.write_notes(&[note(1, "n")]).unwrap();
        let bytes = writer.finish().unwrap();
        let offset = ZipArchive::new(Cursor::new(bytes.as_slice()))
            .unwrap()
            .by_index(0)
            .unwrap()
            .data_start() as usize;
        let mut raw = bytes.to_vec();
        raw[offset] ^= 0xFF;
        assert!(matches!(
            parse_archive(&raw),
            Err(VaultError::CorruptArchive(_))
        ));
    }
}
