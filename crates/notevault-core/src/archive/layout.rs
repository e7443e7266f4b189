//! Byte-level checks on the zip structure.
//!
//! The zip reader takes entry metadata from the central directory and only
//! uses the local headers to find where the data starts. These checks make
//! sure the rest of the container agrees with the central directory, so a
//! damaged byte outside the compressed data cannot go unnoticed.

use crate::error::{Result, VaultError};

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_RECORD_SIGNATURE: u32 = 0x0605_4b50;

const LOCAL_HEADER_LEN: usize = 30;
const CENTRAL_HEADER_LEN: usize = 46;
const END_RECORD_LEN: usize = 22;

const DATA_DESCRIPTOR_FLAG: u16 = 1 << 3;
const SIZE_SENTINEL: u32 = u32::MAX;
const COUNT_SENTINEL: u16 = u16::MAX;

/// Where one entry lives in the container, as reported by the zip reader.
#[derive(Debug, Clone, Copy)]
pub struct EntryLayout {
    pub header_start: u64,
    pub central_start: u64,
    pub data_start: u64,
    pub compressed_size: u64,
}

fn damaged(detail: impl std::fmt::Display) -> VaultError {
    VaultError::CorruptArchive(format!("Damaged archive structure: {}", detail))
}

fn offset(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| damaged("offset out of range"))
}

fn field(bytes: &[u8], at: usize, len: usize) -> Result<&[u8]> {
    at.checked_add(len)
        .and_then(|end| bytes.get(at..end))
        .ok_or_else(|| damaged("truncated header"))
}

fn u16_at(bytes: &[u8], at: usize) -> Result<u16> {
    let b = field(bytes, at, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(bytes: &[u8], at: usize) -> Result<u32> {
    let b = field(bytes, at, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Validate the container layout against the entries the reader produced.
///
/// `entries` must be in central directory order.
pub fn check_layout(bytes: &[u8], entries: &[EntryLayout]) -> Result<()> {
    let (end_record, central_offset) = check_end_record(bytes, entries.len())?;

    let mut next_central = central_offset;
    for entry in entries {
        let central = offset(entry.central_start)?;
        if central != next_central {
            return Err(damaged("central directory records are not contiguous"));
        }
        next_central = check_entry(bytes, entry)?;
    }
    if next_central != end_record {
        return Err(damaged("central directory size mismatch"));
    }

    check_data_regions(bytes, entries, central_offset)
}

/// Locate the end record and check it. Returns its position and the central
/// directory offset.
fn check_end_record(bytes: &[u8], entry_count: usize) -> Result<(usize, usize)> {
    let last = bytes
        .len()
        .checked_sub(END_RECORD_LEN)
        .ok_or_else(|| damaged("too short"))?;
    let position = (0..=last)
        .rev()
        .find(|&at| {
            let comment_len = u16_at(bytes, at + 20).ok().map(usize::from);
            u32_at(bytes, at).ok() == Some(END_RECORD_SIGNATURE)
                && comment_len == Some(bytes.len() - at - END_RECORD_LEN)
        })
        .ok_or_else(|| damaged("no end of central directory record"))?;

    if u16_at(bytes, position + 4)? != 0 || u16_at(bytes, position + 6)? != 0 {
        return Err(damaged("multi-disk archive"));
    }
    let on_disk = u16_at(bytes, position + 8)?;
    let total = u16_at(bytes, position + 10)?;
    if on_disk != total || (total != COUNT_SENTINEL && usize::from(total) != entry_count) {
        return Err(damaged("entry count mismatch"));
    }

    let size = u32_at(bytes, position + 12)?;
    let start = u32_at(bytes, position + 16)?;
    if size == SIZE_SENTINEL || start == SIZE_SENTINEL {
        return Err(damaged("zip64 containers are not supported"));
    }
    let start = start as usize;
    if start.checked_add(size as usize) != Some(position) {
        return Err(damaged("central directory bounds mismatch"));
    }
    Ok((position, start))
}

/// Compare one central record with its local header. Returns the offset just
/// past the central record.
fn check_entry(bytes: &[u8], entry: &EntryLayout) -> Result<usize> {
    let central = offset(entry.central_start)?;
    let local = offset(entry.header_start)?;

    if u32_at(bytes, central)? != CENTRAL_HEADER_SIGNATURE {
        return Err(damaged("bad central header signature"));
    }
    if u32_at(bytes, local)? != LOCAL_HEADER_SIGNATURE {
        return Err(damaged("bad local header signature"));
    }
    if u16_at(bytes, central + 34)? != 0 {
        return Err(damaged("entry on another disk"));
    }

    // version needed, flags, method, time, date
    if field(bytes, central + 6, 10)? != field(bytes, local + 4, 10)? {
        return Err(damaged("local header disagrees with central directory"));
    }
    let flags = u16_at(bytes, central + 8)?;
    if flags & DATA_DESCRIPTOR_FLAG == 0 {
        // crc, compressed size, uncompressed size
        if field(bytes, central + 16, 12)? != field(bytes, local + 14, 12)? {
            return Err(damaged("local sizes disagree with central directory"));
        }
    }

    let central_name_len = usize::from(u16_at(bytes, central + 28)?);
    let local_name_len = usize::from(u16_at(bytes, local + 26)?);
    let central_name = field(bytes, central + CENTRAL_HEADER_LEN, central_name_len)?;
    let local_name = field(bytes, local + LOCAL_HEADER_LEN, local_name_len)?;
    if central_name != local_name {
        return Err(damaged("entry name differs between headers"));
    }
    let local_extra_len = usize::from(u16_at(bytes, local + 28)?);
    let expected_data = local + LOCAL_HEADER_LEN + local_name_len + local_extra_len;
    if offset(entry.data_start)? != expected_data {
        return Err(damaged("data offset mismatch"));
    }

    let extra_len = usize::from(u16_at(bytes, central + 30)?);
    let comment_len = usize::from(u16_at(bytes, central + 32)?);
    Ok(central + CENTRAL_HEADER_LEN + central_name_len + extra_len + comment_len)
}

/// Local entries must tile the space before the central directory with no
/// gaps, apart from data descriptors.
fn check_data_regions(
    bytes: &[u8],
    entries: &[EntryLayout],
    central_offset: usize,
) -> Result<()> {
    let mut ordered: Vec<&EntryLayout> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.header_start);

    let mut expected = 0usize;
    for entry in ordered {
        let local = offset(entry.header_start)?;
        if local != expected {
            return Err(damaged("unaccounted bytes between entries"));
        }
        let data_end = offset(entry.data_start)?
            .checked_add(offset(entry.compressed_size)?)
            .ok_or_else(|| damaged("entry size overflow"))?;
        let flags = u16_at(bytes, local + 6)?;
        expected = if flags & DATA_DESCRIPTOR_FLAG == 0 {
            data_end
        } else {
            descriptor_end(bytes, data_end)?
        };
    }
    if expected != central_offset {
        return Err(damaged("unaccounted bytes before central directory"));
    }
    Ok(())
}

/// A data descriptor is 12 bytes, or 16 with its optional signature.
fn descriptor_end(bytes: &[u8], at: usize) -> Result<usize> {
    const DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
    if u32_at(bytes, at)? == DESCRIPTOR_SIGNATURE {
        Ok(at + 16)
    } else {
        Ok(at + 12)
    }
}
