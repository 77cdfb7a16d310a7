//! Byte-exact binary cache layout.
//!
//! All multi-byte integers are little-endian. The file is a fixed 32-byte
//! header, an index section of fixed-size 68-byte records sorted by
//! filename, and a variable-length data section holding the fields that
//! don't fit (or don't need to fit) in the index record.
//!
//! Filtering reads only the index section; materializing a [`Summary`]
//! reads the corresponding data-section blob as well.

use std::path::PathBuf;

use crate::error::{Result, TkError};
use crate::types::{CacheEntry, Summary, TicketStatus, TicketType};

pub const MAGIC: &[u8; 4] = b"TKC1";
pub const VERSION: u16 = 6;

pub const HEADER_LEN: usize = 32;
pub const INDEX_ENTRY_LEN: usize = 68;
pub const FILENAME_SLOT: usize = 32;
pub const PARENT_SLOT: usize = 12;
/// The index's parent slot is 12 bytes including the NUL terminator, so the
/// widest parent id it can hold is 11 bytes — tighter than the 255-byte
/// per-string-1 limit that applies to the data section's own copy of the
/// same field.
const PARENT_SLOT_MAX_LEN: usize = PARENT_SLOT - 1;

const STATUS_OFFSET: usize = 46;
const PRIORITY_OFFSET: usize = 47;
const TYPE_OFFSET: usize = 48;
const PARENT_OFFSET: usize = 49;

/// Encode a set of cache entries into the on-disk byte layout, sorted by
/// filename ascending (invariant 3).
pub fn encode(entries: &[CacheEntry]) -> Result<Vec<u8>> {
    let mut sorted: Vec<&CacheEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| filename_of(a).cmp(&filename_of(b)));

    let count = u32::try_from(sorted.len()).map_err(|_| {
        TkError::Corrupt("cache entry count exceeds u32::MAX".to_string())
    })?;

    let mut data = Vec::new();
    let mut index = Vec::with_capacity(sorted.len() * INDEX_ENTRY_LEN);
    let data_base = HEADER_LEN + sorted.len() * INDEX_ENTRY_LEN;

    for entry in &sorted {
        let filename = filename_of(entry);
        if filename.len() > FILENAME_SLOT {
            return Err(TkError::FilenameTooLong(filename));
        }

        let blob = encode_data_blob(&entry.summary)?;
        if blob.len() > u16::MAX as usize {
            return Err(TkError::EntryTooLarge(entry.summary.id.clone()));
        }

        let offset = data_base + data.len();
        let offset = u32::try_from(offset)
            .map_err(|_| TkError::FileTooLarge(u64::MAX))?;

        write_index_entry(
            &mut index,
            &filename,
            entry.mtime_ns,
            offset,
            blob.len() as u16,
            &entry.summary,
        )?;
        data.extend_from_slice(&blob);
    }

    let total = HEADER_LEN + index.len() + data.len();
    if total > u32::MAX as usize {
        return Err(TkError::FileTooLarge(total as u64));
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&[0u8; 22]);
    out.extend_from_slice(&index);
    out.extend_from_slice(&data);
    Ok(out)
}

fn filename_of(entry: &CacheEntry) -> String {
    format!("{}.md", entry.summary.id)
}

fn write_index_entry(
    out: &mut Vec<u8>,
    filename: &str,
    mtime_ns: u64,
    data_offset: u32,
    data_len: u16,
    summary: &Summary,
) -> Result<()> {
    let mut filename_slot = [0u8; FILENAME_SLOT];
    filename_slot[..filename.len()].copy_from_slice(filename.as_bytes());
    out.extend_from_slice(&filename_slot);

    out.extend_from_slice(&mtime_ns.to_le_bytes());
    out.extend_from_slice(&data_offset.to_le_bytes());
    out.extend_from_slice(&data_len.to_le_bytes());

    out.push(summary.status.as_byte());
    out.push(summary.priority);
    out.push(summary.ticket_type.as_byte());

    let mut parent_slot = [0u8; PARENT_SLOT];
    if let Some(parent) = &summary.parent {
        if parent.len() > PARENT_SLOT_MAX_LEN {
            return Err(TkError::ParentTooLong(parent.clone()));
        }
        parent_slot[..parent.len()].copy_from_slice(parent.as_bytes());
    }
    out.extend_from_slice(&parent_slot);
    out.extend_from_slice(&[0u8; 7]);
    Ok(())
}

fn encode_data_blob(summary: &Summary) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.push(summary.schema_version);

    write_u8_prefixed(&mut out, &summary.id, |s| TkError::IDTooLong(s.to_string()))?;
    write_u16_prefixed(&mut out, &summary.title, || TkError::TitleTooLong)?;
    write_u8_prefixed(&mut out, &summary.created, |s| {
        TkError::InvalidFieldValue {
            line: 0,
            field: "created".to_string(),
            value: format!("'{s}' exceeds 255 bytes"),
        }
    })?;
    write_u8_prefixed(
        &mut out,
        summary.closed.as_deref().unwrap_or(""),
        |s| TkError::InvalidFieldValue {
            line: 0,
            field: "closed".to_string(),
            value: format!("'{s}' exceeds 255 bytes"),
        },
    )?;
    write_u8_prefixed(
        &mut out,
        summary.assignee.as_deref().unwrap_or(""),
        |_| TkError::AssigneeTooLong,
    )?;
    write_u16_prefixed(&mut out, &summary.path, || TkError::PathTooLong)?;

    if summary.blocked_by.len() > 255 {
        return Err(TkError::TooManyBlockers(summary.id.clone()));
    }
    out.push(summary.blocked_by.len() as u8);
    for blocker in &summary.blocked_by {
        write_u8_prefixed(&mut out, blocker, |s| {
            TkError::BlockerIDTooLong(s.to_string())
        })?;
    }

    write_u8_prefixed(
        &mut out,
        summary.parent.as_deref().unwrap_or(""),
        |s| TkError::ParentTooLong(s.to_string()),
    )?;

    Ok(out)
}

fn write_u8_prefixed(
    out: &mut Vec<u8>,
    value: &str,
    on_too_long: impl FnOnce(&str) -> TkError,
) -> Result<()> {
    let bytes = value.as_bytes();
    let len = u8::try_from(bytes.len()).map_err(|_| on_too_long(value))?;
    out.push(len);
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_u16_prefixed(
    out: &mut Vec<u8>,
    value: &str,
    on_too_long: impl FnOnce() -> TkError,
) -> Result<()> {
    let bytes = value.as_bytes();
    let len = u16::try_from(bytes.len()).map_err(|_| on_too_long())?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

/// A validated, read-only view over a cache file's bytes (backed by a
/// memory map in production, a `Vec<u8>` in tests).
pub struct CacheView<'a> {
    bytes: &'a [u8],
    count: u32,
}

impl<'a> CacheView<'a> {
    /// Validate `bytes` against the cache file's load-time invariants and,
    /// on success, return a view over it.
    pub fn validate(bytes: &'a [u8], path: PathBuf) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(TkError::FileTooSmall);
        }
        if bytes.len() as u64 > u32::MAX as u64 {
            return Err(TkError::FileTooLarge(bytes.len() as u64));
        }
        if &bytes[0..4] != MAGIC {
            return Err(TkError::InvalidMagic);
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(TkError::VersionMismatch {
                found: version,
                expected: VERSION,
            });
        }
        let count = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);

        let index_end = HEADER_LEN + count as usize * INDEX_ENTRY_LEN;
        if bytes.len() < index_end {
            return Err(TkError::FileTooSmall);
        }

        let view = CacheView { bytes, count };
        for i in 0..count {
            let (offset, len) = view.raw_data_span(i);
            let end = offset as usize + len as usize;
            if offset as usize > bytes.len() || end > bytes.len() {
                return Err(TkError::Corrupt(format!(
                    "entry {i} in {} has an out-of-range data offset",
                    path.display()
                )));
            }
        }
        Ok(view)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    fn entry_start(&self, index: u32) -> usize {
        HEADER_LEN + index as usize * INDEX_ENTRY_LEN
    }

    pub fn filename(&self, index: u32) -> &str {
        let start = self.entry_start(index);
        trimmed_str(&self.bytes[start..start + FILENAME_SLOT])
    }

    pub fn mtime_ns(&self, index: u32) -> u64 {
        let start = self.entry_start(index) + 32;
        u64::from_le_bytes(self.bytes[start..start + 8].try_into().unwrap())
    }

    fn raw_data_span(&self, index: u32) -> (u32, u16) {
        let start = self.entry_start(index) + 40;
        let offset = u32::from_le_bytes(self.bytes[start..start + 4].try_into().unwrap());
        let len = u16::from_le_bytes(self.bytes[start + 4..start + 6].try_into().unwrap());
        (offset, len)
    }

    pub fn status_byte(&self, index: u32) -> u8 {
        self.bytes[self.entry_start(index) + STATUS_OFFSET]
    }

    pub fn priority_byte(&self, index: u32) -> u8 {
        self.bytes[self.entry_start(index) + PRIORITY_OFFSET]
    }

    pub fn type_byte(&self, index: u32) -> u8 {
        self.bytes[self.entry_start(index) + TYPE_OFFSET]
    }

    pub fn parent_slot(&self, index: u32) -> &str {
        let start = self.entry_start(index) + PARENT_OFFSET;
        trimmed_str(&self.bytes[start..start + PARENT_SLOT])
    }

    /// Binary search the index section for `filename`. `O(log N)`.
    pub fn find_by_filename(&self, filename: &str) -> Option<u32> {
        let mut lo = 0i64;
        let mut hi = self.count as i64 - 1;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            match self.filename(mid as u32).cmp(filename) {
                std::cmp::Ordering::Equal => return Some(mid as u32),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid - 1,
            }
        }
        None
    }

    /// Materialize the full [`Summary`] for `index` from its data-section blob.
    pub fn materialize_summary(&self, index: u32) -> Result<Summary> {
        let (offset, len) = self.raw_data_span(index);
        let mut r = ByteReader {
            bytes: &self.bytes[offset as usize..offset as usize + len as usize],
            pos: 0,
        };

        let schema_version = r.u8()?;
        let id = r.str_u8()?;
        let title = r.str_u16()?;
        let created = r.str_u8()?;
        let closed_raw = r.str_u8()?;
        let assignee_raw = r.str_u8()?;
        let path = r.str_u16()?;
        let blocker_count = r.u8()?;
        let mut blocked_by = Vec::with_capacity(blocker_count as usize);
        for _ in 0..blocker_count {
            blocked_by.push(r.str_u8()?);
        }
        let parent_raw = r.str_u8()?;

        let status = TicketStatus::from_byte(self.status_byte(index))
            .ok_or_else(|| TkError::Corrupt(format!("invalid status byte for entry {index}")))?;
        let ticket_type = TicketType::from_byte(self.type_byte(index))
            .ok_or_else(|| TkError::Corrupt(format!("invalid type byte for entry {index}")))?;

        Ok(Summary {
            schema_version,
            id,
            status,
            blocked_by,
            parent: none_if_empty(parent_raw),
            created,
            ticket_type,
            priority: self.priority_byte(index),
            assignee: none_if_empty(assignee_raw),
            closed: none_if_empty(closed_raw),
            title,
            path,
        })
    }
}

fn none_if_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn trimmed_str(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end]).unwrap_or("")
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn u8(&mut self) -> Result<u8> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| TkError::Corrupt("truncated data blob".to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + 2)
            .ok_or_else(|| TkError::Corrupt("truncated data blob".to_string()))?;
        self.pos += 2;
        Ok(u16::from_le_bytes(slice.try_into().unwrap()))
    }

    fn str_u8(&mut self) -> Result<String> {
        let len = self.u8()? as usize;
        self.read_str(len)
    }

    fn str_u16(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        self.read_str(len)
    }

    fn read_str(&mut self, len: usize) -> Result<String> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or_else(|| TkError::Corrupt("truncated data blob".to_string()))?;
        self.pos += len;
        std::str::from_utf8(slice)
            .map(str::to_string)
            .map_err(|_| TkError::Corrupt("non-UTF-8 data blob".to_string()))
    }
}
