//! Index rebuild after index loss or a torn write.
//!
//! The scanner reparses segment files header by header. Any header failure,
//! wrong magic or a record overrunning the end of the file, marks the
//! torn-tail boundary: everything from that offset on is truncated away and
//! the scan of that file stops. It never skips ahead, which keeps the scan
//! linear in file size and makes rebuilding a fixed point.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::filestore::FileInner;
use crate::index::IndexBatch;
use crate::layout;
use crate::record::{BlockRecord, FileRecord};
use crate::types::{Hash, RecordType};
use crate::Result;

struct ScannedRecord {
    hash: Hash,
    position: u32,
    length: u32,
}

/// Segment files present on disk, ordered by type then segment number.
fn segment_files(inner: &FileInner) -> Result<Vec<(RecordType, u32, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(&inner.options.location)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if let Some((rt, fileno)) = layout::parse_filename(name) {
            files.push((rt, fileno, path));
        }
    }
    files.sort_by_key(|(rt, fileno, _)| (rt.type_byte(), *fileno));
    Ok(files)
}

/// True when the index must be rebuilt: a segment file on disk has no
/// `FileRecord`, or its size exceeds what the index acknowledged.
pub(crate) fn precheck(inner: &FileInner) -> Result<bool> {
    for (rt, fileno, path) in segment_files(inner)? {
        let Some(record) = inner.index.file_record(rt, fileno)? else {
            return Ok(true);
        };
        let size = fs::metadata(&path)?.len();
        if size > u64::from(record.length) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Parses one segment file from offset zero. Returns the records that
/// survive validation and the byte offset where the valid prefix ends.
fn scan_segment(
    inner: &FileInner,
    rt: RecordType,
    path: &Path,
) -> Result<(Vec<ScannedRecord>, u64, u64)> {
    let data = fs::read(path)?;
    let hsize = rt.header_size() as usize;
    let mut records = Vec::new();
    let mut offset = 0usize;

    loop {
        if offset + hsize > data.len() {
            break;
        }
        let magic = u32::from_le_bytes(data[offset..offset + 4].try_into().expect("slice length"));
        if magic != inner.options.network.magic {
            break;
        }
        let length =
            u32::from_le_bytes(data[offset + 4..offset + 8].try_into().expect("slice length"));
        let body_start = offset + hsize;
        let Some(body_end) = body_start.checked_add(length as usize) else {
            break;
        };
        if body_end > data.len() {
            break;
        }
        let body = &data[body_start..body_end];
        let hash = match rt {
            RecordType::Block | RecordType::Undo => (inner.options.hasher)(body),
            // Merkle payloads carry the hash they are keyed by in their
            // leading 32 bytes.
            RecordType::Merkle => {
                if body.len() < 32 {
                    break;
                }
                body[..32].try_into().expect("slice length")
            }
        };
        records.push(ScannedRecord {
            hash,
            position: body_start as u32,
            length,
        });
        offset = body_end;
    }

    Ok((records, offset as u64, data.len() as u64))
}

/// Rebuilds the index from the segment files, truncating torn tails.
/// Running it twice over the same disk state yields an identical index.
pub(crate) fn recover(inner: &FileInner) -> Result<()> {
    inner.index.wipe()?;

    let files = segment_files(inner)?;
    let mut batch = IndexBatch::new();
    let mut current: [Option<u32>; 3] = [None; 3];
    let mut total = 0usize;

    for (rt, fileno, path) in &files {
        let (records, valid_len, actual_len) = scan_segment(inner, *rt, path)?;
        if records.is_empty() {
            // Nothing acknowledged ever lived here; an empty segment must
            // not exist, so it gets no file record either.
            warn!("removing segment {} with no valid records", path.display());
            fs::remove_file(path)?;
            continue;
        }
        if valid_len < actual_len {
            warn!(
                "truncating torn tail in {} ({} -> {} bytes)",
                path.display(),
                actual_len,
                valid_len
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        let mut record = FileRecord::default();
        for scanned in &records {
            batch.put_block(
                *rt,
                &scanned.hash,
                &BlockRecord {
                    file: *fileno,
                    position: scanned.position,
                    length: scanned.length,
                },
            );
            record.blocks += 1;
            record.used += rt.header_size() + scanned.length;
        }
        record.length = valid_len as u32;
        batch.put_file(*rt, *fileno, &record);
        total += records.len();

        let slot = rt.lock_slot();
        current[slot] = Some(current[slot].map_or(*fileno, |n| n.max(*fileno)));
    }

    for rt in RecordType::ALL {
        if let Some(fileno) = current[rt.lock_slot()] {
            batch.put_current(rt, fileno);
        }
    }

    inner.index.apply(batch)?;
    inner.index.flush()?;
    info!(
        "rebuilt index from {} segment files ({} records)",
        files.len(),
        total
    );
    Ok(())
}
