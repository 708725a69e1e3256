//! Segment allocation for the file back-end.

use crate::index::Index;
use crate::layout::MAX_FILE_NUM;
use crate::record::FileRecord;
use crate::types::RecordType;
use crate::{Error, Result};

/// Segment chosen to receive one write. `record` is the segment state before
/// the write; `advanced` is set when the current-segment pointer must be
/// committed alongside it.
#[derive(Debug)]
pub(crate) struct Allocation {
    pub fileno: u32,
    pub record: FileRecord,
    pub advanced: bool,
}

/// Chooses the segment for a payload of `length` bytes without touching
/// disk. The writer commits the resulting records.
pub(crate) fn allocate_with<C, F>(
    current: C,
    file_record: F,
    max_file_length: u32,
    rt: RecordType,
    length: u32,
) -> Result<Allocation>
where
    C: FnOnce() -> Result<Option<u32>>,
    F: FnOnce(u32) -> Result<Option<FileRecord>>,
{
    let total = u64::from(rt.header_size()) + u64::from(length);
    if total > u64::from(max_file_length) {
        return Err(Error::WriteTooLarge);
    }

    let (fileno, record, fresh) = match current()? {
        Some(fileno) => match file_record(fileno)? {
            Some(record) => (fileno, record, false),
            // The segment was pruned away while still current; reuse its
            // number with a fresh record.
            None => (fileno, FileRecord::default(), true),
        },
        None => (0, FileRecord::default(), true),
    };

    if u64::from(record.length) + total > u64::from(max_file_length) {
        let next = fileno
            .checked_add(1)
            .filter(|&n| n <= MAX_FILE_NUM)
            .ok_or(Error::Range("File number too large."))?;
        return Ok(Allocation {
            fileno: next,
            record: FileRecord::default(),
            advanced: true,
        });
    }

    Ok(Allocation {
        fileno,
        record,
        advanced: fresh,
    })
}

pub(crate) fn allocate(
    index: &Index,
    max_file_length: u32,
    rt: RecordType,
    length: u32,
) -> Result<Allocation> {
    allocate_with(
        || index.current_file(rt),
        |fileno| index.file_record(rt, fileno),
        max_file_length,
        rt,
        length,
    )
}

#[cfg(test)]
mod tests {
    use super::allocate_with;
    use crate::record::FileRecord;
    use crate::types::RecordType;
    use crate::Error;

    #[test]
    fn starts_at_segment_zero() {
        let alloc = allocate_with(|| Ok(None), |_| Ok(None), 1024, RecordType::Block, 128)
            .expect("allocate");
        assert_eq!(alloc.fileno, 0);
        assert_eq!(alloc.record, FileRecord::default());
        assert!(alloc.advanced);
    }

    #[test]
    fn stays_in_segment_with_capacity() {
        let record = FileRecord {
            blocks: 6,
            used: 816,
            length: 816,
        };
        let alloc = allocate_with(
            || Ok(Some(2)),
            |_| Ok(Some(record)),
            1024,
            RecordType::Block,
            128,
        )
        .expect("allocate");
        assert_eq!(alloc.fileno, 2);
        assert_eq!(alloc.record, record);
        assert!(!alloc.advanced);
    }

    #[test]
    fn advances_when_the_write_would_overflow() {
        let record = FileRecord {
            blocks: 7,
            used: 952,
            length: 952,
        };
        let alloc = allocate_with(
            || Ok(Some(0)),
            |_| Ok(Some(record)),
            1024,
            RecordType::Block,
            128,
        )
        .expect("allocate");
        assert_eq!(alloc.fileno, 1);
        assert_eq!(alloc.record, FileRecord::default());
        assert!(alloc.advanced);
    }

    #[test]
    fn accounts_for_the_undo_header() {
        let record = FileRecord {
            blocks: 6,
            used: 1008,
            length: 1008,
        };
        // 1008 + 40 + 128 exceeds the cap even though 1008 + 8 + 128 fits.
        let alloc = allocate_with(
            || Ok(Some(0)),
            |_| Ok(Some(record)),
            1024,
            RecordType::Undo,
            128,
        )
        .expect("allocate");
        assert_eq!(alloc.fileno, 1);
    }

    #[test]
    fn rejects_payloads_above_the_cap() {
        let err = allocate_with(|| Ok(None), |_| Ok(None), 1024, RecordType::Block, 1020)
            .expect_err("too large");
        assert!(matches!(err, Error::WriteTooLarge));
    }

    #[test]
    fn reuses_a_pruned_current_segment() {
        let alloc = allocate_with(|| Ok(Some(5)), |_| Ok(None), 1024, RecordType::Block, 128)
            .expect("allocate");
        assert_eq!(alloc.fileno, 5);
        assert_eq!(alloc.record, FileRecord::default());
        assert!(alloc.advanced);
    }

    #[test]
    fn refuses_to_advance_past_the_filename_cap() {
        let record = FileRecord {
            blocks: 7,
            used: 952,
            length: 952,
        };
        let err = allocate_with(
            || Ok(Some(99_999)),
            |_| Ok(Some(record)),
            1024,
            RecordType::Block,
            128,
        )
        .expect_err("cap");
        assert!(matches!(err, Error::Range(_)));
    }
}
