use crate::{Error, Result};

/// Encoded size of both index record types.
pub const RECORD_SIZE: usize = 12;

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Range("Record field out of range."))
}

/// Location of one payload inside a segment file. `position` is the byte
/// offset of the body; the record header sits immediately before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub file: u32,
    pub position: u32,
    pub length: u32,
}

impl BlockRecord {
    pub fn new(file: u64, position: u64, length: u64) -> Result<Self> {
        Ok(Self {
            file: to_u32(file)?,
            position: to_u32(position)?,
            length: to_u32(length)?,
        })
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.file.to_le_bytes());
        buf[4..8].copy_from_slice(&self.position.to_le_bytes());
        buf[8..12].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RECORD_SIZE {
            return Err(Error::Corrupt("block record is not 12 bytes"));
        }
        let file = u32::from_le_bytes(bytes[0..4].try_into().expect("slice length"));
        let position = u32::from_le_bytes(bytes[4..8].try_into().expect("slice length"));
        let length = u32::from_le_bytes(bytes[8..12].try_into().expect("slice length"));
        Ok(Self {
            file,
            position,
            length,
        })
    }
}

/// Per-segment bookkeeping. `length` is the total bytes ever appended to the
/// segment and only grows; `used` tracks the live subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileRecord {
    pub blocks: u32,
    pub used: u32,
    pub length: u32,
}

impl FileRecord {
    pub fn new(blocks: u64, used: u64, length: u64) -> Result<Self> {
        Ok(Self {
            blocks: to_u32(blocks)?,
            used: to_u32(used)?,
            length: to_u32(length)?,
        })
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.blocks.to_le_bytes());
        buf[4..8].copy_from_slice(&self.used.to_le_bytes());
        buf[8..12].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RECORD_SIZE {
            return Err(Error::Corrupt("file record is not 12 bytes"));
        }
        let blocks = u32::from_le_bytes(bytes[0..4].try_into().expect("slice length"));
        let used = u32::from_le_bytes(bytes[4..8].try_into().expect("slice length"));
        let length = u32::from_le_bytes(bytes[8..12].try_into().expect("slice length"));
        Ok(Self {
            blocks,
            used,
            length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockRecord, FileRecord};

    #[test]
    fn block_record_round_trip() {
        let record = BlockRecord::new(3, 4096, 512).expect("record");
        let decoded = BlockRecord::decode(&record.encode()).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn file_record_round_trip() {
        let record = FileRecord::new(7, 952, 1024).expect("record");
        let decoded = FileRecord::decode(&record.encode()).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(BlockRecord::new(u64::from(u32::MAX) + 1, 0, 0).is_err());
        assert!(FileRecord::new(0, 0, u64::MAX).is_err());
    }

    #[test]
    fn rejects_short_buffers() {
        assert!(BlockRecord::decode(&[0u8; 11]).is_err());
        assert!(FileRecord::decode(&[0u8; 13]).is_err());
    }
}
