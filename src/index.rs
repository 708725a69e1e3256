//! Key-value index for the file back-end.
//!
//! Three record families share one tree, distinguished by a one-byte prefix
//! plus the payload type byte:
//!
//! ```text
//! b | type | hash      -> BlockRecord (12 bytes)
//! f | type | fileno BE -> FileRecord (12 bytes)
//! F | type             -> current segment number (4 bytes LE)
//! ```

use std::path::Path;

use crate::record::{BlockRecord, FileRecord};
use crate::types::{Hash, RecordType};
use crate::Result;

const KEY_BLOCK: u8 = b'b';
const KEY_FILE: u8 = b'f';
const KEY_CURRENT: u8 = b'F';

fn block_key(rt: RecordType, hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + hash.len());
    key.push(KEY_BLOCK);
    key.push(rt.type_byte());
    key.extend_from_slice(hash);
    key
}

fn file_key(rt: RecordType, fileno: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(6);
    key.push(KEY_FILE);
    key.push(rt.type_byte());
    key.extend_from_slice(&fileno.to_be_bytes());
    key
}

fn current_key(rt: RecordType) -> Vec<u8> {
    vec![KEY_CURRENT, rt.type_byte()]
}

pub(crate) struct Index {
    tree: sled::Db,
}

impl Index {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            tree: sled::open(path)?,
        })
    }

    pub fn block_record(&self, rt: RecordType, hash: &Hash) -> Result<Option<BlockRecord>> {
        match self.tree.get(block_key(rt, hash))? {
            Some(value) => Ok(Some(BlockRecord::decode(&value)?)),
            None => Ok(None),
        }
    }

    pub fn has_block(&self, rt: RecordType, hash: &Hash) -> Result<bool> {
        Ok(self.tree.contains_key(block_key(rt, hash))?)
    }

    pub fn file_record(&self, rt: RecordType, fileno: u32) -> Result<Option<FileRecord>> {
        match self.tree.get(file_key(rt, fileno))? {
            Some(value) => Ok(Some(FileRecord::decode(&value)?)),
            None => Ok(None),
        }
    }

    pub fn current_file(&self, rt: RecordType) -> Result<Option<u32>> {
        match self.tree.get(current_key(rt))? {
            Some(value) if value.len() == 4 => Ok(Some(u32::from_le_bytes(
                value[..4].try_into().expect("slice length"),
            ))),
            Some(_) => Err(crate::Error::Corrupt("current pointer is not 4 bytes")),
            None => Ok(None),
        }
    }

    pub fn apply(&self, batch: IndexBatch) -> Result<()> {
        self.tree.apply_batch(batch.into_inner())?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.tree.flush()?;
        Ok(())
    }

    pub fn wipe(&self) -> Result<()> {
        self.tree.clear()?;
        Ok(())
    }
}

/// Staged index mutations committed atomically via `Index::apply`.
#[derive(Default)]
pub(crate) struct IndexBatch {
    batch: sled::Batch,
}

impl IndexBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_block(&mut self, rt: RecordType, hash: &Hash, record: &BlockRecord) {
        self.batch.insert(block_key(rt, hash), record.encode().to_vec());
    }

    pub fn del_block(&mut self, rt: RecordType, hash: &Hash) {
        self.batch.remove(block_key(rt, hash));
    }

    pub fn put_file(&mut self, rt: RecordType, fileno: u32, record: &FileRecord) {
        self.batch.insert(file_key(rt, fileno), record.encode().to_vec());
    }

    pub fn del_file(&mut self, rt: RecordType, fileno: u32) {
        self.batch.remove(file_key(rt, fileno));
    }

    pub fn put_current(&mut self, rt: RecordType, fileno: u32) {
        self.batch.insert(current_key(rt), fileno.to_le_bytes().to_vec());
    }

    fn into_inner(self) -> sled::Batch {
        self.batch
    }
}

#[cfg(test)]
mod tests {
    use super::{Index, IndexBatch};
    use crate::record::{BlockRecord, FileRecord};
    use crate::types::RecordType;
    use tempfile::tempdir;

    #[test]
    fn batch_commits_all_families() {
        let dir = tempdir().expect("tempdir");
        let index = Index::open(&dir.path().join("index")).expect("open");

        let hash = [7u8; 32];
        let block = BlockRecord {
            file: 0,
            position: 8,
            length: 128,
        };
        let file = FileRecord {
            blocks: 1,
            used: 136,
            length: 136,
        };

        let mut batch = IndexBatch::new();
        batch.put_block(RecordType::Block, &hash, &block);
        batch.put_file(RecordType::Block, 0, &file);
        batch.put_current(RecordType::Block, 0);
        index.apply(batch).expect("apply");

        assert_eq!(
            index.block_record(RecordType::Block, &hash).expect("get"),
            Some(block)
        );
        assert_eq!(
            index.file_record(RecordType::Block, 0).expect("get"),
            Some(file)
        );
        assert_eq!(index.current_file(RecordType::Block).expect("get"), Some(0));
        assert!(!index.has_block(RecordType::Undo, &hash).expect("has"));
    }
}
