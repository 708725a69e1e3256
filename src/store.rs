//! Shared store surface implemented by both back-ends.

use crate::types::{Hash, RecordType};
use crate::Result;

/// A content-addressed payload store.
///
/// Absent keys read as `Ok(None)`: the null payload, distinct from an empty
/// one. Dedup on write and prune of an absent key report `false`; neither is
/// an error.
pub trait Blockstore {
    type Batch: StoreBatch;

    /// Creates the store directory if it is missing.
    fn ensure(&self) -> Result<()>;

    /// Flushes index state. Dropping the store releases its handles.
    fn close(&self) -> Result<()>;

    /// Persists a payload under `hash`. Returns `false` when the hash is
    /// already stored, in which case nothing is written.
    fn write(&self, rt: RecordType, hash: &Hash, data: &[u8]) -> Result<bool>;

    /// Reads `size` bytes of the payload starting at `offset`; the full body
    /// when `size` is `None`.
    fn read(&self, rt: RecordType, hash: &Hash, offset: u32, size: Option<u32>)
        -> Result<Option<Vec<u8>>>;

    fn has(&self, rt: RecordType, hash: &Hash) -> Result<bool>;

    /// Removes a payload. Returns `false` when the hash was not stored.
    fn prune(&self, rt: RecordType, hash: &Hash) -> Result<bool>;

    /// Starts an atomic multi-operation batch.
    fn batch(&self) -> Self::Batch;

    fn write_block(&self, hash: &Hash, data: &[u8]) -> Result<bool> {
        self.write(RecordType::Block, hash, data)
    }

    fn write_undo(&self, hash: &Hash, data: &[u8]) -> Result<bool> {
        self.write(RecordType::Undo, hash, data)
    }

    fn write_merkle(&self, hash: &Hash, data: &[u8]) -> Result<bool> {
        self.write(RecordType::Merkle, hash, data)
    }

    fn read_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        self.read(RecordType::Block, hash, 0, None)
    }

    fn read_undo(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        self.read(RecordType::Undo, hash, 0, None)
    }

    fn read_merkle(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        self.read(RecordType::Merkle, hash, 0, None)
    }

    fn has_block(&self, hash: &Hash) -> Result<bool> {
        self.has(RecordType::Block, hash)
    }

    fn has_undo(&self, hash: &Hash) -> Result<bool> {
        self.has(RecordType::Undo, hash)
    }

    fn has_merkle(&self, hash: &Hash) -> Result<bool> {
        self.has(RecordType::Merkle, hash)
    }

    fn prune_block(&self, hash: &Hash) -> Result<bool> {
        self.prune(RecordType::Block, hash)
    }

    fn prune_undo(&self, hash: &Hash) -> Result<bool> {
        self.prune(RecordType::Undo, hash)
    }

    fn prune_merkle(&self, hash: &Hash) -> Result<bool> {
        self.prune(RecordType::Merkle, hash)
    }
}

/// A single-use staging batch. Operations accumulate in memory and hit disk
/// only on `commit`, which is atomic with respect to readers. A committed
/// batch rejects further use.
pub trait StoreBatch {
    fn write(&mut self, rt: RecordType, hash: &Hash, data: &[u8]) -> Result<()>;

    fn prune(&mut self, rt: RecordType, hash: &Hash) -> Result<()>;

    /// Commits every staged operation atomically. Fails with
    /// "Already written." on reuse.
    fn commit(&mut self) -> Result<()>;

    /// Drops staged operations. Fails with "Already written." after commit.
    fn clear(&mut self) -> Result<()>;

    fn write_block(&mut self, hash: &Hash, data: &[u8]) -> Result<()> {
        self.write(RecordType::Block, hash, data)
    }

    fn write_undo(&mut self, hash: &Hash, data: &[u8]) -> Result<()> {
        self.write(RecordType::Undo, hash, data)
    }

    fn write_merkle(&mut self, hash: &Hash, data: &[u8]) -> Result<()> {
        self.write(RecordType::Merkle, hash, data)
    }

    fn prune_block(&mut self, hash: &Hash) -> Result<()> {
        self.prune(RecordType::Block, hash)
    }

    fn prune_undo(&mut self, hash: &Hash) -> Result<()> {
        self.prune(RecordType::Undo, hash)
    }

    fn prune_merkle(&mut self, hash: &Hash) -> Result<()> {
        self.prune(RecordType::Merkle, hash)
    }
}
