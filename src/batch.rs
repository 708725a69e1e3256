//! Single-use staged batches.
//!
//! Operations stage in memory in call order and touch neither disk nor
//! index until `commit`. Readers observe either none or all of a batch's
//! index mutations.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use crate::alloc;
use crate::filestore::FileInner;
use crate::index::IndexBatch;
use crate::kvstore;
use crate::record::{BlockRecord, FileRecord};
use crate::store::StoreBatch;
use crate::types::{Hash, RecordType};
use crate::{Error, Result};

enum BatchOp {
    Write {
        rt: RecordType,
        hash: Hash,
        data: Vec<u8>,
    },
    Prune {
        rt: RecordType,
        hash: Hash,
    },
}

/// Batch for the key-value back-end. Commit translates the staged ops into
/// one atomic engine batch.
pub struct KvBatch {
    db: sled::Db,
    ops: Vec<BatchOp>,
    committed: bool,
}

impl KvBatch {
    pub(crate) fn new(db: sled::Db) -> Self {
        Self {
            db,
            ops: Vec::new(),
            committed: false,
        }
    }
}

impl StoreBatch for KvBatch {
    fn write(&mut self, rt: RecordType, hash: &Hash, data: &[u8]) -> Result<()> {
        if self.committed {
            return Err(Error::AlreadyWritten);
        }
        self.ops.push(BatchOp::Write {
            rt,
            hash: *hash,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn prune(&mut self, rt: RecordType, hash: &Hash) -> Result<()> {
        if self.committed {
            return Err(Error::AlreadyWritten);
        }
        self.ops.push(BatchOp::Prune { rt, hash: *hash });
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Err(Error::AlreadyWritten);
        }
        let mut batch = sled::Batch::default();
        for op in &self.ops {
            match op {
                BatchOp::Write { rt, hash, data } => {
                    batch.insert(kvstore::payload_key(*rt, hash), data.clone());
                }
                BatchOp::Prune { rt, hash } => {
                    batch.remove(kvstore::payload_key(*rt, hash));
                }
            }
        }
        self.db.apply_batch(batch)?;
        self.committed = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.committed {
            return Err(Error::AlreadyWritten);
        }
        self.ops.clear();
        Ok(())
    }
}

/// Batch for the file back-end. Commit holds all three type locks, replays
/// the staged ops against an in-memory overlay of the index, appends every
/// segment byte, then commits the index mutations as one engine batch.
pub struct FileBatch {
    inner: Arc<FileInner>,
    ops: Vec<BatchOp>,
    committed: bool,
}

impl FileBatch {
    pub(crate) fn new(inner: Arc<FileInner>) -> Self {
        Self {
            inner,
            ops: Vec::new(),
            committed: false,
        }
    }
}

impl StoreBatch for FileBatch {
    fn write(&mut self, rt: RecordType, hash: &Hash, data: &[u8]) -> Result<()> {
        if self.committed {
            return Err(Error::AlreadyWritten);
        }
        self.ops.push(BatchOp::Write {
            rt,
            hash: *hash,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn prune(&mut self, rt: RecordType, hash: &Hash) -> Result<()> {
        if self.committed {
            return Err(Error::AlreadyWritten);
        }
        self.ops.push(BatchOp::Prune { rt, hash: *hash });
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Err(Error::AlreadyWritten);
        }

        // Lock order is fixed (block, undo, merkle) so two batches cannot
        // deadlock against each other or against single writes.
        let mut guards = Vec::with_capacity(self.inner.locks.len());
        for lock in &self.inner.locks {
            guards.push(
                lock.lock()
                    .map_err(|_| Error::Corrupt("write lock poisoned"))?,
            );
        }

        // Overlay of index state as the staged ops would leave it. Lookups
        // fall through to the real index for anything the batch has not
        // touched yet.
        let mut currents: HashMap<RecordType, u32> = HashMap::new();
        let mut file_records: HashMap<(RecordType, u32), FileRecord> = HashMap::new();
        let mut block_records: HashMap<(RecordType, Hash), Option<BlockRecord>> = HashMap::new();
        let mut appends: HashMap<(RecordType, u32), Vec<u8>> = HashMap::new();

        for op in &self.ops {
            match op {
                BatchOp::Write { rt, hash, data } => {
                    let rt = *rt;
                    let exists = match block_records.get(&(rt, *hash)) {
                        Some(Some(_)) => true,
                        Some(None) => false,
                        None => self.inner.index.has_block(rt, hash)?,
                    };
                    if exists {
                        continue;
                    }
                    let length = u32::try_from(data.len())
                        .map_err(|_| Error::Range("Record field out of range."))?;
                    let alloc = alloc::allocate_with(
                        || match currents.get(&rt) {
                            Some(fileno) => Ok(Some(*fileno)),
                            None => self.inner.index.current_file(rt),
                        },
                        |fileno| match file_records.get(&(rt, fileno)) {
                            Some(record) => Ok(Some(*record)),
                            None => self.inner.index.file_record(rt, fileno),
                        },
                        self.inner.options.max_file_length,
                        rt,
                        length,
                    )?;

                    let hsize = rt.header_size();
                    let mut bytes = self.inner.compose_header(rt, data);
                    bytes.extend_from_slice(data);
                    appends
                        .entry((rt, alloc.fileno))
                        .or_default()
                        .extend_from_slice(&bytes);

                    block_records.insert(
                        (rt, *hash),
                        Some(BlockRecord {
                            file: alloc.fileno,
                            position: alloc.record.length + hsize,
                            length,
                        }),
                    );
                    file_records.insert(
                        (rt, alloc.fileno),
                        FileRecord {
                            blocks: alloc.record.blocks + 1,
                            used: alloc.record.used + hsize + length,
                            length: alloc.record.length + hsize + length,
                        },
                    );
                    if alloc.advanced {
                        currents.insert(rt, alloc.fileno);
                    }
                }
                BatchOp::Prune { rt, hash } => {
                    let rt = *rt;
                    let record = match block_records.get(&(rt, *hash)) {
                        Some(Some(record)) => Some(*record),
                        Some(None) => None,
                        None => self.inner.index.block_record(rt, hash)?,
                    };
                    let Some(record) = record else {
                        continue;
                    };
                    let file = match file_records.get(&(rt, record.file)) {
                        Some(file) => *file,
                        None => self
                            .inner
                            .index
                            .file_record(rt, record.file)?
                            .ok_or(Error::Corrupt("file record missing for live block"))?,
                    };
                    let hsize = rt.header_size();
                    let file = FileRecord {
                        blocks: file
                            .blocks
                            .checked_sub(1)
                            .ok_or(Error::Corrupt("file record block count underflow"))?,
                        used: file
                            .used
                            .checked_sub(hsize + record.length)
                            .ok_or(Error::Corrupt("file record used bytes underflow"))?,
                        length: file.length,
                    };
                    block_records.insert((rt, *hash), None);
                    file_records.insert((rt, record.file), file);
                }
            }
        }

        let mut index_batch = IndexBatch::new();
        let mut unlinks = Vec::new();
        for (&(rt, hash), staged) in &block_records {
            match staged {
                Some(record) => index_batch.put_block(rt, &hash, record),
                None => index_batch.del_block(rt, &hash),
            }
        }
        for (&(rt, fileno), record) in &file_records {
            if record.blocks == 0 {
                index_batch.del_file(rt, fileno);
                unlinks.push((rt, fileno));
            } else {
                index_batch.put_file(rt, fileno, record);
            }
        }
        for (&rt, &fileno) in &currents {
            index_batch.put_current(rt, fileno);
        }

        // Segment bytes go down and get synced before the index points at
        // them. Segments that ended the batch empty are never written.
        for (&(rt, fileno), bytes) in &appends {
            if file_records
                .get(&(rt, fileno))
                .map_or(false, |record| record.blocks == 0)
            {
                continue;
            }
            let path = self.inner.segment_path(rt, fileno)?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            let wrote = file.write(bytes)?;
            if wrote != bytes.len() {
                return Err(Error::ShortIo("Could not write block."));
            }
            file.sync_data()?;
        }

        self.inner.index.apply(index_batch)?;

        for (rt, fileno) in unlinks {
            self.inner.unlink_segment(rt, fileno)?;
        }

        self.committed = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.committed {
            return Err(Error::AlreadyWritten);
        }
        self.ops.clear();
        Ok(())
    }
}
