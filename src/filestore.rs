//! File back-end: payloads packed into capped append-only segment files,
//! located through a side index.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, TryLockError};

use log::debug;

use crate::alloc;
use crate::batch::FileBatch;
use crate::config::StoreOptions;
use crate::index::{Index, IndexBatch};
use crate::layout;
use crate::record::{BlockRecord, FileRecord};
use crate::recovery;
use crate::store::Blockstore;
use crate::types::{Hash, RecordType};
use crate::{Error, Result};

pub(crate) struct FileInner {
    pub(crate) options: StoreOptions,
    pub(crate) index: Index,
    // One single-flight write lock per payload type, indexed by lock_slot.
    pub(crate) locks: [Mutex<()>; 3],
}

impl FileInner {
    pub(crate) fn segment_path(&self, rt: RecordType, fileno: u32) -> Result<PathBuf> {
        layout::filepath(&self.options.location, rt, fileno)
    }

    pub(crate) fn compose_header(&self, rt: RecordType, data: &[u8]) -> Vec<u8> {
        let mut header = Vec::with_capacity(rt.header_size() as usize);
        header.extend_from_slice(&self.options.network.magic.to_le_bytes());
        header.extend_from_slice(&(data.len() as u32).to_le_bytes());
        if rt == RecordType::Undo {
            header.extend_from_slice(&(self.options.undo_checksum)(data));
        }
        header
    }

    pub(crate) fn unlink_segment(&self, rt: RecordType, fileno: u32) -> Result<()> {
        let path = self.segment_path(rt, fileno)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("unlinked empty segment {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub struct FileStore {
    inner: Arc<FileInner>,
}

impl FileStore {
    /// Opens the store, creating the directory if needed. When the index is
    /// missing or behind the segment files on disk, it is rebuilt from them
    /// before the store is handed out.
    pub fn open(options: StoreOptions) -> Result<Self> {
        options.validate()?;
        fs::create_dir_all(&options.location)?;
        let index = Index::open(&options.location.join("index"))?;
        let inner = FileInner {
            options,
            index,
            locks: Default::default(),
        };
        if recovery::precheck(&inner)? {
            recovery::recover(&inner)?;
        }
        Ok(Self {
            inner: Arc::new(inner),
        })
    }
}

impl Blockstore for FileStore {
    type Batch = FileBatch;

    fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.inner.options.location)?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.inner.index.flush()
    }

    fn write(&self, rt: RecordType, hash: &Hash, data: &[u8]) -> Result<bool> {
        // Dedup before the lock so a repeated hash is a no-op rather than a
        // write conflict.
        if self.inner.index.has_block(rt, hash)? {
            return Ok(false);
        }

        let _guard = match self.inner.locks[rt.lock_slot()].try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(Error::AlreadyWriting),
            Err(TryLockError::Poisoned(_)) => return Err(Error::Corrupt("write lock poisoned")),
        };

        let length =
            u32::try_from(data.len()).map_err(|_| Error::Range("Record field out of range."))?;
        let alloc = alloc::allocate(
            &self.inner.index,
            self.inner.options.max_file_length,
            rt,
            length,
        )?;
        if alloc.advanced {
            debug!("{} writes advance to segment {}", rt.prefix(), alloc.fileno);
        }

        let path = self.inner.segment_path(rt, alloc.fileno)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let header = self.inner.compose_header(rt, data);
        let wrote = file.write(&header)?;
        if wrote != header.len() {
            return Err(Error::ShortIo("Could not write block magic."));
        }
        let wrote = file.write(data)?;
        if wrote != data.len() {
            return Err(Error::ShortIo("Could not write block."));
        }
        // The segment bytes must be durable before the index points at them.
        file.sync_data()?;
        drop(file);

        let hsize = rt.header_size();
        let block = BlockRecord {
            file: alloc.fileno,
            position: alloc.record.length + hsize,
            length,
        };
        let record = FileRecord {
            blocks: alloc.record.blocks + 1,
            used: alloc.record.used + hsize + length,
            length: alloc.record.length + hsize + length,
        };

        let mut batch = IndexBatch::new();
        batch.put_block(rt, hash, &block);
        batch.put_file(rt, alloc.fileno, &record);
        if alloc.advanced {
            batch.put_current(rt, alloc.fileno);
        }
        self.inner.index.apply(batch)?;
        Ok(true)
    }

    fn read(
        &self,
        rt: RecordType,
        hash: &Hash,
        offset: u32,
        size: Option<u32>,
    ) -> Result<Option<Vec<u8>>> {
        let Some(record) = self.inner.index.block_record(rt, hash)? else {
            return Ok(None);
        };
        if offset > record.length {
            return Err(Error::Range("Out-of-bounds read."));
        }
        let size = match size {
            Some(size) => size,
            None => record.length - offset,
        };
        if u64::from(offset) + u64::from(size) > u64::from(record.length) {
            return Err(Error::Range("Out-of-bounds read."));
        }

        let path = self.inner.segment_path(rt, record.file)?;
        let file = File::open(&path)?;
        let mut data = vec![0u8; size as usize];
        let read = file.read_at(&mut data, u64::from(record.position) + u64::from(offset))?;
        if read != data.len() {
            return Err(Error::ShortIo("Wrong number of bytes read."));
        }
        Ok(Some(data))
    }

    fn has(&self, rt: RecordType, hash: &Hash) -> Result<bool> {
        self.inner.index.has_block(rt, hash)
    }

    fn prune(&self, rt: RecordType, hash: &Hash) -> Result<bool> {
        let _guard = self.inner.locks[rt.lock_slot()]
            .lock()
            .map_err(|_| Error::Corrupt("write lock poisoned"))?;

        let Some(record) = self.inner.index.block_record(rt, hash)? else {
            return Ok(false);
        };
        let file = self
            .inner
            .index
            .file_record(rt, record.file)?
            .ok_or(Error::Corrupt("file record missing for live block"))?;

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

        let mut batch = IndexBatch::new();
        batch.del_block(rt, hash);
        if file.blocks == 0 {
            batch.del_file(rt, record.file);
        } else {
            batch.put_file(rt, record.file, &file);
        }
        self.inner.index.apply(batch)?;

        // Unlink only after the commit that zeroed the record. The current
        // pointer is never decremented; the next allocation recreates the
        // file if this was the current segment.
        if file.blocks == 0 {
            self.inner.unlink_segment(rt, record.file)?;
        }
        Ok(true)
    }

    fn batch(&self) -> FileBatch {
        FileBatch::new(Arc::clone(&self.inner))
    }
}
