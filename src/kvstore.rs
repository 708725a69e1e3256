//! Key-value back-end: payloads live directly in the ordered engine as
//! `prefix | hash -> body`.

use std::fs;

use crate::batch::KvBatch;
use crate::config::StoreOptions;
use crate::store::Blockstore;
use crate::types::{Hash, RecordType};
use crate::{Error, Result};

pub(crate) fn payload_key(rt: RecordType, hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + hash.len());
    key.extend_from_slice(rt.prefix().as_bytes());
    key.extend_from_slice(hash);
    key
}

pub struct KvStore {
    options: StoreOptions,
    db: sled::Db,
}

impl KvStore {
    pub fn open(options: StoreOptions) -> Result<Self> {
        options.validate()?;
        let db = if options.memory {
            sled::Config::new().temporary(true).open()?
        } else {
            sled::open(&options.location)?
        };
        Ok(Self { options, db })
    }
}

impl Blockstore for KvStore {
    type Batch = KvBatch;

    fn ensure(&self) -> Result<()> {
        if !self.options.memory {
            fs::create_dir_all(&self.options.location)?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn write(&self, rt: RecordType, hash: &Hash, data: &[u8]) -> Result<bool> {
        let key = payload_key(rt, hash);
        if self.db.contains_key(&key)? {
            return Ok(false);
        }
        self.db.insert(key, data.to_vec())?;
        Ok(true)
    }

    fn read(
        &self,
        rt: RecordType,
        hash: &Hash,
        offset: u32,
        size: Option<u32>,
    ) -> Result<Option<Vec<u8>>> {
        let Some(value) = self.db.get(payload_key(rt, hash))? else {
            return Ok(None);
        };
        let total = value.len() as u64;
        if u64::from(offset) > total {
            return Err(Error::Range("Out-of-bounds read."));
        }
        let size = match size {
            Some(size) => size,
            None => (total - u64::from(offset)) as u32,
        };
        if u64::from(offset) + u64::from(size) > total {
            return Err(Error::Range("Out-of-bounds read."));
        }
        let start = offset as usize;
        Ok(Some(value[start..start + size as usize].to_vec()))
    }

    fn has(&self, rt: RecordType, hash: &Hash) -> Result<bool> {
        Ok(self.db.contains_key(payload_key(rt, hash))?)
    }

    fn prune(&self, rt: RecordType, hash: &Hash) -> Result<bool> {
        Ok(self.db.remove(payload_key(rt, hash))?.is_some())
    }

    fn batch(&self) -> KvBatch {
        KvBatch::new(self.db.clone())
    }
}
