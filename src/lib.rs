//! Content-addressed block store.
//!
//! Persists three kinds of fixed-meaning binary payloads (full blocks,
//! undo coins, and merkle blocks) keyed by a 32-byte content hash. Two
//! back-ends share one contract: [`FileStore`] packs payloads into capped
//! append-only segment files with a side index, and [`KvStore`] delegates
//! persistence to the ordered key-value engine directly.

pub mod batch;
pub mod config;
pub mod error;
pub mod filestore;
pub mod kvstore;
pub mod layout;
pub mod record;
pub mod store;
pub mod types;

mod alloc;
mod index;
mod recovery;

pub use batch::{FileBatch, KvBatch};
pub use config::StoreOptions;
pub use error::{Error, Result};
pub use filestore::FileStore;
pub use kvstore::KvStore;
pub use record::{BlockRecord, FileRecord};
pub use store::{Blockstore, StoreBatch};
pub use types::{Hash, HashFn, Network, RecordType};
