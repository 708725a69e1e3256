//! Store configuration.

use std::path::PathBuf;

use crate::types::{Hash, HashFn, Network};
use crate::{Error, Result};

/// Default blake3 content hash.
pub fn default_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Default undo checksum: a double blake3 of the body.
pub fn default_undo_checksum(data: &[u8]) -> Hash {
    *blake3::hash(blake3::hash(data).as_bytes()).as_bytes()
}

/// Configuration for either back-end.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Store directory. Must be absolute.
    pub location: PathBuf,

    /// Segment size cap in bytes (file back-end only).
    /// Default: 128 MB
    pub max_file_length: u32,

    /// Keep the key-value engine in memory (KV back-end only).
    /// Default: false
    pub memory: bool,

    /// Network tag written into record headers.
    pub network: Network,

    /// Content hash for block and undo payloads; recovery rebuilds their
    /// index keys with it.
    pub hasher: HashFn,

    /// Checksum written into undo record headers.
    pub undo_checksum: HashFn,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            location: PathBuf::new(),
            max_file_length: 128 * 1024 * 1024, // 128 MB
            memory: false,
            network: Network::default(),
            hasher: default_hash,
            undo_checksum: default_undo_checksum,
        }
    }
}

impl StoreOptions {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.location.is_absolute() {
            return Err(Error::Config("Location not absolute."));
        }
        if self.max_file_length == 0 {
            return Err(Error::Config("Invalid max file length."));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::StoreOptions;

    #[test]
    fn rejects_relative_locations() {
        let options = StoreOptions::new("store");
        assert!(options.validate().is_err());
    }

    #[test]
    fn rejects_zero_segment_cap() {
        let mut options = StoreOptions::new("/store");
        options.max_file_length = 0;
        assert!(options.validate().is_err());
    }
}
