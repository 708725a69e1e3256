use std::path::{Path, PathBuf};

use crate::types::RecordType;
use crate::{Error, Result};

/// Highest segment number representable in a five-digit filename.
pub const MAX_FILE_NUM: u32 = 99_999;

pub fn filename(rt: RecordType, fileno: u32) -> Result<String> {
    if fileno > MAX_FILE_NUM {
        return Err(Error::Range("File number too large."));
    }
    Ok(format!("{}{:05}.dat", rt.prefix(), fileno))
}

pub fn filepath(location: &Path, rt: RecordType, fileno: u32) -> Result<PathBuf> {
    Ok(location.join(filename(rt, fileno)?))
}

/// Parses `<prefix><n:05>.dat` back into its type and segment number.
/// Foreign files in the store directory yield `None` and are skipped.
pub fn parse_filename(name: &str) -> Option<(RecordType, u32)> {
    let stem = name.strip_suffix(".dat")?;
    if stem.len() != 8 {
        return None;
    }
    let rt = RecordType::from_prefix(&stem[..3])?;
    let digits = &stem[3..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().map(|fileno| (rt, fileno))
}

#[cfg(test)]
mod tests {
    use super::{filename, parse_filename};
    use crate::types::RecordType;

    #[test]
    fn formats_five_digit_names() {
        assert_eq!(filename(RecordType::Block, 0).expect("name"), "blk00000.dat");
        assert_eq!(filename(RecordType::Undo, 123).expect("name"), "blu00123.dat");
        assert_eq!(
            filename(RecordType::Merkle, 99_999).expect("name"),
            "blm99999.dat"
        );
    }

    #[test]
    fn rejects_numbers_past_the_cap() {
        assert!(filename(RecordType::Block, 100_000).is_err());
    }

    #[test]
    fn parses_only_store_filenames() {
        assert_eq!(
            parse_filename("blk00042.dat"),
            Some((RecordType::Block, 42))
        );
        assert_eq!(parse_filename("blu99999.dat"), Some((RecordType::Undo, 99_999)));
        assert_eq!(parse_filename("blk0042.dat"), None);
        assert_eq!(parse_filename("blk0004x.dat"), None);
        assert_eq!(parse_filename("blx00042.dat"), None);
        assert_eq!(parse_filename("blk00042.tmp"), None);
        assert_eq!(parse_filename("index"), None);
    }
}
