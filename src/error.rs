use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index error: {0}")]
    Index(#[from] sled::Error),
    #[error("{0}")]
    Config(&'static str),
    #[error("{0}")]
    Range(&'static str),
    #[error("Block length above max file length.")]
    WriteTooLarge,
    #[error("Already writing.")]
    AlreadyWriting,
    #[error("{0}")]
    ShortIo(&'static str),
    #[error("Already written.")]
    AlreadyWritten,
    #[error("corrupt store: {0}")]
    Corrupt(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
