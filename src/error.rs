use thiserror::Error;

/// Errors produced while building or serializing an image.
#[derive(Error, Debug)]
pub enum LcfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("not a directory")]
    NotDirectory,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("entry already exists: {0}")]
    Exists(String),

    #[error("node is already attached to a parent")]
    AlreadyAttached,

    #[error("name too long (max {max} bytes): {name}")]
    NameTooLong { name: String, max: usize },

    #[error("no data available for {0}")]
    NoData(String),
}

pub type Result<T> = std::result::Result<T, LcfsError>;
