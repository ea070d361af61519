use std::path::PathBuf;

use types_rs::DecodeError;
use zip::result::ZipError;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Archive { path: PathBuf, source: ZipError },

    #[error("entry {name} is {size} bytes, over the {limit} byte limit")]
    EntryTooLarge { name: String, size: u64, limit: u64 },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl AuditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, source: ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }
}
