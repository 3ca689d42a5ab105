use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FsError {
    #[error("Every inode in the table is in use")]
    ExhaustedInodes,
    #[error("Every data block on the device is in use")]
    ExhaustedBlocks,
    #[error("Inode {0} is outside of the inode table")]
    NotFound(u32),
    #[error("Corrupt {kind} record: {reason}")]
    CorruptRecord { kind: &'static str, reason: String },
    #[error("Target inode is not a valid directory")]
    InvalidDirectory,
    #[error("No directory entry references inode {inode}")]
    EntryNotFound { inode: u32 },
    #[error("No directory entry is named {0:?}")]
    NameNotFound(String),
    #[error("Directory has no free entry left")]
    DirectoryFull,
    #[error("File of {size} bytes does not fit, the maximum is {max} bytes")]
    FileTooLarge { size: usize, max: usize },
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

impl FsError {
    pub(crate) fn corrupt<E: ToString>(kind: &'static str, reason: E) -> Self {
        FsError::CorruptRecord {
            kind,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
