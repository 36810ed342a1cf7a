use core::fmt;

use crate::block::BlockDeviceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsError {
    PathNotFound,
    AlreadyExists,
    NotADirectory,
    NotAFile,
    DirectoryNotEmpty,
    DescriptorTableFull,
    InvalidDescriptor,
    /// No free cluster left on the volume.
    AllocationExhausted,
    /// A chain ended, or broke, before the requested byte count was moved.
    ShortIo,
    /// Name does not fit the 8.3 short-name layout.
    InvalidName,
    InvalidVolume(&'static str),
    UnsupportedVolume(&'static str),
    Config(&'static str),
    Device(&'static str),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsError::PathNotFound => "No such file or directory.",
            FsError::AlreadyExists => "File already exists.",
            FsError::NotADirectory => "Not a directory.",
            FsError::NotAFile => "Is a directory.",
            FsError::DirectoryNotEmpty => "Directory not empty.",
            FsError::DescriptorTableFull => "Too many open files.",
            FsError::InvalidDescriptor => "Bad file descriptor.",
            FsError::AllocationExhausted => "Disk full.",
            FsError::ShortIo => "Cluster chain ended early.",
            FsError::InvalidName => "Invalid file name.",
            FsError::InvalidVolume(msg)
            | FsError::UnsupportedVolume(msg)
            | FsError::Config(msg)
            | FsError::Device(msg) => msg,
        }
    }

    /// Only device failures leave the volume in an unknown state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::Device(_))
    }

    pub(crate) fn device<E: BlockDeviceError>(err: E) -> Self {
        FsError::Device(err.as_str())
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for FsError {}
