//! User-space FAT32 engine over a raw block device or disk image.
//!
//! [`Session`] owns a mounted [`Volume`] together with the current directory
//! and the open-file table. The [`global`] module wraps one session per
//! process, mounted lazily from the `FAT_FS_PATH` environment variable.

pub mod block;
pub mod bpb;
pub mod chain;
pub mod config;
pub mod dir;
pub mod dirent;
pub mod error;
pub mod fat;
pub mod global;
pub mod handle;
pub mod name;
pub mod path;
pub mod session;
pub mod volume;

#[cfg(test)]
mod testutil;

pub use block::{BlockDevice, BlockDeviceError, ImageError, ImageFile, RamDisk, BLOCK_SIZE};
pub use bpb::Geometry;
pub use config::MountConfig;
pub use dirent::DirEntry;
pub use error::{FsError, FsResult};
pub use handle::{Fd, MAX_OPEN_FILES};
pub use name::ShortName;
pub use session::{Session, Usage};
pub use volume::Volume;
