use std::env;
use std::path::PathBuf;

use crate::error::{FsError, FsResult};
use crate::handle::MAX_OPEN_FILES;

pub const IMAGE_PATH_VAR: &str = "FAT_FS_PATH";
pub const MAX_OPEN_FILES_VAR: &str = "FAT_MAX_OPEN_FILES";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountConfig {
    pub image_path: PathBuf,
    /// Descriptor limit, at most [`MAX_OPEN_FILES`].
    pub max_open_files: usize,
}

impl MountConfig {
    pub fn new<P: Into<PathBuf>>(image_path: P) -> Self {
        Self {
            image_path: image_path.into(),
            max_open_files: MAX_OPEN_FILES,
        }
    }

    pub fn from_env() -> FsResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FsResult<Self> {
        let Some(path) = lookup(IMAGE_PATH_VAR) else {
            return Err(FsError::Config("FAT_FS_PATH is not set."));
        };
        if path.trim().is_empty() {
            return Err(FsError::Config("FAT_FS_PATH is empty."));
        }
        let mut cfg = Self::new(path.trim());
        if let Some(raw) = lookup(MAX_OPEN_FILES_VAR) {
            let limit: usize = raw
                .trim()
                .parse()
                .map_err(|_| FsError::Config("FAT_MAX_OPEN_FILES is not a number."))?;
            cfg = cfg.with_max_open_files(limit)?;
        }
        Ok(cfg)
    }

    pub fn with_max_open_files(mut self, limit: usize) -> FsResult<Self> {
        if limit == 0 || limit > MAX_OPEN_FILES {
            return Err(FsError::Config("Open file limit out of range."));
        }
        self.max_open_files = limit;
        Ok(self)
    }
}
