//! Slash-separated path walking.

use crate::block::BlockDevice;
use crate::dirent::DirEntry;
use crate::error::{FsError, FsResult};
use crate::volume::Volume;

pub const SEP: char = '/';

/// Splits `path` into its parent path and final name.
///
/// One trailing separator is ignored. A path with no separator has the empty
/// parent, which resolves to the current directory. The parent keeps its
/// trailing separator, so `/a.txt` splits into `/` and `a.txt`.
pub fn split_parent(path: &str) -> FsResult<(&str, &str)> {
    if path.is_empty() || path == "/" {
        return Err(FsError::PathNotFound);
    }
    let trimmed = path.strip_suffix(SEP).unwrap_or(path);
    match trimmed.rfind(SEP) {
        Some(pos) => Ok((&trimmed[..=pos], &trimmed[pos + 1..])),
        None => Ok(("", trimmed)),
    }
}

/// Walks `path` from the root (leading `/`) or from `cwd`, returning a copy
/// of the record it names.
///
/// Empty and `.` segments are skipped, and `..` at the root stays at the root.
/// Every other segment must name a live record inside a directory.
pub fn resolve<D: BlockDevice>(volume: &Volume<D>, cwd: &DirEntry, path: &str) -> FsResult<DirEntry> {
    let (mut current, rest) = match path.strip_prefix(SEP) {
        Some(rest) => (DirEntry::root(), rest),
        None => (*cwd, path),
    };

    for segment in rest.split(SEP) {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if !current.is_dir() {
            return Err(FsError::PathNotFound);
        }
        if current.is_root() && segment == ".." {
            continue;
        }
        let dir_cluster = volume.dir_cluster(&current);
        current = volume
            .lookup(dir_cluster, segment)?
            .ok_or(FsError::PathNotFound)?;
    }
    Ok(current)
}
