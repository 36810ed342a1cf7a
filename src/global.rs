//! Process-wide session over the image named by `FAT_FS_PATH`.
//!
//! The first call to any operation mounts the image. [`shutdown`] unmounts it,
//! and the next call mounts it again from a fresh read of the environment.

use lazy_static::lazy_static;
use spin::Mutex;

use crate::block::ImageFile;
use crate::config::MountConfig;
use crate::dirent::DirEntry;
use crate::error::FsResult;
use crate::handle::Fd;
use crate::session::Session;

lazy_static! {
    static ref SESSION: Mutex<Option<Session<ImageFile>>> = Mutex::new(None);
}

fn with_session<T>(action: impl FnOnce(&mut Session<ImageFile>) -> FsResult<T>) -> FsResult<T> {
    let mut guard = SESSION.lock();
    let session = match guard.take() {
        Some(session) => session,
        None => Session::open_image(&MountConfig::from_env()?)?,
    };
    action(guard.insert(session))
}

/// Mounts the image now instead of on first use.
pub fn init() -> FsResult<()> {
    with_session(|_| Ok(()))
}

/// Unmounts the image if mounted, closing every descriptor.
pub fn shutdown() -> FsResult<()> {
    let session = SESSION.lock().take();
    match session {
        Some(session) => session.unmount().map(drop),
        None => Ok(()),
    }
}

pub fn change_dir(path: &str) -> FsResult<()> {
    with_session(|fs| fs.change_dir(path))
}

pub fn current_dir() -> FsResult<DirEntry> {
    with_session(|fs| Ok(*fs.current_dir()))
}

pub fn open(path: &str) -> FsResult<Fd> {
    with_session(|fs| fs.open(path))
}

pub fn close(fd: Fd) -> FsResult<()> {
    with_session(|fs| fs.close(fd))
}

pub fn read(fd: Fd, buf: &mut [u8], offset: u32) -> FsResult<usize> {
    with_session(|fs| fs.read(fd, buf, offset))
}

pub fn write(fd: Fd, data: &[u8], offset: u32) -> FsResult<usize> {
    with_session(|fs| fs.write(fd, data, offset))
}

pub fn list_dir(path: &str) -> FsResult<Vec<DirEntry>> {
    with_session(|fs| fs.list(path))
}

pub fn make_dir(path: &str) -> FsResult<()> {
    with_session(|fs| fs.make_dir(path))
}

pub fn create_file(path: &str) -> FsResult<()> {
    with_session(|fs| fs.create_file(path))
}

pub fn remove_file(path: &str) -> FsResult<()> {
    with_session(|fs| fs.remove_file(path))
}

pub fn remove_dir(path: &str) -> FsResult<()> {
    with_session(|fs| fs.remove_dir(path))
}
