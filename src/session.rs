//! Driver session: a mounted volume, its current directory and its open files.
//!
//! Every operation resolves its path first, then mutates content or metadata
//! through the chain and directory layers of [`Volume`].

use core::cmp;

use crate::block::{BlockDevice, ImageFile};
use crate::bpb::Geometry;
use crate::config::MountConfig;
use crate::dirent::{attr, DirEntry, DIR_ENTRY_SIZE};
use crate::error::{FsError, FsResult};
use crate::handle::{Fd, OpenFile, OpenFileTable, MAX_OPEN_FILES};
use crate::name::ShortName;
use crate::path::{resolve, split_parent};
use crate::volume::Volume;

/// Cluster accounting for a mounted volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Usage {
    pub total_clusters: u32,
    pub free_clusters: u32,
    pub bytes_per_cluster: u32,
}

impl Usage {
    pub fn total_bytes(&self) -> u64 {
        self.total_clusters as u64 * self.bytes_per_cluster as u64
    }

    pub fn free_bytes(&self) -> u64 {
        self.free_clusters as u64 * self.bytes_per_cluster as u64
    }
}

pub struct Session<D: BlockDevice> {
    volume: Volume<D>,
    cwd: DirEntry,
    files: OpenFileTable,
}

impl Session<ImageFile> {
    /// Opens and mounts the image named by `config`.
    pub fn open_image(config: &MountConfig) -> FsResult<Self> {
        let device = ImageFile::open(&config.image_path).map_err(FsError::device)?;
        log::info!(
            "fat32: opening image {} ({} blocks)",
            config.image_path.display(),
            device.blocks()
        );
        Self::mount_with_limit(device, config.max_open_files)
    }
}

impl<D: BlockDevice> Session<D> {
    pub fn mount(device: D) -> FsResult<Self> {
        Self::mount_with_limit(device, MAX_OPEN_FILES)
    }

    pub fn mount_with_limit(device: D, max_open_files: usize) -> FsResult<Self> {
        Ok(Self {
            volume: Volume::mount(device)?,
            cwd: DirEntry::root(),
            files: OpenFileTable::new(max_open_files),
        })
    }

    /// Closes every descriptor, flushes the device and hands it back.
    pub fn unmount(mut self) -> FsResult<D> {
        self.files.clear();
        self.volume.flush()?;
        log::info!("fat32: unmounted");
        Ok(self.volume.into_device())
    }

    pub fn volume(&self) -> &Volume<D> {
        &self.volume
    }

    pub fn current_dir(&self) -> &DirEntry {
        &self.cwd
    }

    pub fn geometry(&self) -> &Geometry {
        self.volume.geometry()
    }

    pub fn usage(&self) -> FsResult<Usage> {
        Ok(Usage {
            total_clusters: self.geometry().cluster_count,
            free_clusters: self.volume.free_cluster_count()?,
            bytes_per_cluster: self.geometry().bytes_per_cluster,
        })
    }

    fn resolve(&self, path: &str) -> FsResult<DirEntry> {
        resolve(&self.volume, &self.cwd, path)
    }

    /// Resolves the directory that holds `path`'s final name.
    fn resolve_parent<'p>(&self, path: &'p str) -> FsResult<(DirEntry, &'p str)> {
        let (parent_path, name) = split_parent(path)?;
        let parent = self.resolve(parent_path)?;
        if !parent.is_dir() {
            return Err(FsError::PathNotFound);
        }
        Ok((parent, name))
    }

    /// Makes `path` the current directory. A path naming a file fails with
    /// [`FsError::NotADirectory`] rather than [`FsError::PathNotFound`].
    pub fn change_dir(&mut self, path: &str) -> FsResult<()> {
        let entry = self.resolve(path)?;
        if !entry.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.cwd = entry;
        Ok(())
    }

    /// Opens the file at `path` and returns the lowest free descriptor.
    /// Directories are refused with [`FsError::NotAFile`].
    pub fn open(&mut self, path: &str) -> FsResult<Fd> {
        let entry = self.resolve(path)?;
        if entry.is_dir() {
            return Err(FsError::NotAFile);
        }
        let (parent, _) = self.resolve_parent(path)?;
        let fd = self.files.insert(OpenFile { entry, parent })?;
        log::debug!("fat32: opened {} as fd {}", entry.name, fd);
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> FsResult<()> {
        self.files.remove(fd)?;
        Ok(())
    }

    /// Reads up to `buf.len()` bytes at `offset`, clamped to the file size.
    ///
    /// Reading exactly at end-of-file returns 0; starting past it fails.
    pub fn read(&self, fd: Fd, buf: &mut [u8], offset: u32) -> FsResult<usize> {
        let entry = self.stored_entry(self.files.get(fd)?)?;
        let size = entry.size;
        if offset > size {
            return Err(FsError::ShortIo);
        }
        let len = cmp::min(buf.len(), (size - offset) as usize);
        if len == 0 {
            return Ok(0);
        }
        self.volume.read_chain(entry.cluster(), offset, &mut buf[..len])?;
        Ok(len)
    }

    /// Writes `data` at `offset`, growing the file as needed.
    ///
    /// Returns the byte count actually stored, which falls short of
    /// `data.len()` only when the volume fills up mid-write. A write that
    /// stores nothing at all fails with [`FsError::AllocationExhausted`].
    pub fn write(&mut self, fd: Fd, data: &[u8], offset: u32) -> FsResult<usize> {
        let mut file = *self.files.get(fd)?;
        if data.is_empty() {
            return Ok(0);
        }
        if offset as u64 + data.len() as u64 > u32::MAX as u64 {
            return Err(FsError::ShortIo);
        }
        // Another descriptor may have grown the file or given it a cluster.
        file.entry = self.stored_entry(&file)?;

        if file.entry.cluster() == 0 {
            let cluster = self.volume.allocate_cluster()?;
            self.volume.zero_cluster(cluster)?;
            file.entry.set_cluster(cluster);
            self.persist(&file)?;
            *self.files.get_mut(fd)? = file;
        }

        let written = self.volume.write_chain(file.entry.cluster(), offset, data)?;
        if written == 0 {
            return Err(FsError::AllocationExhausted);
        }

        let end = offset + written as u32;
        if end > file.entry.size {
            file.entry.size = end;
            self.persist(&file)?;
            *self.files.get_mut(fd)? = file;
        }
        Ok(written)
    }

    /// The descriptor's record as currently stored in its parent directory.
    fn stored_entry(&self, file: &OpenFile) -> FsResult<DirEntry> {
        self.volume
            .find_entry(self.volume.dir_cluster(&file.parent), &file.entry.name)?
            .ok_or(FsError::InvalidDescriptor)
    }

    fn persist(&self, file: &OpenFile) -> FsResult<()> {
        let dir_cluster = self.volume.dir_cluster(&file.parent);
        self.volume.update_entry(dir_cluster, &file.entry)
    }

    /// Raw entry list of the directory at `path`, ending with the end
    /// sentinel. Tombstones are included.
    pub fn list(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let dir = self.resolve(path)?;
        if !dir.is_dir() {
            return Err(FsError::PathNotFound);
        }
        self.volume.read_dir(self.volume.dir_cluster(&dir))
    }

    /// Like [`list`](Self::list), without tombstones, long-name fragments or the sentinel.
    pub fn list_live(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let mut entries = self.list(path)?;
        entries.retain(DirEntry::is_live);
        Ok(entries)
    }

    /// Checks that `path` names a new record in an existing directory.
    fn prepare_new(&self, path: &str) -> FsResult<(DirEntry, ShortName)> {
        let (parent, name) = self.resolve_parent(path)?;
        let short = ShortName::encode(name)?;
        if short.is_dot() {
            return Err(FsError::AlreadyExists);
        }
        if self.volume.lookup(self.volume.dir_cluster(&parent), name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        Ok((parent, short))
    }

    /// Links a record for the freshly allocated `cluster` into `parent`, giving
    /// the cluster back if the record cannot be stored.
    fn link_new(&self, parent: &DirEntry, entry: DirEntry, prepared: FsResult<()>) -> FsResult<()> {
        let cluster = entry.cluster();
        let outcome = prepared.and_then(|()| {
            self.volume
                .append_entry(self.volume.dir_cluster(parent), &entry)
                .map(|_| ())
        });
        if let Err(err) = outcome {
            if let Err(release) = self.volume.release_chain(cluster) {
                log::warn!("fat32: leaked cluster {}: {}", cluster, release);
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn make_dir(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = self.prepare_new(path)?;
        let cluster = self.volume.allocate_cluster()?;

        let dot = DirEntry::new(ShortName::DOT, attr::DIRECTORY, cluster);
        let mut dotdot = parent;
        dotdot.name = ShortName::DOTDOT;

        let mut content = vec![0u8; self.volume.bytes_per_cluster()];
        content[..DIR_ENTRY_SIZE].copy_from_slice(&dot.to_bytes());
        content[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE].copy_from_slice(&dotdot.to_bytes());
        let prepared = self.volume.write_cluster(cluster, &content);

        self.link_new(&parent, DirEntry::new(name, attr::DIRECTORY, cluster), prepared)?;
        log::debug!("fat32: created directory {} at cluster {}", name, cluster);
        Ok(())
    }

    pub fn create_file(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = self.prepare_new(path)?;
        let cluster = self.volume.allocate_cluster()?;
        let prepared = self.volume.zero_cluster(cluster);

        self.link_new(&parent, DirEntry::new(name, attr::ARCHIVE, cluster), prepared)?;
        log::debug!("fat32: created file {} at cluster {}", name, cluster);
        Ok(())
    }

    /// Directory holding `target`'s record. A directory names its parent in
    /// its own `..` record, so paths ending in `.` still find the right one.
    fn parent_of(&self, path: &str, target: &DirEntry) -> FsResult<DirEntry> {
        if target.is_dir() {
            let own_cluster = self.volume.dir_cluster(target);
            if let Some(dotdot) = self.volume.find_entry(own_cluster, &ShortName::DOTDOT)? {
                return Ok(dotdot);
            }
        }
        self.resolve_parent(path).map(|(parent, _)| parent)
    }

    /// Tombstones `target` in its parent, frees its chain and closes every
    /// descriptor still open on it.
    fn unlink(&mut self, path: &str, target: &DirEntry) -> FsResult<()> {
        let parent = self.parent_of(path, target)?;
        let parent_cluster = self.volume.dir_cluster(&parent);
        self.volume.tombstone_entry(parent_cluster, &target.name)?;
        if target.cluster() != 0 {
            self.volume.release_chain(target.cluster())?;
        }
        let volume = &self.volume;
        self.files.retain(|file| {
            file.entry.name != target.name || volume.dir_cluster(&file.parent) != parent_cluster
        });
        Ok(())
    }

    pub fn remove_file(&mut self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        if target.is_dir() {
            return Err(FsError::NotAFile);
        }
        self.unlink(path, &target)?;
        log::debug!("fat32: removed file {}", target.name);
        Ok(())
    }

    pub fn remove_dir(&mut self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        if !target.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if target.is_root() || target.name.is_dot() {
            return Err(FsError::InvalidName);
        }

        let entries = self.volume.read_dir(self.volume.dir_cluster(&target))?;
        if entries.iter().skip(2).any(DirEntry::is_live) {
            return Err(FsError::DirectoryNotEmpty);
        }

        self.unlink(path, &target)?;
        if self.cwd.is_dir() && self.cwd.cluster() == target.cluster() {
            self.cwd = DirEntry::root();
        }
        log::debug!("fat32: removed directory {}", target.name);
        Ok(())
    }
}
