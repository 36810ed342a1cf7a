//! Directory entry lists: scanning, appending, in-place updates and tombstones.
//!
//! A list is the array of 32-byte records stored in a directory's cluster
//! chain. It ends at the first record whose name starts with
//! [`END_OF_LIST`](crate::dirent::END_OF_LIST), or at the end of the chain.

use crate::block::BlockDevice;
use crate::dirent::{DirEntry, DELETED, DIR_ENTRY_SIZE};
use crate::error::{FsError, FsResult};
use crate::name::ShortName;
use crate::volume::Volume;

/// Where a new record goes in a list, and whether it overwrites a tombstone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    pub reuses_tombstone: bool,
}

/// First tombstone or end sentinel in `entries`.
pub fn insertion_slot(entries: &[DirEntry]) -> Slot {
    for (index, entry) in entries.iter().enumerate() {
        if entry.is_deleted() {
            return Slot { index, reuses_tombstone: true };
        }
        if entry.is_end() {
            return Slot { index, reuses_tombstone: false };
        }
    }
    Slot {
        index: entries.len(),
        reuses_tombstone: false,
    }
}

fn entry_offset(index: usize) -> FsResult<u32> {
    u32::try_from(index * DIR_ENTRY_SIZE).map_err(|_| FsError::ShortIo)
}

impl<D: BlockDevice> Volume<D> {
    /// Every record of the list up to and including the end sentinel. A list
    /// that fills its chain exactly gets a synthesized sentinel.
    pub fn read_dir(&self, dir_cluster: u32) -> FsResult<Vec<DirEntry>> {
        let mut scratch = vec![0u8; self.bytes_per_cluster()];
        let mut entries = Vec::with_capacity(scratch.len() / DIR_ENTRY_SIZE);
        for cluster in self.chain(dir_cluster) {
            self.read_cluster(cluster?, &mut scratch)?;
            for raw in scratch.chunks_exact(DIR_ENTRY_SIZE) {
                let entry = DirEntry::parse(raw);
                entries.push(entry);
                if entry.is_end() {
                    return Ok(entries);
                }
            }
        }
        entries.push(DirEntry::end_of_list());
        Ok(entries)
    }

    /// Scans the list cluster by cluster and stops at the first live record
    /// accepted by `pred`, or at the end sentinel.
    fn scan_dir(
        &self,
        dir_cluster: u32,
        mut pred: impl FnMut(&DirEntry) -> bool,
    ) -> FsResult<Option<(usize, DirEntry)>> {
        let mut scratch = vec![0u8; self.bytes_per_cluster()];
        let mut index = 0usize;
        for cluster in self.chain(dir_cluster) {
            self.read_cluster(cluster?, &mut scratch)?;
            for raw in scratch.chunks_exact(DIR_ENTRY_SIZE) {
                let entry = DirEntry::parse(raw);
                if entry.is_end() {
                    return Ok(None);
                }
                if entry.is_live() && pred(&entry) {
                    return Ok(Some((index, entry)));
                }
                index += 1;
            }
        }
        Ok(None)
    }

    /// Finds the live record called `name`; names that cannot be encoded never match.
    pub fn lookup(&self, dir_cluster: u32, name: &str) -> FsResult<Option<DirEntry>> {
        match ShortName::encode(name) {
            Ok(wanted) => self.find_entry(dir_cluster, &wanted),
            Err(_) => Ok(None),
        }
    }

    pub fn find_entry(&self, dir_cluster: u32, name: &ShortName) -> FsResult<Option<DirEntry>> {
        Ok(self
            .scan_dir(dir_cluster, |entry| entry.name == *name)?
            .map(|(_, entry)| entry))
    }

    /// Stores `entry` at the list's first free slot and returns its index.
    ///
    /// Reusing a tombstone writes one record. Taking the end sentinel's place
    /// writes the record followed by a fresh sentinel.
    pub fn append_entry(&self, dir_cluster: u32, entry: &DirEntry) -> FsResult<usize> {
        let entries = self.read_dir(dir_cluster)?;
        let slot = insertion_slot(&entries);

        let mut bytes = Vec::with_capacity(2 * DIR_ENTRY_SIZE);
        bytes.extend_from_slice(&entry.to_bytes());
        if !slot.reuses_tombstone {
            bytes.extend_from_slice(&DirEntry::end_of_list().to_bytes());
        }

        // Records never straddle clusters, so anything short of one record
        // means nothing landed. A missing sentinel is covered by the chain end.
        let written = self.write_chain(dir_cluster, entry_offset(slot.index)?, &bytes)?;
        if written < DIR_ENTRY_SIZE {
            return Err(FsError::AllocationExhausted);
        }
        log::debug!(
            "fat32: stored {} at slot {} of directory {}{}",
            entry.name,
            slot.index,
            dir_cluster,
            if slot.reuses_tombstone { " (reused)" } else { "" }
        );
        Ok(slot.index)
    }

    /// Rewrites the record sharing `entry`'s short name, in place.
    pub fn update_entry(&self, dir_cluster: u32, entry: &DirEntry) -> FsResult<()> {
        let Some((index, _)) = self.scan_dir(dir_cluster, |e| e.name == entry.name)? else {
            return Err(FsError::PathNotFound);
        };
        let written = self.write_chain(dir_cluster, entry_offset(index)?, &entry.to_bytes())?;
        if written < DIR_ENTRY_SIZE {
            return Err(FsError::ShortIo);
        }
        Ok(())
    }

    /// Marks the record called `name` as deleted. Only its first byte changes.
    pub fn tombstone_entry(&self, dir_cluster: u32, name: &ShortName) -> FsResult<()> {
        let Some((index, _)) = self.scan_dir(dir_cluster, |e| e.name == *name)? else {
            return Err(FsError::PathNotFound);
        };
        let written = self.write_chain(dir_cluster, entry_offset(index)?, &[DELETED])?;
        if written < 1 {
            return Err(FsError::ShortIo);
        }
        log::debug!("fat32: tombstoned {} at slot {} of directory {}", name, index, dir_cluster);
        Ok(())
    }
}
