//! Open-file table.

use heapless::binary_heap::{BinaryHeap, Min};

use crate::dirent::DirEntry;
use crate::error::{FsError, FsResult};

/// Capacity of every table; a session may use fewer slots.
pub const MAX_OPEN_FILES: usize = 128;

/// Slot index handed out by `open`.
pub type Fd = usize;

/// Private copies of an open file's record and of its parent directory's
/// record, the latter needed to write size changes back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenFile {
    pub entry: DirEntry,
    pub parent: DirEntry,
}

/// Fixed arena of slots with a free-list that always hands out the lowest
/// free descriptor.
pub struct OpenFileTable {
    slots: [Option<OpenFile>; MAX_OPEN_FILES],
    free: BinaryHeap<Fd, Min, MAX_OPEN_FILES>,
    limit: usize,
}

impl OpenFileTable {
    pub fn new(limit: usize) -> Self {
        let limit = limit.min(MAX_OPEN_FILES);
        let mut free = BinaryHeap::new();
        for fd in 0..limit {
            // Capacity covers every slot below the limit.
            let _ = free.push(fd);
        }
        Self {
            slots: [None; MAX_OPEN_FILES],
            free,
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.limit - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, file: OpenFile) -> FsResult<Fd> {
        let Some(fd) = self.free.pop() else {
            return Err(FsError::DescriptorTableFull);
        };
        self.slots[fd] = Some(file);
        Ok(fd)
    }

    pub fn get(&self, fd: Fd) -> FsResult<&OpenFile> {
        self.slots
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(FsError::InvalidDescriptor)
    }

    pub fn get_mut(&mut self, fd: Fd) -> FsResult<&mut OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FsError::InvalidDescriptor)
    }

    pub fn remove(&mut self, fd: Fd) -> FsResult<OpenFile> {
        let file = self
            .slots
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(FsError::InvalidDescriptor)?;
        let _ = self.free.push(fd);
        Ok(file)
    }

    /// Closes every descriptor for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&OpenFile) -> bool) {
        for fd in 0..self.limit {
            if matches!(&self.slots[fd], Some(file) if !keep(file)) {
                self.slots[fd] = None;
                let _ = self.free.push(fd);
            }
        }
    }

    pub fn clear(&mut self) {
        self.retain(|_| false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirent::attr;
    use crate::name::ShortName;

    fn open_file(name: &str, cluster: u32) -> OpenFile {
        OpenFile {
            entry: DirEntry::new(ShortName::encode(name).unwrap(), attr::ARCHIVE, cluster),
            parent: DirEntry::root(),
        }
    }

    #[test]
    fn lowest_free_descriptor_is_handed_out() {
        let mut table = OpenFileTable::new(8);
        assert_eq!(table.insert(open_file("a", 3)).unwrap(), 0);
        assert_eq!(table.insert(open_file("b", 4)).unwrap(), 1);
        assert_eq!(table.insert(open_file("c", 5)).unwrap(), 2);

        table.remove(1).unwrap();
        table.remove(0).unwrap();
        assert_eq!(table.insert(open_file("d", 6)).unwrap(), 0);
        assert_eq!(table.insert(open_file("e", 7)).unwrap(), 1);
        assert_eq!(table.get(1).unwrap().entry.cluster(), 7);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn full_table_and_stale_descriptors_are_rejected() {
        let mut table = OpenFileTable::new(2);
        assert_eq!(table.limit(), 2);
        assert_eq!(OpenFileTable::new(1000).limit(), MAX_OPEN_FILES);
        table.insert(open_file("a", 3)).unwrap();
        table.insert(open_file("b", 4)).unwrap();
        assert_eq!(table.insert(open_file("c", 5)), Err(FsError::DescriptorTableFull));

        table.remove(0).unwrap();
        assert_eq!(table.remove(0), Err(FsError::InvalidDescriptor));
        assert_eq!(table.get(0).map(|f| f.entry), Err(FsError::InvalidDescriptor));
        assert_eq!(table.get(2).map(|f| f.entry), Err(FsError::InvalidDescriptor));
        assert_eq!(table.get(MAX_OPEN_FILES + 5).map(|f| f.entry), Err(FsError::InvalidDescriptor));
    }

    #[test]
    fn retain_closes_matching_handles() {
        let mut table = OpenFileTable::new(4);
        for (name, cluster) in [("a", 3), ("b", 4), ("c", 3)] {
            table.insert(open_file(name, cluster)).unwrap();
        }
        table.retain(|file| file.entry.cluster() != 3);
        assert_eq!(table.len(), 1);
        assert!(table.get(1).is_ok());
        assert_eq!(table.insert(open_file("d", 9)).unwrap(), 0);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.insert(open_file("e", 9)).unwrap(), 0);
    }
}
