//! File Allocation Table bookkeeping.
//!
//! Links are 28 bits wide; the top nibble of each stored slot is reserved and
//! is carried over untouched whenever a slot is rewritten.

use crate::block::BlockDevice;
use crate::bpb::FAT_ENTRY_SIZE;
use crate::error::{FsError, FsResult};
use crate::volume::Volume;

pub const FAT_FREE: u32 = 0;
/// Marker written for a chain's last cluster, including fresh one-cluster chains.
pub const FAT_EOC_MARK: u32 = 0x0FFF_FFFF;
/// Lowest value read back as end-of-chain.
pub const FAT_EOC: u32 = 0x0FFF_FFF8;
pub const FAT_BAD: u32 = 0x0FFF_FFF7;
const LINK_MASK: u32 = 0x0FFF_FFFF;
const RESERVED_MASK: u32 = 0xF000_0000;

pub fn is_end_of_chain(value: u32) -> bool {
    value >= FAT_EOC
}

/// Decoded successor of a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    Next(u32),
    End,
}

impl<D: BlockDevice> Volume<D> {
    fn slot(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
    }

    /// Raw 28-bit value stored for `cluster` in the first FAT copy.
    pub fn read_link(&self, cluster: u32) -> FsResult<u32> {
        let (sector, offset) = self.geometry().fat_position(cluster);
        let mut buf = vec![0u8; self.geometry().bytes_per_sector as usize];
        self.read_sectors(sector, &mut buf)?;
        Ok(Self::slot(&buf, offset) & LINK_MASK)
    }

    /// Successor of `cluster`, with anything that cannot continue a live chain
    /// reported as a short chain.
    pub fn next_link(&self, cluster: u32) -> FsResult<Link> {
        let value = self.read_link(cluster)?;
        if is_end_of_chain(value) {
            return Ok(Link::End);
        }
        if value == FAT_BAD || !self.geometry().is_data_cluster(value) {
            log::warn!("fat32: cluster {} has corrupt link {:#x}", cluster, value);
            return Err(FsError::ShortIo);
        }
        Ok(Link::Next(value))
    }

    /// Writes `value` into `cluster`'s slot in every FAT copy.
    pub fn set_link(&self, cluster: u32, value: u32) -> FsResult<()> {
        if !self.geometry().is_data_cluster(cluster) {
            return Err(FsError::ShortIo);
        }
        let geo = *self.geometry();
        let (mut sector, offset) = geo.fat_position(cluster);
        let mut buf = vec![0u8; geo.bytes_per_sector as usize];
        for _ in 0..geo.num_fats {
            self.read_sectors(sector, &mut buf)?;
            let kept = Self::slot(&buf, offset) & RESERVED_MASK;
            let stored = kept | (value & LINK_MASK);
            buf[offset..offset + FAT_ENTRY_SIZE as usize].copy_from_slice(&stored.to_le_bytes());
            self.write_sectors(sector, &buf)?;
            sector += geo.sectors_per_fat;
        }
        Ok(())
    }

    /// Lowest-numbered free cluster, or `None` when the volume is full.
    pub fn find_free_cluster(&self) -> FsResult<Option<u32>> {
        let geo = *self.geometry();
        let per_sector = geo.bytes_per_sector / FAT_ENTRY_SIZE;
        let last = geo.cluster_count + 2;
        let mut buf = vec![0u8; geo.bytes_per_sector as usize];
        let mut cluster = 2u32;
        while cluster < last {
            let (sector, _) = geo.fat_position(cluster);
            self.read_sectors(sector, &mut buf)?;
            let sector_end = (cluster / per_sector + 1) * per_sector;
            while cluster < sector_end && cluster < last {
                let offset = ((cluster % per_sector) * FAT_ENTRY_SIZE) as usize;
                if Self::slot(&buf, offset) & LINK_MASK == FAT_FREE {
                    return Ok(Some(cluster));
                }
                cluster += 1;
            }
        }
        Ok(None)
    }

    /// Claims a free cluster as a one-cluster chain.
    pub fn allocate_cluster(&self) -> FsResult<u32> {
        let Some(cluster) = self.find_free_cluster()? else {
            log::warn!("fat32: no free clusters left");
            return Err(FsError::AllocationExhausted);
        };
        self.set_link(cluster, FAT_EOC_MARK)?;
        log::trace!("fat32: allocated cluster {}", cluster);
        Ok(cluster)
    }

    /// Frees every cluster of the chain starting at `start`.
    ///
    /// Stops at an end-of-chain marker or at a link that is already free or
    /// points outside the data region.
    pub fn release_chain(&self, start: u32) -> FsResult<u32> {
        let mut current = start;
        let mut released = 0u32;
        while self.geometry().is_data_cluster(current) && released <= self.geometry().cluster_count {
            let next = self.read_link(current)?;
            self.set_link(current, FAT_FREE)?;
            released += 1;
            if next == FAT_FREE || is_end_of_chain(next) {
                break;
            }
            current = next;
        }
        log::debug!("fat32: released {} cluster(s) from chain at {}", released, start);
        Ok(released)
    }

    pub fn free_cluster_count(&self) -> FsResult<u32> {
        let geo = *self.geometry();
        let last = geo.cluster_count + 2;
        let mut buf = vec![0u8; geo.bytes_per_sector as usize];
        let mut free = 0u32;
        let mut loaded = None;
        for cluster in 2..last {
            let (sector, offset) = geo.fat_position(cluster);
            if loaded != Some(sector) {
                self.read_sectors(sector, &mut buf)?;
                loaded = Some(sector);
            }
            if Self::slot(&buf, offset) & LINK_MASK == FAT_FREE {
                free += 1;
            }
        }
        Ok(free)
    }

    pub fn chain(&self, start: u32) -> ChainCursor<'_, D> {
        ChainCursor {
            volume: self,
            pending: Some(Ok(start)),
            walked: 0,
        }
    }
}

/// Walks a cluster chain one link at a time.
///
/// The successor of a cluster is fetched before that cluster is handed out,
/// so callers may rewrite the link of the cluster they were just given. A
/// broken successor surfaces as an error on the following step.
pub struct ChainCursor<'a, D: BlockDevice> {
    volume: &'a Volume<D>,
    pending: Option<FsResult<u32>>,
    walked: u32,
}

impl<'a, D: BlockDevice> Iterator for ChainCursor<'a, D> {
    type Item = FsResult<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        let cluster = match self.pending.take()? {
            Ok(cluster) => cluster,
            Err(err) => return Some(Err(err)),
        };
        if !self.volume.geometry().is_data_cluster(cluster) {
            return Some(Err(FsError::ShortIo));
        }
        self.walked += 1;
        if self.walked > self.volume.geometry().cluster_count {
            log::warn!("fat32: cycle detected in chain at cluster {}", cluster);
            return Some(Err(FsError::ShortIo));
        }
        self.pending = match self.volume.next_link(cluster) {
            Ok(Link::Next(next)) => Some(Ok(next)),
            Ok(Link::End) => None,
            Err(err) => Some(Err(err)),
        };
        Some(Ok(cluster))
    }
}
