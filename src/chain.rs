//! Byte-addressed reads and writes over a cluster chain.
//!
//! A chain can only be walked front to back, so every access starts at the
//! chain's first cluster no matter how far in the requested range begins.

use core::cmp;

use crate::block::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::fat::{Link, FAT_EOC_MARK};
use crate::volume::Volume;

impl<D: BlockDevice> Volume<D> {
    /// Fills `buf` from the chain at `start`, beginning `offset` bytes in.
    ///
    /// Fails with [`FsError::ShortIo`] if the chain ends before `buf` is full.
    pub fn read_chain(&self, start: u32, offset: u32, buf: &mut [u8]) -> FsResult<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let bpc = self.bytes_per_cluster();
        let offset = offset as usize;
        let first = offset / bpc;
        let end = (offset + buf.len() + bpc - 1) / bpc;

        let mut scratch = vec![0u8; bpc];
        let mut copied = 0usize;
        for (index, cluster) in self.chain(start).enumerate().take(end) {
            let cluster = cluster?;
            if index < first {
                continue;
            }
            self.read_cluster(cluster, &mut scratch)?;
            let from = if index == first { offset % bpc } else { 0 };
            let len = cmp::min(bpc - from, buf.len() - copied);
            buf[copied..copied + len].copy_from_slice(&scratch[from..from + len]);
            copied += len;
        }

        if copied < buf.len() {
            log::warn!(
                "fat32: chain at {} ended after {} of {} bytes",
                start,
                copied,
                buf.len()
            );
            return Err(FsError::ShortIo);
        }
        Ok(())
    }

    /// Writes `data` into the chain at `start`, beginning `offset` bytes in,
    /// growing the chain as needed.
    ///
    /// Returns the number of bytes written, which is short of `data.len()` only
    /// when the volume ran out of free clusters. Clusters linked in by this call
    /// never expose stale disk contents.
    pub fn write_chain(&self, start: u32, offset: u32, data: &[u8]) -> FsResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        if !self.geometry().is_data_cluster(start) {
            return Err(FsError::ShortIo);
        }
        let bpc = self.bytes_per_cluster();
        let offset = offset as usize;
        let first = offset / bpc;
        let end = (offset + data.len() + bpc - 1) / bpc;

        let mut scratch = vec![0u8; bpc];
        let mut cluster = start;
        let mut fresh = false;
        let mut written = 0usize;
        let mut index = 0usize;
        loop {
            if index >= first {
                let from = if index == first { offset % bpc } else { 0 };
                let len = cmp::min(bpc - from, data.len() - written);
                if fresh {
                    scratch.fill(0);
                } else if len != bpc {
                    self.read_cluster(cluster, &mut scratch)?;
                }
                scratch[from..from + len].copy_from_slice(&data[written..written + len]);
                self.write_cluster(cluster, &scratch)?;
                written += len;
            } else if fresh {
                self.zero_cluster(cluster)?;
            }

            index += 1;
            if index >= end {
                break;
            }
            match self.next_link(cluster)? {
                Link::Next(next) => {
                    cluster = next;
                    fresh = false;
                }
                Link::End => match self.extend_chain(cluster)? {
                    Some(next) => {
                        cluster = next;
                        fresh = true;
                    }
                    None => break,
                },
            }
        }

        if written < data.len() {
            log::warn!(
                "fat32: short write to chain at {}: {} of {} bytes",
                start,
                written,
                data.len()
            );
        }
        Ok(written)
    }

    /// Links a free cluster after `tail`, or returns `None` when the volume is full.
    fn extend_chain(&self, tail: u32) -> FsResult<Option<u32>> {
        let Some(next) = self.find_free_cluster()? else {
            return Ok(None);
        };
        self.set_link(next, FAT_EOC_MARK)?;
        self.set_link(tail, next)?;
        log::debug!("fat32: extended chain {} -> {}", tail, next);
        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RamDisk;
    use crate::fat::FAT_FREE;
    use crate::testutil::{standard_volume, tiny_volume};

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn fresh_chain(volume: &Volume<RamDisk>) -> u32 {
        let start = volume.allocate_cluster().unwrap();
        volume.zero_cluster(start).unwrap();
        start
    }

    #[test]
    fn round_trips_within_one_cluster() {
        let volume = Volume::mount(standard_volume()).unwrap();
        let start = fresh_chain(&volume);
        let data = pattern(100, 1);
        assert_eq!(volume.write_chain(start, 17, &data).unwrap(), 100);

        let mut back = vec![0u8; 100];
        volume.read_chain(start, 17, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn round_trips_across_cluster_boundaries() {
        let volume = Volume::mount(standard_volume()).unwrap();
        let start = fresh_chain(&volume);
        let bpc = volume.bytes_per_cluster() as u32;

        // Straddles the first boundary, then spans several whole clusters.
        for (offset, len) in [(bpc - 10, 20usize), (0, 3 * bpc as usize + 5), (bpc * 2 + 1, 2000)] {
            let data = pattern(len, offset as u8);
            assert_eq!(volume.write_chain(start, offset, &data).unwrap(), len);
            let mut back = vec![0u8; len];
            volume.read_chain(start, offset, &mut back).unwrap();
            assert_eq!(back, data, "offset {} len {}", offset, len);
        }
    }

    #[test]
    fn partial_write_preserves_neighbouring_bytes() {
        let volume = Volume::mount(standard_volume()).unwrap();
        let start = fresh_chain(&volume);
        volume.write_chain(start, 0, &[b'a'; 64]).unwrap();
        volume.write_chain(start, 10, b"XYZ").unwrap();

        let mut back = [0u8; 16];
        volume.read_chain(start, 0, &mut back).unwrap();
        assert_eq!(&back, b"aaaaaaaaaaXYZaaa");
    }

    #[test]
    fn write_grows_chain_and_zeroes_skipped_clusters() {
        let volume = Volume::mount(standard_volume()).unwrap();
        let start = fresh_chain(&volume);
        let bpc = volume.bytes_per_cluster() as u32;

        // Dirty a cluster that the allocator will hand out next.
        let next_free = volume.find_free_cluster().unwrap().unwrap();
        volume.write_cluster(next_free, &vec![0xEE; bpc as usize]).unwrap();

        assert_eq!(volume.write_chain(start, 2 * bpc + 4, b"tail").unwrap(), 4);
        let chain: Vec<u32> = volume.chain(start).collect::<FsResult<_>>().unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[1], next_free);

        let mut gap = vec![0xFFu8; bpc as usize];
        volume.read_chain(start, bpc, &mut gap).unwrap();
        assert!(gap.iter().all(|b| *b == 0));
    }

    #[test]
    fn read_past_chain_end_is_short() {
        let volume = Volume::mount(standard_volume()).unwrap();
        let start = fresh_chain(&volume);
        let bpc = volume.bytes_per_cluster();
        let mut buf = vec![0u8; bpc + 1];
        assert_eq!(volume.read_chain(start, 0, &mut buf), Err(FsError::ShortIo));
    }

    #[test]
    fn write_stops_short_when_volume_fills() {
        let volume = Volume::mount(tiny_volume()).unwrap();
        let start = fresh_chain(&volume);
        let bpc = volume.bytes_per_cluster();

        // Root plus this chain hold two of the eight clusters.
        let data = pattern(bpc * 10, 7);
        let written = volume.write_chain(start, 0, &data).unwrap();
        assert_eq!(written, bpc * 7);
        assert_eq!(volume.find_free_cluster().unwrap(), None);

        let mut back = vec![0u8; written];
        volume.read_chain(start, 0, &mut back).unwrap();
        assert_eq!(back, &data[..written]);

        volume.release_chain(start).unwrap();
        assert_eq!(volume.read_link(start).unwrap(), FAT_FREE);
    }
}
