use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::bpb::Geometry;
use crate::dirent::DirEntry;
use crate::error::{FsError, FsResult};

/// A mounted FAT32 volume: the backing device plus its decoded geometry.
///
/// Nothing is cached. Every call goes to the device.
pub struct Volume<D: BlockDevice> {
    device: D,
    geometry: Geometry,
}

impl<D: BlockDevice> Volume<D> {
    pub fn mount(device: D) -> FsResult<Self> {
        let mut boot = [0u8; BLOCK_SIZE];
        device.read_block(0, &mut boot).map_err(FsError::device)?;
        let geometry = Geometry::parse(&boot)?;
        log::info!(
            "fat32: mounted {} clusters of {} bytes, {} FAT(s) of {} sectors, root at cluster {}",
            geometry.cluster_count,
            geometry.bytes_per_cluster,
            geometry.num_fats,
            geometry.sectors_per_fat,
            geometry.root_cluster
        );
        Ok(Self { device, geometry })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn flush(&self) -> FsResult<()> {
        self.device.flush().map_err(FsError::device)
    }

    pub fn bytes_per_cluster(&self) -> usize {
        self.geometry.bytes_per_cluster as usize
    }

    fn sector_to_block(&self, sector: u32) -> u64 {
        sector as u64 * (self.geometry.bytes_per_sector as u64 / BLOCK_SIZE as u64)
    }

    pub(crate) fn read_sectors(&self, sector: u32, buf: &mut [u8]) -> FsResult<()> {
        self.device
            .read_block(self.sector_to_block(sector), buf)
            .map_err(FsError::device)
    }

    pub(crate) fn write_sectors(&self, sector: u32, buf: &[u8]) -> FsResult<()> {
        self.device
            .write_block(self.sector_to_block(sector), buf)
            .map_err(FsError::device)
    }

    pub(crate) fn read_cluster(&self, cluster: u32, buf: &mut [u8]) -> FsResult<()> {
        if !self.geometry.is_data_cluster(cluster) {
            log::warn!("fat32: read of invalid cluster {}", cluster);
            return Err(FsError::ShortIo);
        }
        self.read_sectors(self.geometry.cluster_to_sector(cluster), buf)
    }

    pub(crate) fn write_cluster(&self, cluster: u32, buf: &[u8]) -> FsResult<()> {
        if !self.geometry.is_data_cluster(cluster) {
            log::warn!("fat32: write to invalid cluster {}", cluster);
            return Err(FsError::ShortIo);
        }
        self.write_sectors(self.geometry.cluster_to_sector(cluster), buf)
    }

    pub(crate) fn zero_cluster(&self, cluster: u32) -> FsResult<()> {
        let zero = vec![0u8; self.bytes_per_cluster()];
        self.write_cluster(cluster, &zero)
    }

    /// First cluster of a directory's entry list; the root sentinel maps to the
    /// volume's root chain.
    pub fn dir_cluster(&self, dir: &DirEntry) -> u32 {
        if dir.cluster() == 0 {
            self.geometry.root_cluster
        } else {
            dir.cluster()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RamDisk;
    use crate::testutil::standard_volume;

    #[test]
    fn mount_reads_geometry_from_block_zero() {
        let volume = Volume::mount(standard_volume()).unwrap();
        assert_eq!(volume.geometry().root_cluster, 2);
        assert_eq!(volume.bytes_per_cluster(), 1024);
    }

    #[test]
    fn mount_rejects_blank_device() {
        assert!(matches!(
            Volume::mount(RamDisk::new(64)),
            Err(FsError::InvalidVolume(_))
        ));
    }

    #[test]
    fn cluster_io_round_trips_and_bounds_checks() {
        let volume = Volume::mount(standard_volume()).unwrap();
        let data: Vec<u8> = (0..1024).map(|i| (i % 199) as u8).collect();
        volume.write_cluster(10, &data).unwrap();
        let mut back = vec![0u8; 1024];
        volume.read_cluster(10, &mut back).unwrap();
        assert_eq!(back, data);

        assert_eq!(volume.read_cluster(1, &mut back), Err(FsError::ShortIo));
        let past_end = volume.geometry().cluster_count + 2;
        assert_eq!(volume.write_cluster(past_end, &data), Err(FsError::ShortIo));
    }

    #[test]
    fn root_sentinel_maps_to_root_chain() {
        let volume = Volume::mount(standard_volume()).unwrap();
        assert_eq!(volume.dir_cluster(&DirEntry::root()), 2);
    }
}
