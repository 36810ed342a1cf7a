//! Boot sector / BIOS Parameter Block decoding.
//!
//! Only the fields the engine needs are kept. Everything is derived once at
//! mount time and never changes afterwards.

use crate::block::BLOCK_SIZE;
use crate::error::{FsError, FsResult};

/// Size in bytes of one FAT32 table slot.
pub const FAT_ENTRY_SIZE: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster: u32,
    pub num_fats: u32,
    /// Size of one FAT copy, in sectors.
    pub sectors_per_fat: u32,
    pub first_fat_sector: u32,
    pub first_data_sector: u32,
    pub root_cluster: u32,
    pub total_sectors: u32,
    /// Number of data clusters; valid cluster numbers are `2..cluster_count + 2`.
    pub cluster_count: u32,
    pub volume_label: [u8; 11],
}

impl Geometry {
    pub fn parse(sector: &[u8]) -> FsResult<Self> {
        if sector.len() < BLOCK_SIZE {
            return Err(FsError::InvalidVolume("Boot sector is truncated."));
        }
        if sector[510] != 0x55 || sector[511] != 0xAA {
            return Err(FsError::InvalidVolume("Invalid FAT32 boot sector."));
        }

        let bytes_per_sector = u16::from_le_bytes([sector[11], sector[12]]) as u32;
        if !bytes_per_sector.is_power_of_two()
            || bytes_per_sector < BLOCK_SIZE as u32
            || bytes_per_sector > 4096
        {
            return Err(FsError::UnsupportedVolume("Unsupported FAT32 sector size."));
        }
        let sectors_per_cluster = sector[13] as u32;
        if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
            return Err(FsError::InvalidVolume("Invalid FAT32 cluster size."));
        }
        let reserved_sectors = u16::from_le_bytes([sector[14], sector[15]]) as u32;
        if reserved_sectors == 0 {
            return Err(FsError::InvalidVolume("Invalid reserved sector count."));
        }
        let num_fats = sector[16] as u32;
        if num_fats == 0 {
            return Err(FsError::InvalidVolume("Volume has no FAT."));
        }
        let root_entries = u16::from_le_bytes([sector[17], sector[18]]);
        let total_sectors_16 = u16::from_le_bytes([sector[19], sector[20]]);
        let sectors_per_fat_16 = u16::from_le_bytes([sector[22], sector[23]]);
        if root_entries != 0 || sectors_per_fat_16 != 0 {
            return Err(FsError::UnsupportedVolume("FAT12/FAT16 volumes are not supported."));
        }
        let total_sectors_32 = u32::from_le_bytes([sector[32], sector[33], sector[34], sector[35]]);
        let total_sectors = if total_sectors_16 != 0 {
            total_sectors_16 as u32
        } else {
            total_sectors_32
        };
        let sectors_per_fat = u32::from_le_bytes([sector[36], sector[37], sector[38], sector[39]]);
        let root_cluster = u32::from_le_bytes([sector[44], sector[45], sector[46], sector[47]]) & 0x0FFF_FFFF;
        let mut volume_label = [b' '; 11];
        volume_label.copy_from_slice(&sector[71..82]);

        if total_sectors == 0 || sectors_per_fat == 0 {
            return Err(FsError::InvalidVolume("Invalid FAT32 size fields."));
        }

        let first_fat_sector = reserved_sectors;
        let fat_region = num_fats
            .checked_mul(sectors_per_fat)
            .ok_or(FsError::InvalidVolume("FAT region overflows."))?;
        let first_data_sector = first_fat_sector
            .checked_add(fat_region)
            .ok_or(FsError::InvalidVolume("FAT region overflows."))?;
        if first_data_sector >= total_sectors {
            return Err(FsError::InvalidVolume("Volume has no data region."));
        }

        let data_clusters = (total_sectors - first_data_sector) / sectors_per_cluster;
        let fat_slots = (sectors_per_fat as u64 * bytes_per_sector as u64 / FAT_ENTRY_SIZE as u64)
            .saturating_sub(2)
            .min(0x0FFF_FFF5) as u32;
        let cluster_count = data_clusters.min(fat_slots);
        if cluster_count == 0 {
            return Err(FsError::InvalidVolume("Volume has no data clusters."));
        }
        if root_cluster < 2 || root_cluster >= cluster_count + 2 {
            return Err(FsError::InvalidVolume("Root cluster out of range."));
        }

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            bytes_per_cluster: bytes_per_sector * sectors_per_cluster,
            num_fats,
            sectors_per_fat,
            first_fat_sector,
            first_data_sector,
            root_cluster,
            total_sectors,
            cluster_count,
            volume_label,
        })
    }

    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        cluster >= 2 && cluster - 2 < self.cluster_count
    }

    pub fn cluster_to_sector(&self, cluster: u32) -> u32 {
        self.first_data_sector + (cluster - 2) * self.sectors_per_cluster
    }

    /// Sector (within the first FAT copy) and byte offset holding `cluster`'s link.
    pub fn fat_position(&self, cluster: u32) -> (u32, usize) {
        let byte = cluster * FAT_ENTRY_SIZE;
        let sector = self.first_fat_sector + byte / self.bytes_per_sector;
        let offset = (byte % self.bytes_per_sector) as usize;
        (sector, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::boot_sector;

    #[test]
    fn derives_layout_from_fat32_bpb() {
        let sector = boot_sector(4096, 2, 32, 2, 16);
        let geo = Geometry::parse(&sector).unwrap();
        assert_eq!(geo.bytes_per_sector, 512);
        assert_eq!(geo.bytes_per_cluster, 1024);
        assert_eq!(geo.first_fat_sector, 32);
        assert_eq!(geo.first_data_sector, 32 + 2 * 16);
        assert_eq!(geo.root_cluster, 2);
        assert_eq!(&geo.volume_label, b"TESTVOL    ");
        assert_eq!(geo.cluster_count, (4096 - 64) / 2);
        assert_eq!(geo.cluster_to_sector(2), geo.first_data_sector);
        assert_eq!(geo.cluster_to_sector(5), geo.first_data_sector + 6);
    }

    #[test]
    fn fat_position_walks_across_sectors() {
        let geo = Geometry::parse(&boot_sector(4096, 1, 32, 2, 32)).unwrap();
        assert_eq!(geo.fat_position(2), (32, 8));
        assert_eq!(geo.fat_position(127), (32, 508));
        assert_eq!(geo.fat_position(128), (33, 0));
    }

    #[test]
    fn cluster_count_is_capped_by_fat_capacity() {
        // One FAT sector addresses 128 slots, two of which are reserved.
        let geo = Geometry::parse(&boot_sector(8192, 1, 32, 2, 1)).unwrap();
        assert_eq!(geo.cluster_count, 126);
        assert!(geo.is_data_cluster(127));
        assert!(!geo.is_data_cluster(128));
        assert!(!geo.is_data_cluster(1));
    }

    #[test]
    fn rejects_bad_signature() {
        let mut sector = boot_sector(4096, 1, 32, 2, 32);
        sector[511] = 0;
        assert!(matches!(Geometry::parse(&sector), Err(FsError::InvalidVolume(_))));
    }

    #[test]
    fn rejects_fat16_layout() {
        let mut sector = boot_sector(4096, 1, 32, 2, 32);
        sector[17..19].copy_from_slice(&512u16.to_le_bytes());
        assert!(matches!(Geometry::parse(&sector), Err(FsError::UnsupportedVolume(_))));
    }

    #[test]
    fn rejects_zero_cluster_size() {
        let mut sector = boot_sector(4096, 1, 32, 2, 32);
        sector[13] = 0;
        assert!(matches!(Geometry::parse(&sector), Err(FsError::InvalidVolume(_))));
    }
}
