//! Blank FAT32 volumes for tests.

use crate::block::{BlockDevice, RamDisk, BLOCK_SIZE};

pub(crate) const RESERVED_SECTORS: u16 = 32;
pub(crate) const NUM_FATS: u8 = 2;

pub(crate) fn boot_sector(
    total_sectors: u32,
    sectors_per_cluster: u8,
    reserved_sectors: u16,
    num_fats: u8,
    sectors_per_fat: u32,
) -> [u8; BLOCK_SIZE] {
    let mut boot = [0u8; BLOCK_SIZE];
    boot[0] = 0xEB;
    boot[1] = 0x58;
    boot[2] = 0x90;
    boot[3..11].copy_from_slice(b"FAT32DRV");
    boot[11..13].copy_from_slice(&(BLOCK_SIZE as u16).to_le_bytes());
    boot[13] = sectors_per_cluster;
    boot[14..16].copy_from_slice(&reserved_sectors.to_le_bytes());
    boot[16] = num_fats;
    boot[21] = 0xF8;
    boot[32..36].copy_from_slice(&total_sectors.to_le_bytes());
    boot[36..40].copy_from_slice(&sectors_per_fat.to_le_bytes());
    boot[44..48].copy_from_slice(&2u32.to_le_bytes());
    boot[48..50].copy_from_slice(&1u16.to_le_bytes());
    boot[66] = 0x29;
    boot[71..82].copy_from_slice(b"TESTVOL    ");
    boot[82..90].copy_from_slice(b"FAT32   ");
    boot[510] = 0x55;
    boot[511] = 0xAA;
    boot
}

/// Lays out an empty FAT32 volume with the root directory at cluster 2.
pub(crate) fn format_volume(total_sectors: u32, sectors_per_cluster: u8) -> RamDisk {
    let mut sectors_per_fat = 1u32;
    loop {
        let data_sectors = total_sectors
            .saturating_sub(RESERVED_SECTORS as u32)
            .saturating_sub(NUM_FATS as u32 * sectors_per_fat);
        let clusters = data_sectors / sectors_per_cluster as u32;
        let fat_bytes = (clusters + 2) * 4;
        let needed = (fat_bytes + BLOCK_SIZE as u32 - 1) / BLOCK_SIZE as u32;
        if needed <= sectors_per_fat {
            break;
        }
        sectors_per_fat = needed;
    }

    let disk = RamDisk::new(total_sectors as usize);
    let boot = boot_sector(
        total_sectors,
        sectors_per_cluster,
        RESERVED_SECTORS,
        NUM_FATS,
        sectors_per_fat,
    );
    disk.write_block(0, &boot).unwrap();

    let mut fat_sector = [0u8; BLOCK_SIZE];
    fat_sector[0..4].copy_from_slice(&0x0FFF_FFF8u32.to_le_bytes());
    fat_sector[4..8].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
    fat_sector[8..12].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
    for copy in 0..NUM_FATS as u32 {
        let lba = RESERVED_SECTORS as u32 + copy * sectors_per_fat;
        disk.write_block(lba as u64, &fat_sector).unwrap();
    }
    disk
}

/// 2 MiB volume with 1 KiB clusters.
pub(crate) fn standard_volume() -> RamDisk {
    format_volume(4096, 2)
}

/// Volume with only eight data clusters, the root directory included.
pub(crate) fn tiny_volume() -> RamDisk {
    format_volume(RESERVED_SECTORS as u32 + NUM_FATS as u32 + 8, 1)
}
