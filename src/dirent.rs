//! 32-byte on-disk directory record.

use crate::name::ShortName;

pub const DIR_ENTRY_SIZE: usize = 32;

/// First name byte of the slot that ends a directory's entry list.
pub const END_OF_LIST: u8 = 0x00;
/// First name byte of a deleted, reusable slot.
pub const DELETED: u8 = 0xE5;

pub mod attr {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;
    pub const LONG_NAME: u8 = 0x0F;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: ShortName,
    pub attr: u8,
    pub nt_reserved: u8,
    pub create_time_tenth: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub access_date: u16,
    pub cluster_hi: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub cluster_lo: u16,
    pub size: u32,
}

impl DirEntry {
    /// Stand-in for the root directory, which has no record of its own.
    pub fn root() -> Self {
        Self::new(ShortName([b' '; 11]), attr::DIRECTORY, 0)
    }

    pub fn end_of_list() -> Self {
        Self::parse(&[0u8; DIR_ENTRY_SIZE])
    }

    pub fn new(name: ShortName, attr: u8, cluster: u32) -> Self {
        let mut entry = Self {
            name,
            attr,
            nt_reserved: 0,
            create_time_tenth: 0,
            create_time: 0,
            create_date: 0,
            access_date: 0,
            cluster_hi: 0,
            write_time: 0,
            write_date: 0,
            cluster_lo: 0,
            size: 0,
        };
        entry.set_cluster(cluster);
        entry
    }

    pub fn parse(bytes: &[u8]) -> Self {
        let mut name = [0u8; 11];
        name.copy_from_slice(&bytes[0..11]);
        Self {
            name: ShortName(name),
            attr: bytes[11],
            nt_reserved: bytes[12],
            create_time_tenth: bytes[13],
            create_time: u16::from_le_bytes([bytes[14], bytes[15]]),
            create_date: u16::from_le_bytes([bytes[16], bytes[17]]),
            access_date: u16::from_le_bytes([bytes[18], bytes[19]]),
            cluster_hi: u16::from_le_bytes([bytes[20], bytes[21]]),
            write_time: u16::from_le_bytes([bytes[22], bytes[23]]),
            write_date: u16::from_le_bytes([bytes[24], bytes[25]]),
            cluster_lo: u16::from_le_bytes([bytes[26], bytes[27]]),
            size: u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut entry = [0u8; DIR_ENTRY_SIZE];
        entry[0..11].copy_from_slice(self.name.as_bytes());
        entry[11] = self.attr;
        entry[12] = self.nt_reserved;
        entry[13] = self.create_time_tenth;
        entry[14..16].copy_from_slice(&self.create_time.to_le_bytes());
        entry[16..18].copy_from_slice(&self.create_date.to_le_bytes());
        entry[18..20].copy_from_slice(&self.access_date.to_le_bytes());
        entry[20..22].copy_from_slice(&self.cluster_hi.to_le_bytes());
        entry[22..24].copy_from_slice(&self.write_time.to_le_bytes());
        entry[24..26].copy_from_slice(&self.write_date.to_le_bytes());
        entry[26..28].copy_from_slice(&self.cluster_lo.to_le_bytes());
        entry[28..32].copy_from_slice(&self.size.to_le_bytes());
        entry
    }

    pub fn cluster(&self) -> u32 {
        ((self.cluster_hi as u32) << 16) | self.cluster_lo as u32
    }

    pub fn set_cluster(&mut self, cluster: u32) {
        self.cluster_hi = (cluster >> 16) as u16;
        self.cluster_lo = (cluster & 0xFFFF) as u16;
    }

    pub fn is_end(&self) -> bool {
        self.name.0[0] == END_OF_LIST
    }

    pub fn is_deleted(&self) -> bool {
        self.name.0[0] == DELETED
    }

    /// Neither a sentinel nor a long-name fragment nor the volume label.
    pub fn is_live(&self) -> bool {
        !self.is_end()
            && !self.is_deleted()
            && self.attr & attr::LONG_NAME != attr::LONG_NAME
            && self.attr & attr::VOLUME_ID == 0
    }

    pub fn is_dir(&self) -> bool {
        self.attr & attr::DIRECTORY != 0 && self.attr & attr::LONG_NAME != attr::LONG_NAME
    }

    pub fn is_file(&self) -> bool {
        self.is_live() && !self.is_dir()
    }

    /// A directory record whose cluster is 0 stands for the root.
    pub fn is_root(&self) -> bool {
        self.is_dir() && self.cluster() == 0
    }
}
