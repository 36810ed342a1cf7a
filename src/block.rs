use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use spin::Mutex;

/// Addressing unit of every device. Volume sectors are whole multiples of it.
pub const BLOCK_SIZE: usize = 512;

pub trait BlockDeviceError {
    fn as_str(&self) -> &'static str;
}

/// Blocking, positioned block storage.
///
/// `buf` may cover several consecutive blocks; its length must be a multiple
/// of [`BLOCK_SIZE`].
pub trait BlockDevice {
    type Error: BlockDeviceError;

    fn read_block(&self, block: u64, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write_block(&self, block: u64, buf: &[u8]) -> Result<(), Self::Error>;

    fn flush(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageError {
    NotFound,
    PermissionDenied,
    OutOfRange,
    Misaligned,
    Io,
}

impl BlockDeviceError for ImageError {
    fn as_str(&self) -> &'static str {
        match self {
            ImageError::NotFound => "Disk image not found.",
            ImageError::PermissionDenied => "Disk image access denied.",
            ImageError::OutOfRange => "Block beyond end of device.",
            ImageError::Misaligned => "Buffer is not a whole number of blocks.",
            ImageError::Io => "Disk image I/O error.",
        }
    }
}

impl From<io::Error> for ImageError {
    fn from(err: io::Error) -> Self {
        log::warn!("image I/O failed: {}", err);
        match err.kind() {
            io::ErrorKind::NotFound => ImageError::NotFound,
            io::ErrorKind::PermissionDenied => ImageError::PermissionDenied,
            io::ErrorKind::UnexpectedEof => ImageError::OutOfRange,
            _ => ImageError::Io,
        }
    }
}

fn check_len(len: usize) -> Result<(), ImageError> {
    if len % BLOCK_SIZE != 0 {
        return Err(ImageError::Misaligned);
    }
    Ok(())
}

/// Raw device node or flat disk image opened for reading and writing.
pub struct ImageFile {
    file: Mutex<File>,
    blocks: u64,
}

impl ImageFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            blocks: len / BLOCK_SIZE as u64,
        })
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    fn check_range(&self, block: u64, len: usize) -> Result<(), ImageError> {
        check_len(len)?;
        let count = (len / BLOCK_SIZE) as u64;
        // Device nodes report a zero length; let the read itself fail there.
        if self.blocks != 0 && block.saturating_add(count) > self.blocks {
            return Err(ImageError::OutOfRange);
        }
        Ok(())
    }
}

impl BlockDevice for ImageFile {
    type Error = ImageError;

    fn read_block(&self, block: u64, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.check_range(block, buf.len())?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(block * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block: u64, buf: &[u8]) -> Result<(), Self::Error> {
        self.check_range(block, buf.len())?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(block * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), Self::Error> {
        self.file.lock().sync_data()?;
        Ok(())
    }
}

/// Volume held entirely in memory.
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(blocks: usize) -> Self {
        Self::from_bytes(vec![0u8; blocks * BLOCK_SIZE])
    }

    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        let padded = (bytes.len() + BLOCK_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE;
        bytes.resize(padded, 0);
        Self {
            data: Mutex::new(bytes),
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data.into_inner()
    }

    fn span(&self, block: u64, len: usize) -> Result<(usize, usize), ImageError> {
        check_len(len)?;
        let start = usize::try_from(block)
            .ok()
            .and_then(|b| b.checked_mul(BLOCK_SIZE))
            .ok_or(ImageError::OutOfRange)?;
        let end = start.checked_add(len).ok_or(ImageError::OutOfRange)?;
        if end > self.data.lock().len() {
            return Err(ImageError::OutOfRange);
        }
        Ok((start, end))
    }
}

impl BlockDevice for RamDisk {
    type Error = ImageError;

    fn read_block(&self, block: u64, buf: &mut [u8]) -> Result<(), Self::Error> {
        let (start, end) = self.span(block, buf.len())?;
        buf.copy_from_slice(&self.data.lock()[start..end]);
        Ok(())
    }

    fn write_block(&self, block: u64, buf: &[u8]) -> Result<(), Self::Error> {
        let (start, end) = self.span(block, buf.len())?;
        self.data.lock()[start..end].copy_from_slice(buf);
        Ok(())
    }
}
