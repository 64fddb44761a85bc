use thiserror::Error;

/// Block size required by the legacy (non-extended) INT 13 read/write and
/// get-parameters calls.
pub const BLKSIZE: usize = 512;

/// ISO9660 block size. A device reporting this block size is treated as
/// optical media for CD-ROM emulation purposes.
pub const ISO_BLKSIZE: usize = 2048;

/// Errors surfaced by [`BlockDevice`] implementations.
///
/// `Io` carries a human-readable string rather than `std::io::Error` so
/// transports without a platform error type (or running where one is
/// unavailable) can still describe their failures.
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("out of range: lba={lba} count={count} capacity={capacity}")]
    OutOfRange { lba: u64, count: u64, capacity: u64 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("device reset failed: {0}")]
    ResetFailed(String),
}

/// Synchronous block-device collaborator.
///
/// All transfers are whole blocks of [`BlockDevice::block_size`] bytes; the
/// buffer length determines the transfer count. Implementations own any
/// retry or timeout policy; this core never retries.
pub trait BlockDevice {
    /// Read `buf.len() / block_size()` blocks starting at `lba`.
    fn read(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), DiskError>;

    /// Write `buf.len() / block_size()` blocks starting at `lba`.
    fn write(&mut self, lba: u64, buf: &[u8]) -> Result<(), DiskError>;

    /// Reset the device.
    fn reset(&mut self) -> Result<(), DiskError>;

    /// Total number of addressable blocks.
    fn capacity(&self) -> u64;

    /// Block size in bytes.
    fn block_size(&self) -> usize;
}

/// In-memory block device backed by a `Vec<u8>`, padded to a whole number of
/// blocks. Used by tests and as a reference implementation.
#[derive(Debug, Clone)]
pub struct RamDisk {
    data: Vec<u8>,
    block_size: usize,
}

impl RamDisk {
    pub fn new(mut data: Vec<u8>, block_size: usize) -> Self {
        assert!(block_size.is_power_of_two());
        let rem = data.len() % block_size;
        if rem != 0 {
            data.resize(data.len() + (block_size - rem), 0);
        }
        Self { data, block_size }
    }

    /// Empty disk of `blocks` blocks.
    pub fn zeroed(blocks: u64, block_size: usize) -> Self {
        Self::new(vec![0u8; blocks as usize * block_size], block_size)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, lba: u64, len: usize) -> Result<std::ops::Range<usize>, DiskError> {
        let count = (len / self.block_size) as u64;
        let err = || DiskError::OutOfRange {
            lba,
            count,
            capacity: self.capacity(),
        };
        let start = lba
            .checked_mul(self.block_size as u64)
            .and_then(|s| usize::try_from(s).ok())
            .ok_or_else(err)?;
        let end = start.checked_add(len).ok_or_else(err)?;
        if end > self.data.len() {
            return Err(err());
        }
        Ok(start..end)
    }
}

impl BlockDevice for RamDisk {
    fn read(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), DiskError> {
        let range = self.range(lba, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, lba: u64, buf: &[u8]) -> Result<(), DiskError> {
        let range = self.range(lba, buf.len())?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), DiskError> {
        Ok(())
    }

    fn capacity(&self) -> u64 {
        (self.data.len() / self.block_size) as u64
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}
