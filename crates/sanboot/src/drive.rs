use crate::blockdev::{BlockDevice, ISO_BLKSIZE};
use crate::geometry::Geometry;
use crate::status::CallStatus;

/// One emulated drive: a block device plus the per-drive emulation state.
pub struct Drive {
    /// Backing device.
    pub device: Box<dyn BlockDevice>,
    /// Drive number the drive is registered under.
    pub drive: u8,
    /// Drive number the drive would have received had it been enumerated by
    /// the platform firmware. Calls addressed to this number are redirected
    /// to [`Drive::drive`].
    pub natural_drive: u8,
    /// Inferred or caller-specified geometry.
    pub geometry: Geometry,
    /// Boot catalog location, if the medium carries one (optical boot).
    pub boot_catalog: Option<u32>,
    /// Outcome of the most recent command, replayed by get-last-status.
    pub last_status: CallStatus,
}

impl Drive {
    /// Whether the drive number denotes a floppy (bit 7 clear).
    pub fn is_fdd(&self) -> bool {
        self.drive & 0x80 == 0
    }

    /// Whether the medium is optical, judged by its block size.
    pub fn is_cdrom(&self) -> bool {
        self.device.block_size() == ISO_BLKSIZE
    }

    /// Capacity clamped to 32 bits, for interfaces that cannot carry more.
    pub fn capacity32(&self) -> u32 {
        u32::try_from(self.device.capacity()).unwrap_or(u32::MAX)
    }
}

impl std::fmt::Debug for Drive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drive")
            .field("drive", &self.drive)
            .field("natural_drive", &self.natural_drive)
            .field("geometry", &self.geometry)
            .field("boot_catalog", &self.boot_catalog)
            .field("last_status", &self.last_status)
            .finish_non_exhaustive()
    }
}
