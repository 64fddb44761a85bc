//! Drive geometry inference.
//!
//! Legacy callers address drives by cylinder/head/sector, so every emulated
//! drive needs a plausible geometry even though the underlying device is flat
//! LBA. Hard disk geometry is guessed from the partition table; floppy
//! geometry is guessed from the raw capacity.

use tracing::debug;

use crate::blockdev::{BlockDevice, DiskError};

/// Cylinder/head/sector geometry of an emulated drive.
///
/// Cylinders are capped at 1024 (ten bits in the legacy encoding), heads at
/// 255, sectors per track at 63.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cylinders: u32,
    pub heads: u32,
    pub sectors_per_track: u32,
}

impl Geometry {
    /// Sectors addressable through the legacy interface.
    pub const fn chs_sectors(&self) -> u64 {
        self.cylinders as u64 * self.heads as u64 * self.sectors_per_track as u64
    }
}

/// Recognised floppy disk formats as (cylinders, heads, sectors per track).
const FDD_GEOMETRIES: [(u32, u32, u32); 20] = [
    (40, 1, 8),
    (40, 1, 9),
    (40, 2, 8),
    (40, 1, 9),
    (80, 2, 8),
    (80, 2, 9),
    (80, 2, 15),
    (80, 2, 18),
    (80, 2, 20),
    (80, 2, 21),
    (82, 2, 21),
    (83, 2, 21),
    (80, 2, 22),
    (80, 2, 23),
    (80, 2, 24),
    (80, 2, 36),
    (80, 2, 39),
    (80, 2, 40),
    (80, 2, 44),
    (80, 2, 48),
];

/// Offset of the first partition table entry within the boot sector.
const PARTITION_TABLE_OFFSET: usize = 446;
/// Size of one partition table entry.
const PARTITION_ENTRY_LEN: usize = 16;

/// One packed CHS address from a partition table entry.
#[derive(Debug, Clone, Copy)]
struct PackedChs {
    head: u32,
    sector: u32,
    cylinder: u32,
}

impl PackedChs {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            head: bytes[0] as u32,
            sector: (bytes[1] & 0x3F) as u32,
            cylinder: (((bytes[1] & 0xC0) as u32) << 2) | bytes[2] as u32,
        }
    }
}

/// Guess heads and sectors per track for a hard disk by scanning the
/// partition table in its first block.
///
/// A partition starting on cylinder 0 (but not head 0) pins down the sectors
/// per track unambiguously; otherwise the highest ending head and sector
/// across used partitions raise the guesses. Unconstrained values default to
/// 255 heads and 63 sectors per track.
fn guess_hdd(drive: u8, device: &mut dyn BlockDevice) -> Result<(u32, u32), DiskError> {
    let mut block = vec![0u8; device.block_size()];
    device.read(0, &mut block)?;

    let mut heads = 0u32;
    let mut sectors = 0u32;
    for i in 0..4 {
        let entry = &block[PARTITION_TABLE_OFFSET + i * PARTITION_ENTRY_LEN..]
            [..PARTITION_ENTRY_LEN];
        if entry[4] == 0 {
            continue;
        }

        let start = PackedChs::parse(&entry[1..4]);
        let end = PackedChs::parse(&entry[5..8]);
        let start_lba = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]);

        if start.cylinder == 0 && start.head != 0 {
            sectors = (start_lba + 1 - start.sector) / start.head;
            debug!(drive, partition = i + 1, sectors, "guessed sectors per track");
        }
        if end.head + 1 > heads {
            heads = end.head + 1;
            debug!(drive, partition = i + 1, heads, "guessed heads");
        }
        if end.sector > sectors {
            sectors = end.sector;
            debug!(drive, partition = i + 1, sectors, "guessed sectors per track");
        }
    }

    if heads == 0 {
        heads = 255;
    }
    if sectors == 0 {
        sectors = 63;
    }
    Ok((heads, sectors))
}

/// Guess heads and sectors per track for a floppy from its capacity,
/// matching against the table of known formats. An unrecognised size is
/// assumed to be a partial image in the most common format (1440K, 80/2/18).
fn guess_fdd(drive: u8, capacity: u64) -> (u32, u32) {
    for &(cylinders, heads, sectors) in &FDD_GEOMETRIES {
        if (cylinders * heads * sectors) as u64 == capacity {
            debug!(drive, cylinders, heads, sectors, "matched floppy format");
            return (heads, sectors);
        }
    }
    debug!(drive, kib = capacity / 2, "unrecognised floppy size, assuming 80/2/18");
    (2, 18)
}

/// Guess the full geometry of a drive.
///
/// Any nonzero field of `specified` overrides the corresponding guess.
/// Cylinders, when not specified, are derived from the 32-bit capacity and
/// capped at 1024.
pub fn guess(
    drive: u8,
    device: &mut dyn BlockDevice,
    is_fdd: bool,
    specified: Geometry,
) -> Result<Geometry, DiskError> {
    let (guessed_heads, guessed_sectors) = if is_fdd {
        guess_fdd(drive, device.capacity())
    } else {
        guess_hdd(drive, device)?
    };

    let heads = if specified.heads != 0 {
        specified.heads
    } else {
        guessed_heads
    };
    let sectors_per_track = if specified.sectors_per_track != 0 {
        specified.sectors_per_track
    } else {
        guessed_sectors
    };
    let cylinders = if specified.cylinders != 0 {
        specified.cylinders
    } else {
        let blocks = u32::try_from(device.capacity()).unwrap_or(u32::MAX);
        (blocks / (heads * sectors_per_track)).min(1024)
    };

    Ok(Geometry {
        cylinders,
        heads,
        sectors_per_track,
    })
}
