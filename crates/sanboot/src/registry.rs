//! Drive registry: hooking drives into the emulation, drive numbering, and
//! BIOS Data Area drive-count maintenance.

use std::collections::BTreeMap;

use guest_memory::{MemoryBus, SegOff};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::blockdev::{BlockDevice, DiskError, BLKSIZE};
use crate::describe::TableArena;
use crate::drive::Drive;
use crate::eltorito;
use crate::geometry::{self, Geometry};

/// BIOS Data Area equipment word (physical 40:10).
const BDA_EQUIPMENT_WORD: u64 = 0x410;
/// BIOS Data Area fixed-disk count (physical 40:75).
const BDA_NUM_DRIVES: u64 = 0x475;

/// Requesting this drive number (or any number whose low seven bits are all
/// set) asks for the natural drive number: the number the drive would have
/// received had the platform firmware enumerated it.
pub const NATURAL_DRIVE: u8 = 0xFF;

/// Installs and removes the real interrupt vector. The emulation core only
/// decides *when* the vector must change (first drive hooked, last drive
/// unhooked); the mechanism belongs to the caller.
pub trait InterruptVector {
    fn install(&mut self);
    fn remove(&mut self);
}

/// Errors from [`Int13::hook`].
#[derive(Debug, Error)]
pub enum HookError {
    #[error("drive {0:#04x} is already registered")]
    DriveInUse(u8),

    #[error(transparent)]
    Device(#[from] DiskError),
}

/// Parameters for hooking a new drive.
///
/// Zero geometry fields mean "infer"; see [`crate::Int13::hook`].
#[derive(Debug, Clone, Copy)]
pub struct HookRequest {
    /// Requested drive number, or [`NATURAL_DRIVE`].
    pub drive: u8,
    pub cylinders: u32,
    pub heads: u32,
    pub sectors_per_track: u32,
}

impl HookRequest {
    pub fn new(drive: u8) -> Self {
        Self { drive, cylinders: 0, heads: 0, sectors_per_track: 0 }
    }
}

impl Default for HookRequest {
    fn default() -> Self {
        Self::new(NATURAL_DRIVE)
    }
}

/// Static configuration of the emulation core.
#[derive(Debug, Clone, Copy)]
pub struct Int13Config {
    /// Where the shared floppy disk parameter table is written in guest
    /// memory. Returned in ES:DI by get-parameters for floppy drives.
    pub fdd_param_table: SegOff,
    /// Base of the guest-memory scratch area used for command packets during
    /// bootstrap.
    pub scratch_base: u32,
}

impl Default for Int13Config {
    fn default() -> Self {
        Self {
            fdd_param_table: SegOff::new(0xF000, 0xE100),
            scratch_base: 0x500,
        }
    }
}

/// Dummy floppy disk parameter table: 512 bytes per sector, and the highest
/// sectors-per-track value ever reported for an emulated floppy.
const FDD_PARAM_TABLE: [u8; 11] = [0, 0, 0, 0x02, 48, 0, 0, 0, 0, 0, 0];

/// The emulation core: registered drives plus cached BIOS Data Area state.
#[derive(Debug)]
pub struct Int13 {
    pub(crate) drives: BTreeMap<u8, Drive>,
    pub(crate) config: Int13Config,
    pub(crate) arena: TableArena,
    /// Cached BIOS Data Area values, used to detect outside modification.
    equipment_word: u16,
    pub(crate) num_drives: u8,
    pub(crate) num_fdds: u8,
    vector_installed: bool,
}

impl Int13 {
    pub fn new(config: Int13Config) -> Self {
        Self {
            drives: BTreeMap::new(),
            config,
            arena: TableArena::new(),
            equipment_word: 0,
            num_drives: 0,
            num_fdds: 0,
            vector_installed: false,
        }
    }

    pub fn drive(&self, drive: u8) -> Option<&Drive> {
        self.drives.get(&drive)
    }

    /// Register a block device as an emulated drive.
    ///
    /// Assigns the requested drive number (or the natural one), probes
    /// optical media for a boot catalog, infers geometry for block-size-512
    /// devices, installs the interrupt vector if this is the first drive, and
    /// raises the BIOS Data Area drive counts to cover the new drive. Returns
    /// the assigned drive number.
    pub fn hook(
        &mut self,
        request: HookRequest,
        mut device: Box<dyn BlockDevice>,
        bus: &mut dyn MemoryBus,
        vector: &mut dyn InterruptVector,
    ) -> Result<u8, HookError> {
        self.sync_num_drives(bus);
        let natural_drive = if request.drive & 0x80 != 0 {
            self.num_drives | 0x80
        } else {
            self.num_fdds
        };
        let drive = if request.drive & 0x7F == 0x7F {
            natural_drive
        } else {
            request.drive
        };

        if self.drives.contains_key(&drive) {
            return Err(HookError::DriveInUse(drive));
        }

        let boot_catalog = if device.block_size() == crate::blockdev::ISO_BLKSIZE {
            eltorito::probe(drive, device.as_mut())?
        } else {
            None
        };

        let specified = Geometry {
            cylinders: request.cylinders,
            heads: request.heads,
            sectors_per_track: request.sectors_per_track,
        };
        let geometry = if device.block_size() == BLKSIZE {
            geometry::guess(drive, device.as_mut(), drive & 0x80 == 0, specified)?
        } else {
            specified
        };

        info!(
            drive,
            natural_drive,
            cylinders = geometry.cylinders,
            heads = geometry.heads,
            sectors_per_track = geometry.sectors_per_track,
            "registered drive"
        );

        if !self.vector_installed {
            bus.write_physical(self.config.fdd_param_table.linear(), &FDD_PARAM_TABLE);
            vector.install();
            self.vector_installed = true;
        }

        self.drives.insert(
            drive,
            Drive {
                device,
                drive,
                natural_drive,
                geometry,
                boot_catalog,
                last_status: Ok(0),
            },
        );
        self.sync_num_drives(bus);
        Ok(drive)
    }

    /// Unregister a drive.
    ///
    /// The BIOS Data Area drive counts are deliberately not decremented:
    /// other consumers may have observed them, and numbering below the
    /// removed drive must stay stable. If this was the last drive, the
    /// interrupt vector is removed.
    pub fn unhook(&mut self, drive: u8, vector: &mut dyn InterruptVector) {
        if self.drives.remove(&drive).is_none() {
            warn!(drive, "unhook of unregistered drive");
            return;
        }
        info!(drive, "unregistered drive");
        if self.drives.is_empty() {
            vector.remove();
            self.vector_installed = false;
        }
    }

    /// Raise the BIOS Data Area drive counts to cover every registered drive
    /// (under both its assigned and natural numbers), then write them back
    /// and cache the written values.
    pub fn sync_num_drives(&mut self, bus: &mut dyn MemoryBus) {
        let mut equipment_word = bus.read_u16(BDA_EQUIPMENT_WORD);
        let mut num_drives = bus.read_u8(BDA_NUM_DRIVES);
        let mut num_fdds = if equipment_word & 0x0001 != 0 {
            (((equipment_word >> 6) & 0x3) + 1) as u8
        } else {
            0
        };

        for drive in self.drives.values() {
            let counter = if drive.is_fdd() {
                &mut num_fdds
            } else {
                &mut num_drives
            };
            let max_drive = drive.drive.max(drive.natural_drive);
            let required = (max_drive & 0x7F) + 1;
            if *counter < required {
                *counter = required;
                debug!(
                    drive = drive.drive,
                    hdds = num_drives,
                    fdds = num_fdds,
                    "added drive to BIOS drive count"
                );
            }
        }

        equipment_word &= !((0x3 << 6) | 0x0001);
        if num_fdds != 0 {
            equipment_word |= 0x0001 | ((((num_fdds - 1) & 0x3) as u16) << 6);
        }
        bus.write_u16(BDA_EQUIPMENT_WORD, equipment_word);
        bus.write_u8(BDA_NUM_DRIVES, num_drives);

        self.equipment_word = equipment_word;
        self.num_drives = num_drives;
        self.num_fdds = num_fdds;
    }

    /// Re-sync the drive counts if some other code has changed the BIOS Data
    /// Area since the last sync. Called on every dispatched interrupt.
    pub(crate) fn check_num_drives(&mut self, bus: &mut dyn MemoryBus) {
        let equipment_word = bus.read_u16(BDA_EQUIPMENT_WORD);
        let num_drives = bus.read_u8(BDA_NUM_DRIVES);
        if equipment_word != self.equipment_word || num_drives != self.num_drives {
            self.sync_num_drives(bus);
        }
    }
}

impl Default for Int13 {
    fn default() -> Self {
        Self::new(Int13Config::default())
    }
}

/// No-op vector for hosts that dispatch calls directly.
#[derive(Debug, Default)]
pub struct NullVector;

impl InterruptVector for NullVector {
    fn install(&mut self) {}
    fn remove(&mut self) {}
}
