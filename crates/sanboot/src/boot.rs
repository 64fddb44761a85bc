//! Bootstrap: load a boot sector or El Torito boot image from an emulated
//! drive and hand control to it.
//!
//! The loaders drive the emulation through its own command dispatch, exactly
//! as the loaded code will, so bootstrap exercises the same paths real
//! callers use.

use std::convert::Infallible;

use guest_memory::{MemoryBus, SegOff};
use thiserror::Error;
use tracing::{debug, info};

use crate::dispatch::{CMD_CDROM_READ_BOOT_CATALOG, CMD_EXTENDED_READ};
use crate::eltorito::{self, CatalogHead};
use crate::regs::RegisterFile;
use crate::registry::Int13;

/// Conventional boot sector load address.
const BOOT_SECTOR: SegOff = SegOff::new(0x0000, 0x7C00);
/// Boot sector signature at offset 510.
const MBR_MAGIC: u16 = 0xAA55;

/// Boot configuration parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootConfig {
    /// Load segment for an El Torito boot image whose catalog entry leaves
    /// the segment unspecified. Defaults to 07C0.
    pub load_segment: Option<u16>,
}

/// Errors from [`Int13::boot`].
///
/// Since a successful boot never returns, every outcome of the call is an
/// error.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("drive {0:#04x} is not an emulated drive")]
    UnknownDrive(u8),

    #[error("boot image read failed with status {status:#04x}")]
    Read { status: u8 },

    #[error("no boot sector or boot catalog found")]
    NotBootable,

    #[error("boot catalog specifies unknown platform {0:#04x}")]
    BadPlatform(u8),

    #[error("boot catalog entry is not bootable")]
    NotBootableEntry,

    #[error("boot image requires emulation type {0:#04x}")]
    EmulationRequired(u8),

    #[error("boot code returned control")]
    Returned,

    #[error("control transfer failed: {0}")]
    Transfer(String),
}

/// Hands control to loaded boot code. Returning `Ok(())` means the boot code
/// gave control back (for example by invoking the boot-failure interrupt).
pub trait BootTransfer {
    fn transfer(&mut self, address: SegOff, drive: u8) -> Result<(), BootError>;
}

impl Int13 {
    /// Boot from an emulated drive.
    ///
    /// Loads the master boot record (or, failing that, the El Torito boot
    /// image) and jumps to it. By definition this can never return success:
    /// the `Ok` type is uninhabited.
    pub fn boot(
        &mut self,
        drive: u8,
        config: &BootConfig,
        bus: &mut dyn MemoryBus,
        transfer: &mut dyn BootTransfer,
    ) -> Result<Infallible, BootError> {
        if !self.drives.contains_key(&drive) {
            return Err(BootError::UnknownDrive(drive));
        }

        let address = match self.load_mbr(drive, bus) {
            Ok(address) => address,
            Err(err) => {
                debug!(drive, %err, "no usable boot sector, trying boot catalog");
                self.load_eltorito(drive, config, bus)?
            }
        };

        info!(drive, segment = address.segment, offset = address.offset, "jumping to boot code");
        transfer.transfer(address, drive)?;
        Err(BootError::Returned)
    }

    /// Load and verify the master boot record.
    fn load_mbr(&mut self, drive: u8, bus: &mut dyn MemoryBus) -> Result<SegOff, BootError> {
        // Read cylinder 0, head 0, sector 1 to 0000:7C00.
        let mut regs = RegisterFile {
            ax: 0x0201,
            cx: 0x0001,
            dx: drive as u16,
            es: BOOT_SECTOR.segment,
            bx: BOOT_SECTOR.offset,
            ..Default::default()
        };
        self.call(&mut regs, bus)?;

        if bus.read_u16(BOOT_SECTOR.linear() + 510) != MBR_MAGIC {
            debug!(drive, "boot sector signature missing");
            return Err(BootError::NotBootable);
        }
        Ok(BOOT_SECTOR)
    }

    /// Load the El Torito boot image named by the catalog's initial/default
    /// entry.
    fn load_eltorito(
        &mut self,
        drive: u8,
        config: &BootConfig,
        bus: &mut dyn MemoryBus,
    ) -> Result<SegOff, BootError> {
        let scratch = self.config.scratch_base as u64;
        let packet = SegOff::new((scratch >> 4) as u16, (scratch & 0xF) as u16);

        // Read the first catalog block to 0x7C00.
        let mut command = [0u8; 10];
        command[0] = command.len() as u8;
        command[2..4].copy_from_slice(&1u16.to_le_bytes());
        command[4..8].copy_from_slice(&(BOOT_SECTOR.linear() as u32).to_le_bytes());
        bus.write_physical(scratch, &command);

        let mut regs = RegisterFile {
            ax: (CMD_CDROM_READ_BOOT_CATALOG as u16) << 8,
            dx: drive as u16,
            ds: packet.segment,
            si: packet.offset,
            ..Default::default()
        };
        if self.call(&mut regs, bus).is_err() {
            return Err(BootError::NotBootable);
        }

        let mut catalog = [0u8; 64];
        bus.read_physical(BOOT_SECTOR.linear(), &mut catalog);
        let head = CatalogHead::parse(&catalog);
        if head.platform_id != eltorito::PLATFORM_X86 {
            return Err(BootError::BadPlatform(head.platform_id));
        }
        if head.indicator != eltorito::BOOTABLE {
            return Err(BootError::NotBootableEntry);
        }
        if head.media_type != eltorito::NO_EMULATION {
            return Err(BootError::EmulationRequired(head.media_type));
        }

        let segment = if head.load_segment != 0 {
            head.load_segment
        } else {
            config.load_segment.unwrap_or(0x07C0)
        };
        let address = SegOff::new(segment, 0);
        info!(
            drive,
            lba = head.start,
            count = head.length,
            segment,
            "loading boot image"
        );

        // Read the boot image with an extended read. Images longer than the
        // short count field allows use the long form, which carries a
        // physical buffer address.
        let mut dap = [0u8; 0x20];
        if head.length <= 0x7F {
            dap[0] = 0x10;
            dap[2] = head.length as u8;
            dap[4..8].copy_from_slice(&address.to_wire());
        } else {
            dap[0] = 0x20;
            dap[2] = 0xFF;
            dap[16..24].copy_from_slice(&address.linear().to_le_bytes());
            dap[24..28].copy_from_slice(&(head.length as u32).to_le_bytes());
        }
        dap[8..16].copy_from_slice(&(head.start as u64).to_le_bytes());
        bus.write_physical(scratch, &dap);

        let mut regs = RegisterFile {
            ax: (CMD_EXTENDED_READ as u16) << 8,
            dx: drive as u16,
            ds: packet.segment,
            si: packet.offset,
            ..Default::default()
        };
        self.call(&mut regs, bus)?;
        Ok(address)
    }

    /// Issue one call through the dispatcher, mapping a carry-flag failure to
    /// its status code.
    fn call(&mut self, regs: &mut RegisterFile, bus: &mut dyn MemoryBus) -> Result<(), BootError> {
        if !self.interrupt(regs, bus, None) {
            return Err(BootError::UnknownDrive(regs.dl()));
        }
        if regs.carry {
            return Err(BootError::Read { status: regs.ah() });
        }
        Ok(())
    }
}
