//! Command dispatch: drive number resolution and the per-command handlers.

use bitflags::bitflags;
use guest_memory::{MemoryBus, SegOff};
use tracing::{debug, trace};

use crate::blockdev::BLKSIZE;
use crate::drive::Drive;
use crate::edd::{self, DeviceIdentifier};
use crate::geometry::Geometry;
use crate::regs::RegisterFile;
use crate::registry::{Int13, Int13Config};
use crate::status::{CallStatus, Int13Status};

// Command numbers.
const CMD_RESET: u8 = 0x00;
const CMD_GET_LAST_STATUS: u8 = 0x01;
const CMD_READ_SECTORS: u8 = 0x02;
const CMD_WRITE_SECTORS: u8 = 0x03;
const CMD_GET_PARAMETERS: u8 = 0x08;
const CMD_GET_DISK_TYPE: u8 = 0x15;
const CMD_EXTENSION_CHECK: u8 = 0x41;
pub(crate) const CMD_EXTENDED_READ: u8 = 0x42;
const CMD_EXTENDED_WRITE: u8 = 0x43;
const CMD_EXTENDED_VERIFY: u8 = 0x44;
const CMD_EXTENDED_SEEK: u8 = 0x47;
const CMD_GET_EXTENDED_PARAMETERS: u8 = 0x48;
const CMD_CDROM_STATUS_TERMINATE: u8 = 0x4B;
pub(crate) const CMD_CDROM_READ_BOOT_CATALOG: u8 = 0x4D;

/// Sectors addressable through the legacy ten-bit-cylinder encoding.
const MAX_CHS_SECTORS: u64 = Geometry {
    cylinders: 1024,
    heads: 255,
    sectors_per_track: 63,
}
.chs_sectors();

/// Extensions API version 3.0, returned by the installation check.
const EXTENSION_VER_3_0: u8 = 0x30;

/// Floppy drive type reported by get-parameters (1.44M).
const FDD_TYPE_1M44: u8 = 0x04;

bitflags! {
    /// Extensions API support bitmap.
    struct ExtensionFlags: u16 {
        const LINEAR = 0x0001;
        const EDD = 0x0004;
        const SIXTY_FOUR_BIT = 0x0008;
    }
}

bitflags! {
    /// Extended parameters information flags.
    struct ParamFlags: u16 {
        const DMA_TRANSPARENT = 0x0001;
        const CHS_VALID = 0x0002;
    }
}

/// Disk address packet field offsets.
const DAP_COUNT: usize = 0x02;
const DAP_BUFFER: usize = 0x04;
const DAP_LBA: usize = 0x08;
const DAP_BUFFER_PHYS: usize = 0x10;
const DAP_LONG_COUNT: usize = 0x18;
const DAP_LEN: usize = 0x20;

/// Transfer count, decoded from the packet's dual-purpose count byte: a
/// literal short count, or the sentinel 0xFF redirecting to the 32-bit
/// long-count field.
#[derive(Debug, Clone, Copy)]
enum TransferCount {
    Short(u8),
    Long(u32),
}

impl TransferCount {
    fn blocks(self) -> u64 {
        match self {
            TransferCount::Short(n) => n as u64,
            TransferCount::Long(n) => n as u64,
        }
    }
}

/// Transfer buffer, decoded from the packet's dual-purpose pointer fields: a
/// real-mode segment:offset pair, or (when the pair is all-ones or the long
/// count form is in use) the 64-bit physical address field.
#[derive(Debug, Clone, Copy)]
enum BufferPtr {
    Real(SegOff),
    Physical(u64),
}

impl BufferPtr {
    fn address(self) -> u64 {
        match self {
            BufferPtr::Real(segoff) => segoff.linear(),
            BufferPtr::Physical(addr) => addr,
        }
    }
}

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn le_u64(bytes: &[u8]) -> u64 {
    le_u32(bytes) as u64 | ((le_u32(&bytes[4..]) as u64) << 32)
}

enum Resolution {
    Handle(u8),
    Remap(u8),
    Chain,
}

impl Int13 {
    /// Dispatch one interrupt call.
    ///
    /// Returns `true` if the call was handled (registers and carry flag
    /// updated), or `false` if the caller should chain to the previous
    /// interrupt handler. A call addressed to a drive's natural number is
    /// not handled: DL is rewritten to the drive's assigned number and the
    /// call chains, so the handler servicing the assigned number (usually
    /// this one, re-entered) picks it up.
    pub fn interrupt(
        &mut self,
        regs: &mut RegisterFile,
        bus: &mut dyn MemoryBus,
        identifier: Option<&mut dyn DeviceIdentifier>,
    ) -> bool {
        self.check_num_drives(bus);

        let command = regs.ah();
        let bios_drive = regs.dl();
        let resolution = self.resolve(bios_drive, command);
        let drive = match resolution {
            Resolution::Handle(number) => number,
            Resolution::Remap(number) => {
                debug!(command, bios_drive, drive = number, "remapped natural drive number");
                regs.set_dl(number);
                return false;
            }
            Resolution::Chain => return false,
        };

        let num_fdds = self.num_fdds;
        let num_drives = self.num_drives;
        let config = self.config;
        let Some(dev) = self.drives.get_mut(&drive) else {
            return false;
        };

        trace!(command, drive, "dispatching");
        let status = match command {
            CMD_RESET => reset(dev),
            CMD_GET_LAST_STATUS => dev.last_status,
            CMD_READ_SECTORS => rw_sectors(dev, regs, bus, false),
            CMD_WRITE_SECTORS => rw_sectors(dev, regs, bus, true),
            CMD_GET_PARAMETERS => get_parameters(dev, regs, num_fdds, num_drives, &config),
            CMD_GET_DISK_TYPE => get_disk_type(dev, regs),
            CMD_EXTENSION_CHECK => extension_check(dev, regs),
            CMD_EXTENDED_READ => extended_rw(dev, regs, bus, false),
            CMD_EXTENDED_WRITE => extended_rw(dev, regs, bus, true),
            CMD_EXTENDED_VERIFY => Err(Int13Status::Invalid),
            CMD_EXTENDED_SEEK => Ok(0),
            CMD_GET_EXTENDED_PARAMETERS => get_extended_parameters(dev, regs, bus, identifier),
            CMD_CDROM_STATUS_TERMINATE => cdrom_status_terminate(dev, regs, bus),
            CMD_CDROM_READ_BOOT_CATALOG => cdrom_read_boot_catalog(dev, regs, bus),
            _ => {
                debug!(command, drive, "unrecognised command");
                Err(Int13Status::Invalid)
            }
        };

        dev.last_status = status;
        match status {
            Ok(code) => {
                regs.carry = false;
                regs.set_ah(code);
            }
            Err(status) => {
                debug!(command, drive, status = status as u8, "command failed");
                regs.carry = true;
                regs.set_ah(status as u8);
            }
        }
        true
    }

    fn resolve(&self, bios_drive: u8, command: u8) -> Resolution {
        for drive in self.drives.values() {
            if bios_drive == drive.drive {
                return Resolution::Handle(drive.drive);
            }
        }
        for drive in self.drives.values() {
            if bios_drive == drive.natural_drive {
                return Resolution::Remap(drive.drive);
            }
        }
        // Non-drive-specific CD-ROM calls may use a wildcard drive number.
        if bios_drive & 0x7F == 0x7F && command == CMD_CDROM_STATUS_TERMINATE {
            for drive in self.drives.values() {
                if drive.is_cdrom() {
                    return Resolution::Handle(drive.drive);
                }
            }
        }
        Resolution::Chain
    }
}

fn reset(dev: &mut Drive) -> CallStatus {
    trace!(drive = dev.drive, "reset");
    dev.device.reset().map_err(|err| {
        debug!(drive = dev.drive, %err, "reset failed");
        Int13Status::ResetFailed
    })?;
    Ok(0)
}

/// Reject a transfer extending past the end of the device. The count fields
/// of the packet commands are guest-controlled and can demand absurd
/// transfer sizes, so this must run before any buffer is allocated.
fn check_bounds(dev: &Drive, lba: u64, blocks: u64) -> Result<(), Int13Status> {
    let capacity = dev.device.capacity();
    if blocks > capacity || lba > capacity - blocks {
        debug!(drive = dev.drive, lba, blocks, capacity, "transfer beyond device");
        return Err(Int13Status::ReadError);
    }
    Ok(())
}

/// Move `buf.len()` bytes between the device and guest memory.
fn transfer(
    dev: &mut Drive,
    bus: &mut dyn MemoryBus,
    lba: u64,
    addr: u64,
    buf: &mut [u8],
    is_write: bool,
) -> Result<(), Int13Status> {
    let result = if is_write {
        bus.read_physical(addr, buf);
        dev.device.write(lba, buf)
    } else {
        dev.device.read(lba, buf).map(|()| bus.write_physical(addr, buf))
    };
    result.map_err(|err| {
        debug!(drive = dev.drive, lba, %err, "I/O failed");
        Int13Status::ReadError
    })
}

fn rw_sectors(
    dev: &mut Drive,
    regs: &RegisterFile,
    bus: &mut dyn MemoryBus,
    is_write: bool,
) -> CallStatus {
    if dev.device.block_size() != BLKSIZE {
        debug!(
            drive = dev.drive,
            block_size = dev.device.block_size(),
            "invalid block size for non-extended read/write"
        );
        return Err(Int13Status::Invalid);
    }

    let geometry = dev.geometry;
    let cylinder = (((regs.cl() & 0xC0) as u32) << 2) | regs.ch() as u32;
    let head = regs.dh() as u32;
    let sector = (regs.cl() & 0x3F) as u32;
    if cylinder >= geometry.cylinders
        || head >= geometry.heads
        || sector < 1
        || sector > geometry.sectors_per_track
    {
        debug!(
            drive = dev.drive,
            cylinder, head, sector, "address out of range for geometry"
        );
        return Err(Int13Status::Invalid);
    }
    let lba = ((cylinder * geometry.heads + head) * geometry.sectors_per_track + sector - 1) as u64;
    let count = regs.al() as usize;

    trace!(
        drive = dev.drive,
        cylinder,
        head,
        sector,
        lba,
        count,
        is_write,
        "sector transfer"
    );
    let mut buf = vec![0u8; count * BLKSIZE];
    transfer(dev, bus, lba, regs.buffer_ptr().linear(), &mut buf, is_write)?;
    Ok(0)
}

fn get_parameters(
    dev: &mut Drive,
    regs: &mut RegisterFile,
    num_fdds: u8,
    num_drives: u8,
    config: &Int13Config,
) -> CallStatus {
    if dev.device.block_size() != BLKSIZE {
        debug!(
            drive = dev.drive,
            block_size = dev.device.block_size(),
            "invalid block size for non-extended parameters"
        );
        return Err(Int13Status::Invalid);
    }

    let max_cylinder = dev.geometry.cylinders - 1;
    let max_head = dev.geometry.heads - 1;
    // Maximum sector number is one-based, so this is not a count minus one.
    let max_sector = dev.geometry.sectors_per_track;

    regs.set_ch((max_cylinder & 0xFF) as u8);
    regs.set_cl((((max_cylinder >> 8) as u8) << 6) | max_sector as u8);
    regs.set_dh(max_head as u8);
    regs.set_dl(if dev.is_fdd() { num_fdds } else { num_drives });

    if dev.is_fdd() {
        regs.set_bl(FDD_TYPE_1M44);
        regs.es = config.fdd_param_table.segment;
        regs.di = config.fdd_param_table.offset;
    }
    Ok(0)
}

fn get_disk_type(dev: &mut Drive, regs: &mut RegisterFile) -> CallStatus {
    trace!(drive = dev.drive, "get disk type");
    if dev.is_fdd() {
        Ok(0x01)
    } else {
        let blocks = dev.capacity32();
        regs.cx = (blocks >> 16) as u16;
        regs.dx = (blocks & 0xFFFF) as u16;
        Ok(0x03)
    }
}

fn extension_check(dev: &mut Drive, regs: &mut RegisterFile) -> CallStatus {
    if regs.bx == 0x55AA && !dev.is_fdd() {
        trace!(drive = dev.drive, "extensions check");
        regs.bx = 0xAA55;
        regs.cx =
            (ExtensionFlags::LINEAR | ExtensionFlags::EDD | ExtensionFlags::SIXTY_FOUR_BIT).bits();
        Ok(EXTENSION_VER_3_0)
    } else {
        Err(Int13Status::Invalid)
    }
}

fn extended_rw(
    dev: &mut Drive,
    regs: &RegisterFile,
    bus: &mut dyn MemoryBus,
    is_write: bool,
) -> CallStatus {
    // Some CD-ROM emulation drivers take extended-read support on a floppy
    // drive as proof that the drive is really optical. Refuse.
    if dev.is_fdd() {
        return Err(Int13Status::Invalid);
    }

    let packet = regs.packet_ptr().linear();
    let bufsize = bus.read_u8(packet);
    if (bufsize as usize) < DAP_BUFFER_PHYS {
        debug!(drive = dev.drive, bufsize, "invalid packet size");
        return Err(Int13Status::Invalid);
    }

    // Fields beyond the caller's packet size read as zero.
    let mut raw = [0u8; DAP_LEN];
    let len = (bufsize as usize).min(DAP_LEN);
    bus.read_physical(packet, &mut raw[..len]);

    let count = match raw[DAP_COUNT] {
        n @ 0..=0x7F => TransferCount::Short(n),
        0xFF => TransferCount::Long(le_u32(&raw[DAP_LONG_COUNT..])),
        n => {
            debug!(drive = dev.drive, count = n, "invalid count");
            return Err(Int13Status::Invalid);
        }
    };
    let segoff = SegOff::from_wire([
        raw[DAP_BUFFER],
        raw[DAP_BUFFER + 1],
        raw[DAP_BUFFER + 2],
        raw[DAP_BUFFER + 3],
    ]);
    let buffer = if matches!(count, TransferCount::Long(_))
        || (segoff.segment == 0xFFFF && segoff.offset == 0xFFFF)
    {
        BufferPtr::Physical(le_u64(&raw[DAP_BUFFER_PHYS..]))
    } else {
        BufferPtr::Real(segoff)
    };
    let lba = le_u64(&raw[DAP_LBA..]);

    let addr = buffer.address();
    let blocks = count.blocks();
    trace!(drive = dev.drive, lba, addr, blocks, is_write, "extended transfer");
    let outcome = check_bounds(dev, lba, blocks).and_then(|()| {
        let mut buf = vec![0u8; blocks as usize * dev.device.block_size()];
        transfer(dev, bus, lba, addr, &mut buf, is_write)
    });
    if let Err(status) = outcome {
        // Record that no blocks were transferred successfully.
        bus.write_u8(packet + DAP_COUNT as u64, 0);
        return Err(status);
    }
    Ok(0)
}

fn get_extended_parameters(
    dev: &mut Drive,
    regs: &RegisterFile,
    bus: &mut dyn MemoryBus,
    identifier: Option<&mut dyn DeviceIdentifier>,
) -> CallStatus {
    const PARAMS_DPTE: usize = 0x1A;
    const PARAMS_DPI: usize = 0x1E;
    const PARAMS_LEN: usize = PARAMS_DPI + edd::DEVICE_PATH_INFO_LEN;

    let table = regs.packet_ptr().linear();
    let bufsize = bus.read_u16(table);
    trace!(drive = dev.drive, bufsize, "get extended parameters");

    let mut params = [0u8; PARAMS_LEN];
    let mut flags = ParamFlags::DMA_TRANSPARENT;
    if dev.geometry.cylinders < 1024 && dev.device.capacity() <= MAX_CHS_SECTORS {
        flags |= ParamFlags::CHS_VALID;
    }
    params[2..4].copy_from_slice(&flags.bits().to_le_bytes());
    params[4..8].copy_from_slice(&dev.geometry.cylinders.to_le_bytes());
    params[8..12].copy_from_slice(&dev.geometry.heads.to_le_bytes());
    params[12..16].copy_from_slice(&dev.geometry.sectors_per_track.to_le_bytes());
    params[16..24].copy_from_slice(&dev.device.capacity().to_le_bytes());
    params[24..26].copy_from_slice(&(dev.device.block_size() as u16).to_le_bytes());
    params[PARAMS_DPTE..PARAMS_DPI].fill(0xFF);

    // Device path information is appended only when the hardware behind the
    // drive can be identified.
    let mut len = PARAMS_DPI;
    if let Some(identifier) = identifier {
        match identifier.identify(dev.drive) {
            Ok(path) => {
                params[PARAMS_DPI..].copy_from_slice(&edd::encode_device_path_info(&path));
                len = PARAMS_LEN;
            }
            Err(err) => {
                debug!(drive = dev.drive, %err, "no device path information");
            }
        }
    }

    if (bufsize as usize) < PARAMS_DPTE {
        return Err(Int13Status::Invalid);
    }
    let reported = if (bufsize as usize) < PARAMS_DPI {
        PARAMS_DPTE
    } else {
        PARAMS_DPI
    };
    params[0..2].copy_from_slice(&(reported as u16).to_le_bytes());

    let len = len.min(bufsize as usize);
    bus.write_physical(table, &params[..len]);
    Ok(0)
}

/// Specification packet written by get-emulation-status.
const SPECIFICATION_LEN: usize = 19;

fn cdrom_status_terminate(
    dev: &mut Drive,
    regs: &RegisterFile,
    bus: &mut dyn MemoryBus,
) -> CallStatus {
    trace!(
        drive = dev.drive,
        terminate = regs.al() == 0,
        "get CD-ROM emulation status"
    );
    if !dev.is_cdrom() {
        debug!(drive = dev.drive, "not a CD-ROM");
        return Err(Int13Status::Invalid);
    }

    // No emulation is ever active, so the packet is all-zero apart from its
    // size and the drive number.
    let mut specification = [0u8; SPECIFICATION_LEN];
    specification[0] = SPECIFICATION_LEN as u8;
    specification[2] = dev.drive;
    bus.write_physical(regs.packet_ptr().linear(), &specification);
    Ok(0)
}

fn cdrom_read_boot_catalog(
    dev: &mut Drive,
    regs: &RegisterFile,
    bus: &mut dyn MemoryBus,
) -> CallStatus {
    let mut command = [0u8; 10];
    bus.read_physical(regs.packet_ptr().linear(), &mut command);
    let count = le_u16(&command[2..]);
    let buffer = le_u32(&command[4..]);
    let start = le_u16(&command[8..]);
    trace!(drive = dev.drive, count, buffer, start, "read boot catalog");

    let Some(boot_catalog) = dev.boot_catalog else {
        debug!(drive = dev.drive, "no boot catalog");
        return Err(Int13Status::Invalid);
    };
    let lba = (boot_catalog + start as u32) as u64;
    check_bounds(dev, lba, count as u64)?;

    let mut buf = vec![0u8; count as usize * dev.device.block_size()];
    transfer(dev, bus, lba, buffer as u64, &mut buf, false)?;
    Ok(0)
}
