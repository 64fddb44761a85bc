#![allow(dead_code)]

use sanboot::{
    BlockDevice, DenseMemory, DiskError, HookRequest, Int13, NullVector, RamDisk, BLKSIZE,
    ISO_BLKSIZE,
};

pub fn mem() -> DenseMemory {
    DenseMemory::new(0x100000)
}

/// Disk whose every block starts with its own LBA, so reads identify which
/// block the emulation actually fetched.
pub fn tagged_disk(blocks: u64) -> RamDisk {
    let mut data = vec![0u8; blocks as usize * BLKSIZE];
    for lba in 0..blocks as usize {
        data[lba * BLKSIZE..lba * BLKSIZE + 8].copy_from_slice(&(lba as u64).to_le_bytes());
    }
    RamDisk::new(data, BLKSIZE)
}

pub fn hook_hdd(
    core: &mut Int13,
    bus: &mut DenseMemory,
    blocks: u64,
    (cylinders, heads, sectors_per_track): (u32, u32, u32),
) -> u8 {
    let request = HookRequest { drive: 0x80, cylinders, heads, sectors_per_track };
    core.hook(request, Box::new(tagged_disk(blocks)), bus, &mut NullVector)
        .unwrap()
}

/// ISO image with an El Torito boot record at LBA 17, a boot catalog at LBA
/// 19 and a boot image at LBA 20 starting with the bytes `BOOT`. `sectors`
/// is the catalog's load count, sized here in device blocks.
pub fn bootable_iso(sectors: u16, load_segment: u16) -> RamDisk {
    let catalog_lba = 19u32;
    let image_lba = 20u32;
    let blocks = image_lba as usize + 1 + sectors as usize;
    let mut data = vec![0u8; blocks * ISO_BLKSIZE];

    let record = 17 * ISO_BLKSIZE;
    data[record] = 0; // boot record descriptor
    data[record + 1..record + 6].copy_from_slice(b"CD001");
    data[record + 6] = 1;
    data[record + 7..record + 30].copy_from_slice(b"EL TORITO SPECIFICATION");
    data[record + 0x47..record + 0x4B].copy_from_slice(&catalog_lba.to_le_bytes());

    let catalog = catalog_lba as usize * ISO_BLKSIZE;
    data[catalog] = 0x01; // validation header
    data[catalog + 1] = 0x00; // platform: 80x86
    let boot = catalog + 32;
    data[boot] = 0x88; // bootable
    data[boot + 1] = 0x00; // no emulation
    data[boot + 2..boot + 4].copy_from_slice(&load_segment.to_le_bytes());
    data[boot + 6..boot + 8].copy_from_slice(&sectors.to_le_bytes());
    data[boot + 8..boot + 12].copy_from_slice(&image_lba.to_le_bytes());

    let image = image_lba as usize * ISO_BLKSIZE;
    data[image..image + 4].copy_from_slice(b"BOOT");

    RamDisk::new(data, ISO_BLKSIZE)
}

pub fn hook_cdrom(core: &mut Int13, bus: &mut DenseMemory, iso: RamDisk) -> u8 {
    core.hook(HookRequest::new(0xE0), Box::new(iso), bus, &mut NullVector)
        .unwrap()
}

/// Device that fails every transfer except the block-0 read used for
/// geometry probing at hook time, for error-path tests.
pub struct FailingDisk {
    pub blocks: u64,
}

impl BlockDevice for FailingDisk {
    fn read(&mut self, lba: u64, buf: &mut [u8]) -> Result<(), DiskError> {
        if lba == 0 {
            buf.fill(0);
            return Ok(());
        }
        Err(DiskError::Io("injected failure".into()))
    }

    fn write(&mut self, _lba: u64, _buf: &[u8]) -> Result<(), DiskError> {
        Err(DiskError::Io("injected failure".into()))
    }

    fn reset(&mut self) -> Result<(), DiskError> {
        Err(DiskError::ResetFailed("injected failure".into()))
    }

    fn capacity(&self) -> u64 {
        self.blocks
    }

    fn block_size(&self) -> usize {
        BLKSIZE
    }
}
