//! El Torito bootable CD-ROM support: boot record probing and boot catalog
//! parsing.

use tracing::debug;

use crate::blockdev::{BlockDevice, DiskError};

/// LBA of the boot record volume descriptor on an ISO9660 volume.
const BOOT_RECORD_LBA: u64 = 17;

/// Fixed prefix of a boot record volume descriptor carrying an El Torito
/// boot catalog: descriptor type 0 (boot record), standard identifier,
/// version 1, then the El Torito system identifier NUL-padded to 32 bytes.
const BOOT_RECORD_PREFIX: [u8; 39] = {
    let mut prefix = [0u8; 39];
    prefix[1] = b'C';
    prefix[2] = b'D';
    prefix[3] = b'0';
    prefix[4] = b'0';
    prefix[5] = b'1';
    prefix[6] = 1;
    let id = b"EL TORITO SPECIFICATION";
    let mut i = 0;
    while i < id.len() {
        prefix[7 + i] = id[i];
        i += 1;
    }
    prefix
};

/// Offset of the boot catalog LBA within the boot record volume descriptor.
const BOOT_CATALOG_OFFSET: usize = 0x47;

/// Probe an optical medium for an El Torito boot catalog. Returns the boot
/// catalog LBA if one is present.
pub(crate) fn probe(drive: u8, device: &mut dyn BlockDevice) -> Result<Option<u32>, DiskError> {
    let mut block = vec![0u8; device.block_size()];
    device.read(BOOT_RECORD_LBA, &mut block)?;

    if block[..BOOT_RECORD_PREFIX.len()] != BOOT_RECORD_PREFIX {
        debug!(drive, "no boot catalog");
        return Ok(None);
    }
    let catalog = u32::from_le_bytes([
        block[BOOT_CATALOG_OFFSET],
        block[BOOT_CATALOG_OFFSET + 1],
        block[BOOT_CATALOG_OFFSET + 2],
        block[BOOT_CATALOG_OFFSET + 3],
    ]);
    debug!(drive, catalog, "found boot catalog");
    Ok(Some(catalog))
}

/// Platform identifier for 80x86 images in the catalog validation entry.
pub(crate) const PLATFORM_X86: u8 = 0x00;
/// Boot indicator for a bootable initial/default entry.
pub(crate) const BOOTABLE: u8 = 0x88;
/// Media type for no-emulation boot images.
pub(crate) const NO_EMULATION: u8 = 0x00;

/// The fields of the catalog validation entry and the initial/default boot
/// entry that the bootstrap path cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CatalogHead {
    pub platform_id: u8,
    pub indicator: u8,
    pub media_type: u8,
    pub load_segment: u16,
    /// Virtual/load sector count, in emulated 512-byte sectors.
    pub length: u16,
    /// Boot image start LBA.
    pub start: u32,
}

impl CatalogHead {
    /// Parse the validation entry (bytes 0..32) and initial/default boot
    /// entry (bytes 32..64) at the head of the boot catalog.
    pub fn parse(catalog: &[u8]) -> Self {
        let boot = &catalog[32..64];
        Self {
            platform_id: catalog[1],
            indicator: boot[0],
            media_type: boot[1],
            load_segment: u16::from_le_bytes([boot[2], boot[3]]),
            length: u16::from_le_bytes([boot[6], boot[7]]),
            start: u32::from_le_bytes([boot[8], boot[9], boot[10], boot[11]]),
        }
    }
}
