//! Enhanced Disk Drive device path information.
//!
//! The get-extended-parameters call can append a device path information
//! record describing the physical location of the drive, so the booted
//! operating system can find the hardware again without firmware help. The
//! emulation core has no idea what hardware backs a drive; a
//! [`DeviceIdentifier`] collaborator supplies that.

use thiserror::Error;

/// Key marking a valid device path information record.
const EDD_KEY: u16 = 0xBEDD;

/// Encoded length of a device path information record.
pub(crate) const DEVICE_PATH_INFO_LEN: usize = 44;

/// Physical location of the host bus adapter behind a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostBusLocation {
    Pci { bus: u8, slot: u8, function: u8 },
}

/// Hardware description of one drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePath {
    pub bus: HostBusLocation,
    /// Interface type name, space-padded ASCII (e.g. `b"SCSI    "`).
    pub interface_type: [u8; 8],
    /// Interface-specific device path.
    pub device_path: [u8; 16],
}

/// Errors from [`DeviceIdentifier::identify`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyError {
    #[error("no hardware device found for drive")]
    NotFound,

    #[error("host bus type cannot be described")]
    UnsupportedBus,
}

/// Maps a drive number to the hardware behind it.
pub trait DeviceIdentifier {
    fn identify(&mut self, drive: u8) -> Result<DevicePath, IdentifyError>;
}

/// Encode a device path information record. The checksum byte makes the
/// whole record sum to zero.
pub(crate) fn encode_device_path_info(path: &DevicePath) -> [u8; DEVICE_PATH_INFO_LEN] {
    let mut out = [0u8; DEVICE_PATH_INFO_LEN];
    out[0..2].copy_from_slice(&EDD_KEY.to_le_bytes());
    out[2] = DEVICE_PATH_INFO_LEN as u8;
    out[10..18].copy_from_slice(&path.interface_type);
    match path.bus {
        HostBusLocation::Pci { bus, slot, function } => {
            out[6..10].copy_from_slice(b"PCI ");
            out[18] = bus;
            out[19] = slot;
            out[20] = function;
            out[21] = 0xFF; // channel: unused
        }
    }
    out[26..42].copy_from_slice(&path.device_path);
    let sum = out.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    out[43] = sum.wrapping_neg();
    out
}
