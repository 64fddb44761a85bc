//! BIOS INT 13 disk-service emulation over generic block devices.
//!
//! This crate lets an operating system loader that only speaks the legacy
//! INT 13 calling convention boot from and operate on an arbitrary block
//! device (network-attached, protocol-attached, in-memory). It implements the
//! full command-dispatch state machine: legacy cylinder/head/sector and
//! extended 64-bit LBA addressing, drive-number virtualization with natural
//! number redirection, boot-sector and El Torito bootstrapping, geometry
//! inference, and export of boot firmware description tables for the booted
//! operating system.
//!
//! The actual storage transport is out of scope: callers supply a
//! [`BlockDevice`] per emulated drive, plus small collaborator traits for the
//! interrupt vector ([`InterruptVector`]), control transfer ([`BootTransfer`]),
//! hardware identification ([`DeviceIdentifier`]) and description-table
//! construction ([`TableProvider`]).

mod blockdev;
mod boot;
mod describe;
mod dispatch;
mod drive;
mod edd;
mod eltorito;
mod geometry;
mod regs;
mod registry;
mod status;

pub use blockdev::{BlockDevice, DiskError, RamDisk, BLKSIZE, ISO_BLKSIZE};
pub use boot::{BootConfig, BootError, BootTransfer};
pub use describe::{DescribeError, TableArena, TableProvider, TABLE_ALIGN, TABLE_CAPACITY};
pub use drive::Drive;
pub use edd::{DeviceIdentifier, DevicePath, HostBusLocation, IdentifyError};
pub use geometry::Geometry;
pub use regs::RegisterFile;
pub use registry::{
    HookError, HookRequest, Int13, Int13Config, InterruptVector, NullVector, NATURAL_DRIVE,
};
pub use status::Int13Status;

pub use guest_memory::{DenseMemory, MemoryBus, SegOff};
