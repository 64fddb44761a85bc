//! Guest physical memory access for the INT 13 emulation core.
//!
//! The disk-service emulator reads and writes caller-supplied memory regions
//! (disk address packets, transfer buffers, the BIOS Data Area) through this
//! bus abstraction rather than touching host memory directly, so it can sit on
//! top of whatever memory model the surrounding firmware provides.

mod bus;
mod dense;

pub use bus::MemoryBus;
pub use dense::DenseMemory;

/// Real-mode segment:offset pair.
///
/// On the wire (disk address packets, parameter tables) the offset is stored
/// before the segment; [`SegOff::to_wire`]/[`SegOff::from_wire`] follow that
/// layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegOff {
    pub segment: u16,
    pub offset: u16,
}

impl SegOff {
    pub const fn new(segment: u16, offset: u16) -> Self {
        Self { segment, offset }
    }

    /// 20-bit linear address of this pointer.
    pub const fn linear(self) -> u64 {
        ((self.segment as u64) << 4) + (self.offset as u64)
    }

    pub fn from_wire(bytes: [u8; 4]) -> Self {
        Self {
            offset: u16::from_le_bytes([bytes[0], bytes[1]]),
            segment: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    pub fn to_wire(self) -> [u8; 4] {
        let [ol, oh] = self.offset.to_le_bytes();
        let [sl, sh] = self.segment.to_le_bytes();
        [ol, oh, sl, sh]
    }
}
