use guest_memory::SegOff;

/// The register file of one emulated interrupt call.
///
/// The real hardware interface passes parameters and results in 16-bit
/// registers plus a carry flag; this struct is the structured stand-in the
/// surrounding firmware fills in before calling [`crate::Int13::interrupt`]
/// and reads back afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterFile {
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub dx: u16,
    pub si: u16,
    pub di: u16,
    pub ds: u16,
    pub es: u16,
    /// Carry flag: set on error, cleared on success.
    pub carry: bool,
}

macro_rules! byte_accessors {
    ($hi:ident, $set_hi:ident, $lo:ident, $set_lo:ident, $reg:ident) => {
        pub fn $hi(&self) -> u8 {
            (self.$reg >> 8) as u8
        }

        pub fn $set_hi(&mut self, val: u8) {
            self.$reg = (self.$reg & 0x00FF) | ((val as u16) << 8);
        }

        pub fn $lo(&self) -> u8 {
            self.$reg as u8
        }

        pub fn $set_lo(&mut self, val: u8) {
            self.$reg = (self.$reg & 0xFF00) | (val as u16);
        }
    };
}

impl RegisterFile {
    byte_accessors!(ah, set_ah, al, set_al, ax);
    byte_accessors!(bh, set_bh, bl, set_bl, bx);
    byte_accessors!(ch, set_ch, cl, set_cl, cx);
    byte_accessors!(dh, set_dh, dl, set_dl, dx);

    /// Caller packet pointer (DS:SI), used by the extended calls.
    pub fn packet_ptr(&self) -> SegOff {
        SegOff::new(self.ds, self.si)
    }

    /// Legacy transfer buffer (ES:BX).
    pub fn buffer_ptr(&self) -> SegOff {
        SegOff::new(self.es, self.bx)
    }
}
