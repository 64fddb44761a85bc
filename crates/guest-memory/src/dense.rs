use crate::MemoryBus;

/// Flat `Vec<u8>`-backed guest memory.
///
/// Accesses beyond the configured size behave like an open bus: reads return
/// 0xFF and writes are dropped. That keeps callers (and tests) from having to
/// special-case the tail of the address space.
pub struct DenseMemory {
    data: Vec<u8>,
}

impl DenseMemory {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn read_bytes(&mut self, paddr: u64, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        self.read_physical(paddr, &mut out);
        out
    }
}

impl MemoryBus for DenseMemory {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]) {
        for (i, slot) in buf.iter_mut().enumerate() {
            let addr = paddr.wrapping_add(i as u64);
            *slot = match usize::try_from(addr) {
                Ok(idx) if idx < self.data.len() => self.data[idx],
                _ => 0xFF,
            };
        }
    }

    fn write_physical(&mut self, paddr: u64, buf: &[u8]) {
        for (i, byte) in buf.iter().copied().enumerate() {
            let addr = paddr.wrapping_add(i as u64);
            if let Ok(idx) = usize::try_from(addr) {
                if idx < self.data.len() {
                    self.data[idx] = byte;
                }
            }
        }
    }
}
