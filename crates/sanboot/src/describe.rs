//! Device description export: boot firmware tables describing the emulated
//! drives, left behind for the booted operating system.
//!
//! Tables use the standard description header layout (signature, length,
//! revision, checksum, OEM identifiers) and are packed into a single
//! fixed-size arena that the surrounding firmware publishes to the guest.

use thiserror::Error;
use tracing::debug;

use crate::drive::Drive;
use crate::registry::Int13;

/// Total space available for description tables.
pub const TABLE_CAPACITY: usize = 768;

/// Alignment of each installed table within the arena.
pub const TABLE_ALIGN: usize = 16;

/// Length of the common description header.
const HEADER_LEN: usize = 36;

const OEM_ID: &[u8; 6] = b"SANBT\0";
const OEM_TABLE_ID: &[u8; 8] = b"sanboot\0";

/// Errors from [`Int13::describe`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescribeError {
    #[error("out of table space for {signature}")]
    NoSpace { signature: String },

    #[error("table shorter than its description header")]
    Truncated,
}

/// Builds the description table for one drive. Returning `None` means the
/// drive has nothing to describe.
pub trait TableProvider {
    fn table_for(&mut self, drive: &Drive) -> Option<Vec<u8>>;
}

/// Fixed-size arena holding the installed description tables.
#[derive(Debug)]
pub struct TableArena {
    tables: Box<[u8; TABLE_CAPACITY]>,
    used: usize,
}

impl TableArena {
    pub fn new() -> Self {
        Self { tables: Box::new([0u8; TABLE_CAPACITY]), used: 0 }
    }

    pub fn clear(&mut self) {
        self.tables.fill(0);
        self.used = 0;
    }

    /// Raw arena contents, for publication to the guest.
    pub fn bytes(&self) -> &[u8] {
        &self.tables[..]
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Install one table: copy it in, stamp the OEM identifiers, and fix the
    /// checksum so the table sums to zero.
    pub fn install(&mut self, table: &[u8]) -> Result<(), DescribeError> {
        if table.len() < HEADER_LEN {
            return Err(DescribeError::Truncated);
        }
        let len = table.len();
        if len > TABLE_CAPACITY - self.used {
            return Err(DescribeError::NoSpace {
                signature: String::from_utf8_lossy(&table[0..4]).into_owned(),
            });
        }

        let installed = &mut self.tables[self.used..self.used + len];
        installed.copy_from_slice(table);
        installed[10..16].copy_from_slice(OEM_ID);
        installed[16..24].copy_from_slice(OEM_TABLE_ID);

        installed[9] = 0;
        let sum = installed.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        installed[9] = sum.wrapping_neg();

        debug!(
            signature = %String::from_utf8_lossy(&table[0..4]),
            len,
            offset = self.used,
            "installed description table"
        );
        self.used = (self.used + len + TABLE_ALIGN - 1) & !(TABLE_ALIGN - 1);
        Ok(())
    }
}

impl Default for TableArena {
    fn default() -> Self {
        Self::new()
    }
}

impl Int13 {
    /// Rebuild the description tables for every registered drive.
    ///
    /// A drive whose table does not fit is skipped rather than aborting the
    /// pass; the first failure is reported after all drives have been
    /// offered.
    pub fn describe(&mut self, provider: &mut dyn TableProvider) -> Result<(), DescribeError> {
        self.arena.clear();
        let mut first_error = None;
        for drive in self.drives.values() {
            let Some(table) = provider.table_for(drive) else {
                continue;
            };
            if let Err(err) = self.arena.install(&table) {
                debug!(drive = drive.drive, %err, "could not install description table");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The installed description tables.
    pub fn tables(&self) -> &TableArena {
        &self.arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(signature: &[u8; 4], len: usize) -> Vec<u8> {
        let mut t = vec![0u8; len];
        t[0..4].copy_from_slice(signature);
        t[4..8].copy_from_slice(&(len as u32).to_le_bytes());
        t
    }

    #[test]
    fn installed_tables_sum_to_zero() {
        let mut arena = TableArena::new();
        arena.install(&table(b"TEST", 64)).unwrap();
        let installed = &arena.bytes()[..64];
        let sum = installed.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(sum, 0);
        assert_eq!(&installed[10..16], OEM_ID);
        assert_eq!(&installed[16..24], OEM_TABLE_ID);
    }

    #[test]
    fn tables_are_aligned() {
        let mut arena = TableArena::new();
        arena.install(&table(b"AAAA", 37)).unwrap();
        assert_eq!(arena.used(), 48);
        arena.install(&table(b"BBBB", 36)).unwrap();
        assert_eq!(&arena.bytes()[48..52], b"BBBB");
    }

    #[test]
    fn arena_rejects_oversized_tables() {
        let mut arena = TableArena::new();
        arena.install(&table(b"AAAA", 512)).unwrap();
        assert!(matches!(
            arena.install(&table(b"BBBB", 512)),
            Err(DescribeError::NoSpace { .. })
        ));
    }

    #[test]
    fn arena_rejects_headerless_tables() {
        let mut arena = TableArena::new();
        assert_eq!(arena.install(&[0u8; 16]), Err(DescribeError::Truncated));
    }
}
