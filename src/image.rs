//! ROM image assembly for the multi-bank EEPROM

mod assembler;
mod bank;
mod monolithic;

pub use assembler::{assemble, image_digest, swap16, ERASED_BYTE};
pub use bank::{load_fragment, Bank, BankChange, Fragment, RawFragment};
pub use monolithic::{build_full_image, BankSet};

/// The size of a single bank on the default device - 512 KiB
pub const DEFAULT_SLOT_SIZE: usize = 512 * 1024;

/// The number of independently programmable banks on the default device
pub const DEFAULT_BANK_COUNT: usize = 4;

/// Describes the layout of the target device
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Geometry {
    /// The capacity of a single bank, in bytes
    pub slot_size: usize,
    /// The number of banks on the device
    pub bank_count: usize,
}

impl Geometry {
    pub const fn new(slot_size: usize, bank_count: usize) -> Geometry {
        Geometry {
            slot_size,
            bank_count,
        }
    }

    /// Returns the size of the whole device, which is every bank laid out back to back
    pub const fn total_size(&self) -> usize {
        self.slot_size * self.bank_count
    }

    /// Returns the slot size in KiB, as used in file names and log messages
    pub const fn slot_size_kib(&self) -> usize {
        self.slot_size / 1024
    }
}

impl Default for Geometry {
    fn default() -> Geometry {
        Geometry::new(DEFAULT_SLOT_SIZE, DEFAULT_BANK_COUNT)
    }
}
