use std::fmt;

use super::assembler::ERASED_BYTE;
use super::bank::{Bank, BankChange};
use super::Geometry;
use crate::Error;

/// Concatenates the slot image of every bank into a single image of `total_size` bytes
///
/// The result is padded with erased bytes if the banks come up short, and truncated if they
/// produce more than `total_size` bytes.
pub fn build_full_image(banks: &[Bank], total_size: usize) -> Vec<u8> {
    let mut image = Vec::with_capacity(total_size);

    for bank in banks {
        image.extend_from_slice(&bank.build_image());
    }

    image.resize(total_size, ERASED_BYTE);

    image
}

/// Every bank of the device
pub struct BankSet {
    geometry: Geometry,
    banks: Vec<Bank>,
}

impl fmt::Debug for BankSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankSet")
            .field("geometry", &self.geometry)
            .field("banks", &self.banks)
            .finish()
    }
}

impl BankSet {
    /// Creates an empty bank for every bank described by `geometry`
    pub fn new(geometry: Geometry) -> BankSet {
        let banks = (0..geometry.bank_count)
            .map(|index| Bank::new(index, geometry.slot_size))
            .collect();

        BankSet { geometry, banks }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn bank(&self, index: usize) -> Result<&Bank, Error> {
        let count = self.banks.len();

        self.banks
            .get(index)
            .ok_or(Error::InvalidBank { bank: index, count })
    }

    pub fn bank_mut(&mut self, index: usize) -> Result<&mut Bank, Error> {
        let count = self.banks.len();

        self.banks
            .get_mut(index)
            .ok_or(Error::InvalidBank { bank: index, count })
    }

    /// Installs the same change observer on every bank
    pub fn set_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&BankChange) + Clone + Send + 'static,
    {
        for bank in &mut self.banks {
            bank.set_observer(observer.clone());
        }
    }

    /// Builds the image for the whole device
    pub fn build_full_image(&self) -> Vec<u8> {
        build_full_image(&self.banks, self.geometry.total_size())
    }
}
