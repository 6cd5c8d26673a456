use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};

use super::assembler::{assemble, swap16};
use crate::Error;

/// The file extension of images that are stored with swapped 16-bit words
const SWAPPED_EXTENSION: &str = "rom";

/// A binary chunk that has been added to a bank
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Fragment {
    name: String,
    bytes: Vec<u8>,
    byte_swapped: bool,
}

impl Fragment {
    /// The name the fragment was added under, usually the file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bytes as they will be laid out in the bank, after any byte-order correction
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether `swap16` was applied when the fragment was added
    pub fn is_byte_swapped(&self) -> bool {
        self.byte_swapped
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;

        if self.byte_swapped {
            write!(f, " [swap16]")?;
        }

        write!(f, " ({} KiB)", self.bytes.len() / 1024)
    }
}

/// A fragment read from disk that has not been added to a bank yet
#[derive(Debug, Clone)]
pub struct RawFragment {
    pub name: String,
    pub bytes: Vec<u8>,
    pub needs_swap: bool,
}

/// Reads the file at `path` as a fragment
///
/// Files with a `.rom` extension (in any case) are flagged as needing a byte swap.
pub fn load_fragment<P: AsRef<Path>>(path: P) -> io::Result<RawFragment> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let needs_swap = path
        .extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(SWAPPED_EXTENSION))
        .unwrap_or(false);

    debug!(
        "Read {} bytes from {} (swap16: {})",
        bytes.len(),
        path.display(),
        needs_swap
    );

    Ok(RawFragment {
        name,
        bytes,
        needs_swap,
    })
}

/// The state of a bank after it was changed, sent to the bank's observer
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BankChange {
    /// The index of the bank that changed
    pub bank: usize,
    /// The size of every fragment in the bank, in order
    pub fragments: Vec<usize>,
}

type Observer = Box<dyn FnMut(&BankChange) + Send>;

/// One bank of the device and the fragments that make up its image
pub struct Bank {
    index: usize,
    slot_size: usize,
    fragments: Vec<Fragment>,
    observer: Option<Observer>,
}

impl fmt::Debug for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bank")
            .field("index", &self.index)
            .field("slot_size", &self.slot_size)
            .field("fragments", &self.fragments)
            .finish()
    }
}

impl Bank {
    pub fn new(index: usize, slot_size: usize) -> Bank {
        Bank {
            index,
            slot_size,
            fragments: Vec::new(),
            observer: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Sets the callback that is invoked after every change to the fragment list
    pub fn set_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&BankChange) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    /// Appends a fragment to the bank and returns the number of bytes now in use
    ///
    /// When `needs_swap` is set, the bytes are passed through `swap16` before they are stored.
    /// Returns `Error::CapacityExceeded` and leaves the bank untouched if the fragment does not
    /// fit in the remaining space.
    pub fn add_fragment<S: Into<String>>(
        &mut self,
        name: S,
        bytes: &[u8],
        needs_swap: bool,
    ) -> Result<usize, Error> {
        let name = name.into();
        let available = self.free_bytes();

        if bytes.len() > self.slot_size {
            return Err(Error::CapacityExceeded {
                bank: self.index,
                name,
                size: bytes.len(),
                available,
            });
        }

        let bytes = if needs_swap {
            swap16(bytes)
        } else {
            bytes.to_vec()
        };

        if bytes.len() > available {
            return Err(Error::CapacityExceeded {
                bank: self.index,
                name,
                size: bytes.len(),
                available,
            });
        }

        let fragment = Fragment {
            name,
            bytes,
            byte_swapped: needs_swap,
        };

        info!("Added to Slot {}: {}", self.index, fragment);

        self.fragments.push(fragment);
        self.notify();

        Ok(self.used_bytes())
    }

    /// Adds a fragment that was read with `load_fragment`
    pub fn add_raw(&mut self, raw: &RawFragment) -> Result<usize, Error> {
        self.add_fragment(raw.name.as_str(), &raw.bytes, raw.needs_swap)
    }

    /// Removes the fragment at `index` and returns its name
    pub fn remove_fragment(&mut self, index: usize) -> Result<String, Error> {
        if index >= self.fragments.len() {
            return Err(Error::IndexOutOfRange {
                bank: self.index,
                index,
                len: self.fragments.len(),
            });
        }

        let fragment = self.fragments.remove(index);

        info!("Removed from Slot {}: {}", self.index, fragment.name);

        self.notify();

        Ok(fragment.name)
    }

    /// Removes every fragment from the bank
    pub fn clear(&mut self) {
        self.fragments.clear();

        info!("Cleared Slot {}", self.index);

        self.notify();
    }

    pub fn used_bytes(&self) -> usize {
        self.fragments.iter().map(Fragment::len).sum()
    }

    pub fn free_bytes(&self) -> usize {
        self.slot_size.saturating_sub(self.used_bytes())
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Builds the slot image for this bank
    pub fn build_image(&self) -> Vec<u8> {
        let parts: Vec<&[u8]> = self.fragments.iter().map(Fragment::bytes).collect();

        assemble(&parts, self.slot_size)
    }

    fn notify(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            let change = BankChange {
                bank: self.index,
                fragments: self.fragments.iter().map(Fragment::len).collect(),
            };

            observer(&change);
        }
    }
}
