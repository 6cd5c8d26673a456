use byteorder::{BigEndian, ByteOrder, LittleEndian};
use sha2::{Digest, Sha256};

/// The value of an erased flash cell - an empty slot is filled with this
pub const ERASED_BYTE: u8 = 0xFF;

/// Builds a slot image of exactly `slot_size` bytes from the given `fragments`
///
/// The fragments are concatenated in order. An empty concatenation yields an erased slot, a
/// concatenation that is too large is truncated, and one that is too small is tiled - repeated
/// as many times as it fits, followed by as much of its head as is needed to fill the slot.
///
/// # Examples
///
/// ```
/// let image = mxrom::image::assemble(&[[0x01u8, 0x02, 0x03]], 8);
///
/// assert_eq!(image, [0x01, 0x02, 0x03, 0x01, 0x02, 0x03, 0x01, 0x02]);
/// ```
pub fn assemble<F: AsRef<[u8]>>(fragments: &[F], slot_size: usize) -> Vec<u8> {
    let base: Vec<u8> = fragments
        .iter()
        .flat_map(|fragment| fragment.as_ref().iter().copied())
        .collect();

    if base.is_empty() {
        return vec![ERASED_BYTE; slot_size];
    }

    if base.len() >= slot_size {
        let mut base = base;
        base.truncate(slot_size);

        return base;
    }

    let repeats = slot_size / base.len();
    let remainder = slot_size % base.len();

    let mut image = Vec::with_capacity(slot_size);

    for _ in 0..repeats {
        image.extend_from_slice(&base);
    }

    image.extend_from_slice(&base[..remainder]);

    image
}

/// Swaps the bytes of every 16-bit word in `bytes`
///
/// Odd-length input is padded with a single `0xFF` before swapping, so the result always has
/// an even length.
pub fn swap16(bytes: &[u8]) -> Vec<u8> {
    let mut padded = bytes.to_vec();

    if padded.len() % 2 != 0 {
        padded.push(ERASED_BYTE);
    }

    let mut words = vec![0u16; padded.len() / 2];
    LittleEndian::read_u16_into(&padded, &mut words);

    let mut swapped = vec![0u8; padded.len()];
    BigEndian::write_u16_into(&words, &mut swapped);

    swapped
}

/// Returns the lower-case hex SHA-256 digest of `image`
pub fn image_digest(image: &[u8]) -> String {
    format!("{:x}", Sha256::digest(image))
}
