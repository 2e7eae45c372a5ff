//! encode and decode fixed-slot on-disk records
use serde::{de::DeserializeOwned, Serialize};

use crate::fs::{FsError, Result};

/// A record stored in a fixed-size slot of the image.
pub trait OnDiskRecord: Sized {
    /// size in bytes of the slot holding one record
    const SLOT_SIZE: usize;

    /// encode into `slot`, which is exactly [Self::SLOT_SIZE] long
    /// # Returns
    /// The number of bytes written if successful
    fn encode_into(&self, slot: &mut [u8]) -> Result<usize>;

    /// decode from `slot`, which is exactly [Self::SLOT_SIZE] long
    fn decode_from(slot: &[u8]) -> Result<Self>;
}

/// serialize `value` into `slot` with bincode's legacy configuration
/// (fixed-width little-endian integers)
pub fn encode_record<T: Serialize>(value: &T, slot: &mut [u8]) -> Result<usize> {
    let config = bincode::config::legacy();
    bincode::serde::encode_into_slice(value, slot, config)
        .map_err(|e| FsError::Codec(e.to_string()))
}

/// deserialize a value from the beginning of `slot`
pub fn decode_record<T: DeserializeOwned>(slot: &[u8]) -> Result<T> {
    let config = bincode::config::legacy();
    let (value, _bytes_read): (T, usize) = bincode::serde::decode_from_slice(slot, config)
        .map_err(|e| FsError::Codec(e.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Pair {
        a: u32,
        b: u64,
    }

    #[test]
    fn test_fixed_width_little_endian() -> anyhow::Result<()> {
        let mut slot = [0xffu8; 16];
        let written = encode_record(&Pair { a: 1, b: 2 }, &mut slot)?;
        assert_eq!(written, 12);
        assert_eq!(&slot[..12], &[1, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0]);
        // bytes past the record are left alone
        assert_eq!(&slot[12..], &[0xff; 4]);
        assert_eq!(decode_record::<Pair>(&slot)?, Pair { a: 1, b: 2 });
        Ok(())
    }

    #[test]
    fn test_slot_too_small() {
        let mut slot = [0u8; 8];
        assert!(matches!(
            encode_record(&Pair { a: 1, b: 2 }, &mut slot),
            Err(FsError::Codec(_))
        ));
        assert!(matches!(
            decode_record::<Pair>(&slot[..4]),
            Err(FsError::Codec(_))
        ));
    }
}
