//! Bijective mapping between a `u32` identifier and a 32-dimension record.
//!
//! Bit `i` of the identifier selects the value stored in dimension `i`:
//! [`ONE`] when the bit is set, [`ZERO`] otherwise. The key is the identifier
//! packed big-endian, so key order matches numeric order.

use bytes::Bytes;
use thiserror::Error;

/// Number of secondary dimensions, one per identifier bit.
pub const DIMENSIONS: usize = u32::BITS as usize;
/// Width of an encoded key in bytes.
pub const KEY_LEN: usize = std::mem::size_of::<u32>();

/// Attribute value for a set bit.
pub const ONE: &[u8] = b"one";
/// Attribute value for a clear bit.
pub const ZERO: &[u8] = b"zero";

/// A record as written to the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: u32,
    pub key: Bytes,
    pub attributes: [Bytes; DIMENSIONS],
}

/// One exact-match constraint: `dimension == value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchTerm {
    pub dimension: usize,
    pub value: Bytes,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} attributes, got {actual}")]
    Arity { expected: usize, actual: usize },
    #[error("dimension {dimension} holds 0x{value}, which is neither sentinel")]
    Sentinel { dimension: usize, value: String },
    #[error("expected a {expected}-byte key, got {actual} bytes")]
    KeyWidth { expected: usize, actual: usize },
}

/// Sentinel for a bit. Both sentinels are static, so no record owns a copy.
fn sentinel(set: bool) -> Bytes {
    Bytes::from_static(if set { ONE } else { ZERO })
}

pub fn encode_key(id: u32) -> Bytes {
    Bytes::copy_from_slice(&id.to_be_bytes())
}

pub fn encode(id: u32) -> Record {
    Record {
        id,
        key: encode_key(id),
        attributes: std::array::from_fn(|bit| sentinel((id >> bit) & 1 == 1)),
    }
}

impl Record {
    /// Search terms pinning every dimension to this record's value.
    pub fn search_terms(&self) -> Vec<SearchTerm> {
        self.attributes
            .iter()
            .enumerate()
            .map(|(dimension, value)| SearchTerm {
                dimension,
                value: value.clone(),
            })
            .collect()
    }
}

pub fn decode_key(key: &[u8]) -> Result<u32, DecodeError> {
    let bytes: [u8; KEY_LEN] = key.try_into().map_err(|_| DecodeError::KeyWidth {
        expected: KEY_LEN,
        actual: key.len(),
    })?;
    Ok(u32::from_be_bytes(bytes))
}

pub fn decode_attributes(attributes: &[Bytes]) -> Result<u32, DecodeError> {
    if attributes.len() != DIMENSIONS {
        return Err(DecodeError::Arity {
            expected: DIMENSIONS,
            actual: attributes.len(),
        });
    }
    attributes
        .iter()
        .enumerate()
        .try_fold(0u32, |id, (dimension, value)| {
            if value.as_ref() == ONE {
                Ok(id | (1 << dimension))
            } else if value.as_ref() == ZERO {
                Ok(id)
            } else {
                Err(DecodeError::Sentinel {
                    dimension,
                    value: hex::encode(value),
                })
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_encodes_to_all_zero_sentinels() {
        let record = encode(0);
        assert_eq!(record.key.as_ref(), &[0, 0, 0, 0]);
        assert!(record.attributes.iter().all(|v| v.as_ref() == ZERO));
    }

    #[test]
    fn key_is_big_endian() {
        assert_eq!(encode_key(1).as_ref(), &[0, 0, 0, 1]);
        assert_eq!(encode_key(0x0102_0304).as_ref(), &[1, 2, 3, 4]);
        assert_eq!(decode_key(&[0xff, 0xff, 0xff, 0xff]), Ok(u32::MAX));
    }

    #[test]
    fn attribute_i_tracks_bit_i() {
        let record = encode(0b1010);
        assert_eq!(record.attributes[0].as_ref(), ZERO);
        assert_eq!(record.attributes[1].as_ref(), ONE);
        assert_eq!(record.attributes[2].as_ref(), ZERO);
        assert_eq!(record.attributes[3].as_ref(), ONE);
        assert!(record.attributes[4..].iter().all(|v| v.as_ref() == ZERO));

        let top = encode(1 << 31);
        assert_eq!(top.attributes[31].as_ref(), ONE);
    }

    #[test]
    fn edge_values_round_trip() {
        for id in [0, 1, 2, 3, 0x8000_0000, u32::MAX - 1, u32::MAX] {
            let record = encode(id);
            assert_eq!(record.attributes.len(), DIMENSIONS);
            assert_eq!(decode_attributes(&record.attributes), Ok(id));
            assert_eq!(decode_key(&record.key), Ok(id));
        }
    }

    #[test]
    fn first_four_ids_differ_only_in_low_bits() {
        let records = (0..4).map(encode).collect::<Vec<_>>();
        for record in &records {
            for other in &records {
                let differing = record
                    .attributes
                    .iter()
                    .zip(other.attributes.iter())
                    .enumerate()
                    .filter(|(_, (a, b))| a != b)
                    .map(|(dimension, _)| dimension)
                    .collect::<Vec<_>>();
                assert!(differing.iter().all(|d| *d < 2), "{differing:?}");
                assert_eq!(differing.is_empty(), record.id == other.id);
            }
        }
    }

    #[test]
    fn distinct_ids_have_distinct_vectors() {
        let mut seen = std::collections::HashSet::new();
        for id in 0..4096u32 {
            assert!(seen.insert(encode(id).attributes.to_vec()), "collision at {id}");
        }
    }

    #[test]
    fn search_terms_mirror_attributes() {
        let record = encode(0xdead_beef);
        let terms = record.search_terms();
        assert_eq!(terms.len(), DIMENSIONS);
        for (i, term) in terms.iter().enumerate() {
            assert_eq!(term.dimension, i);
            assert_eq!(term.value, record.attributes[i]);
        }
    }

    #[test]
    fn decode_rejects_malformed_input() {
        let record = encode(5);
        assert_eq!(
            decode_attributes(&record.attributes[..31]),
            Err(DecodeError::Arity {
                expected: 32,
                actual: 31
            })
        );

        let mut attributes = record.attributes.clone();
        attributes[7] = Bytes::from_static(b"two");
        assert!(matches!(
            decode_attributes(&attributes),
            Err(DecodeError::Sentinel { dimension: 7, .. })
        ));

        assert_eq!(
            decode_key(&[1, 2, 3]),
            Err(DecodeError::KeyWidth {
                expected: 4,
                actual: 3
            })
        );
    }

    proptest! {
        #[test]
        fn encode_decode_round_trip(id in any::<u32>()) {
            let record = encode(id);
            prop_assert_eq!(record.attributes.len(), DIMENSIONS);
            prop_assert_eq!(decode_attributes(&record.attributes), Ok(id));
            prop_assert_eq!(decode_key(&record.key), Ok(id));
        }

        #[test]
        fn distinct_ids_never_collide(a in any::<u32>(), b in any::<u32>()) {
            prop_assume!(a != b);
            prop_assert_ne!(encode(a).attributes, encode(b).attributes);
        }
    }
}
