//! Byte representation of scalar-field elements, shared by every schema
//! type below but independent of any particular curve crate.

use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;

/// 32 little-endian bytes of a scalar-field element.
///
/// `rollup-core` never interprets these bytes as a curve scalar itself —
/// that is `rollup-circuit`'s job, the same separation the teacher crate
/// draws between `zair-core`'s plain schema types and `zair-sapling-circuit`'s
/// `bellman`-backed ones.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBytes(#[serde_as(as = "Hex")] pub [u8; 32]);

impl FieldBytes {
    /// The additive identity.
    pub const ZERO: Self = Self([0_u8; 32]);

    /// Build from a small unsigned integer.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        let mut bytes = [0_u8; 32];
        let le = value.to_le_bytes();
        let mut i = 0;
        #[allow(
            clippy::indexing_slicing,
            clippy::arithmetic_side_effects,
            reason = "loop bound by the fixed 8-byte LE encoding of a u64"
        )]
        while i < le.len() {
            bytes[i] = le[i];
            i += 1;
        }
        Self(bytes)
    }
}

impl From<u64> for FieldBytes {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::FieldBytes;

    #[test]
    fn from_u64_round_trips_through_json() {
        let value = FieldBytes::from_u64(0x0102_0304);
        let json = serde_json::to_string(&value).expect("serialize");
        let back: FieldBytes = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(value, back);
    }

    #[test]
    fn zero_is_all_zero_bytes() {
        assert_eq!(FieldBytes::ZERO.0, [0_u8; 32]);
    }
}
