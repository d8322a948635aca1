//! Account, balance and storage leaf witness types, and the flat Merkle
//! proof shape shared by every tree (`spec.md` §3, §4.4).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::field::FieldBytes;

/// An account tree leaf: `(owner, publicKeyX, publicKeyY, nonce,
/// feeBipsAMM, balancesRoot)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountLeaf {
    /// 160-bit on-chain owner address, held as the low 20 bytes.
    pub owner: [u8; 20],
    /// EdDSA public key X coordinate.
    pub public_key_x: FieldBytes,
    /// EdDSA public key Y coordinate.
    pub public_key_y: FieldBytes,
    /// Replay-protection nonce for account-scoped signed operations.
    pub nonce: u32,
    /// AMM pool fee, in basis points, when this account is a pool account.
    pub fee_bips_amm: u16,
    /// Root of this account's balance tree.
    pub balances_root: FieldBytes,
}

impl AccountLeaf {
    /// The canonical empty leaf: zero owner, zero key, zero nonce, the
    /// empty balance tree's root.
    #[must_use]
    pub const fn empty(empty_balances_root: FieldBytes) -> Self {
        Self {
            owner: [0_u8; 20],
            public_key_x: FieldBytes::ZERO,
            public_key_y: FieldBytes::ZERO,
            nonce: 0,
            fee_bips_amm: 0,
            balances_root: empty_balances_root,
        }
    }
}

/// A balance tree leaf: `(balance, weightAMM, storageRoot)`.
///
/// `weight_amm` doubles as an NFT content-hash when the slot holds an NFT
/// balance rather than an AMM pool share — see the Open Question on this
/// field overload in `SPEC_FULL.md` §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BalanceLeaf {
    /// Token balance, at most 96 bits.
    pub balance: u128,
    /// AMM weight, or an NFT content-hash when this slot holds an NFT.
    pub weight_amm: FieldBytes,
    /// Root of this balance's storage-slot tree.
    pub storage_root: FieldBytes,
}

impl BalanceLeaf {
    /// The canonical empty leaf.
    #[must_use]
    pub const fn empty(empty_storage_root: FieldBytes) -> Self {
        Self {
            balance: 0,
            weight_amm: FieldBytes::ZERO,
            storage_root: empty_storage_root,
        }
    }
}

/// A storage-slot leaf: `(data, storageID)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StorageLeaf {
    /// Slot payload (fill progress for an order, or the nonce-used flag).
    pub data: FieldBytes,
    /// Full 32-bit storage id that last wrote this slot.
    pub storage_id: u32,
}

impl StorageLeaf {
    /// The canonical empty leaf: zero data, zero storage id.
    pub const EMPTY: Self = Self {
        data: FieldBytes::ZERO,
        storage_id: 0,
    };
}

/// A flat Merkle proof: `3 * depth` sibling field elements, in the layout
/// `UpdateTreeRoot` expects (three siblings per level, read in address-bit
/// order); see `SPEC_FULL.md` §4.4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MerkleProof {
    /// Sibling field elements, length `3 * depth`.
    pub siblings: Vec<FieldBytes>,
}

impl MerkleProof {
    /// Validate that `siblings.len() == 3 * depth`, returning the depth
    /// on success.
    pub fn expect_depth(&self, tree: &'static str, depth: usize) -> Result<(), crate::CircuitError> {
        let expected = depth.checked_mul(3).unwrap_or(usize::MAX);
        if self.siblings.len() == expected {
            Ok(())
        } else {
            Err(crate::CircuitError::WrongProofLength {
                tree,
                expected,
                actual: self.siblings.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldBytes, MerkleProof};
    use crate::CircuitError;

    #[test]
    fn proof_length_is_checked_against_depth() {
        let proof = MerkleProof {
            siblings: vec![FieldBytes::ZERO; 21],
        };
        assert!(proof.expect_depth("storage", 7).is_ok());
        assert_eq!(
            proof.expect_depth("storage", 8),
            Err(CircuitError::WrongProofLength {
                tree: "storage",
                expected: 24,
                actual: 21,
            })
        );
    }
}
