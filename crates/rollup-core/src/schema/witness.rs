//! Per-transaction and per-block witness schema (`spec.md` §6).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::field::FieldBytes;
use super::leaves::{AccountLeaf, BalanceLeaf, MerkleProof, StorageLeaf};
use super::order::Order;

/// A before/after leaf pair sharing one Merkle proof, matching the
/// "verify-before / update-after share one sibling array" invariant of
/// `spec.md` §3 invariant 1 and §4.4's "Update pattern".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LeafUpdate<L> {
    /// Leaf value before the transaction.
    pub before: L,
    /// Leaf value after the transaction.
    pub after: L,
    /// Shared sibling proof authenticating both reads.
    pub proof: MerkleProof,
}

/// An EdDSA-on-twisted-Edwards signature, `(R, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EdDsaSignature {
    /// `R.x`.
    pub r_x: FieldBytes,
    /// `R.y`.
    pub r_y: FieldBytes,
    /// Scalar response `s`.
    pub s: FieldBytes,
}

/// Transaction-kind-specific payload; the common Merkle-update plumbing in
/// [`TxWitness`] is shared by all ten kinds (`spec.md` §4.9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum TxData {
    /// No state change, no signature.
    Noop,
    /// Credit `amount` of a token to an account, creating it if empty.
    Deposit {
        /// On-chain owner address, checked against the (possibly empty) leaf.
        owner: [u8; 20],
        /// Amount credited, at most 96 bits.
        amount: u128,
    },
    /// Debit `amount` of a token from an account.
    Withdrawal {
        /// One of the four `rollup_core::constants::withdrawal_type` codes.
        kind: u8,
        /// On-chain owner address the withdrawal is paid to.
        owner: [u8; 20],
        /// Amount withdrawn.
        amount: u128,
    },
    /// Move `amount` of a token from account A to account B, charging `fee`.
    Transfer {
        /// Payer-specified required recipient, or 0.
        payer_to: u32,
        /// Payee-specified required recipient account id, or 0.
        payee_to_account_id: u32,
        /// Actual recipient account id; must be non-zero.
        to: u32,
        /// Amount transferred.
        amount: u128,
        /// Fee charged to the payer, paid to the operator.
        fee: u128,
        /// Whether this transfer is authorized on-chain rather than signed.
        conditional: bool,
        /// Whether the 20-byte addresses are placed on public data even
        /// though the account already exists and the tx is not conditional.
        put_addresses_in_da: bool,
        /// Recipient's on-chain owner address (for DA placement / new account).
        to_owner: [u8; 20],
    },
    /// Match two orders and realize `fill_s_a`/`fill_s_b` of their tokens.
    SpotTrade {
        /// Order A.
        order_a: Order,
        /// Order B.
        order_b: Order,
        /// Amount of `order_a.token_s` filled.
        fill_s_a: u128,
        /// Amount of `order_b.token_s` filled.
        fill_s_b: u128,
    },
    /// Rotate an account's EdDSA public key.
    AccountUpdate {
        /// New public key X coordinate.
        new_public_key_x: FieldBytes,
        /// New public key Y coordinate.
        new_public_key_y: FieldBytes,
        /// Whether this update is authorized on-chain rather than signed.
        conditional: bool,
    },
    /// Rewrite an AMM pool's fee and weight.
    AmmUpdate {
        /// New AMM fee, in basis points.
        new_fee_bips_amm: u16,
        /// New AMM pool weight.
        new_weight_amm: FieldBytes,
    },
    /// Mint an NFT balance slot.
    NftMint {
        /// Account minting the NFT.
        minter_account_id: u32,
        /// Account receiving the minted balance.
        to_account_id: u32,
        /// Token slot the NFT occupies.
        nft_token_id: u16,
        /// NFT content identifier, stored in `weight_amm`.
        nft_id: FieldBytes,
        /// Creator royalty, in basis points.
        creator_fee_bips: u16,
        /// Amount minted (usually 1 for a unique NFT).
        amount: u128,
    },
    /// Post metadata for an NFT minted in a prior block, with no balance
    /// movement.
    NftData {
        /// On-chain minter address.
        minter: [u8; 20],
        /// Token slot the NFT occupies.
        nft_token_id: u16,
        /// NFT content identifier.
        nft_id: FieldBytes,
        /// Creator royalty, in basis points.
        creator_fee_bips: u16,
    },
    /// Require a signature over an externally supplied message hash, with
    /// no state change.
    SignatureVerification {
        /// The message hash being attested to.
        message_hash: FieldBytes,
    },
}

/// One transaction's full witness: its kind-specific payload plus every
/// Merkle update the uniform pipeline in `spec.md` §4.11 touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TxWitness {
    /// Transaction-type byte (`rollup_core::constants::tx_type`).
    pub tx_type: u8,
    /// Kind-specific payload.
    pub data: TxData,

    /// Account A's id.
    pub account_a_id: u32,
    /// Account B's id, or the reserved operator-writable slot when unused.
    pub account_b_id: u32,
    /// Token id for account A's "sell"/primary side.
    pub token_a_s: u16,
    /// Token id for account A's "buy"/secondary side.
    pub token_a_b: u16,
    /// Token id for account B's "sell"/primary side.
    pub token_b_s: u16,
    /// Token id for account B's "buy"/secondary side.
    pub token_b_b: u16,

    /// Step 4/8 of §4.11: account A update.
    pub account_a: LeafUpdate<AccountLeaf>,
    /// Step 8 of §4.11: account B update.
    pub account_b: LeafUpdate<AccountLeaf>,
    /// Step 1 of §4.11: storage slot for account A's primary token.
    pub storage_a: LeafUpdate<StorageLeaf>,
    /// Step 2 of §4.11: balance slot for account A's primary token.
    pub balance_a_s: LeafUpdate<BalanceLeaf>,
    /// Step 3 of §4.11: balance slot for account A's secondary token.
    pub balance_a_b: LeafUpdate<BalanceLeaf>,
    /// Step 5 of §4.11: storage slot for account B's primary token.
    pub storage_b: LeafUpdate<StorageLeaf>,
    /// Step 6 of §4.11: balance slot for account B's primary token.
    pub balance_b_s: LeafUpdate<BalanceLeaf>,
    /// Step 7 of §4.11: balance slot for account B's secondary token.
    pub balance_b_b: LeafUpdate<BalanceLeaf>,

    /// Token id the operator collects A's fee share in.
    pub token_o_a: u16,
    /// Token id the operator collects B's fee share in.
    pub token_o_b: u16,
    /// Step 9 of §4.11: operator's balance for B's fee share.
    pub balance_o_b: LeafUpdate<BalanceLeaf>,
    /// Step 9 of §4.11: operator's balance for A's fee share.
    pub balance_o_a: LeafUpdate<BalanceLeaf>,
    /// Step 9 of §4.11: operator account (balances root only; nonce bumps
    /// once at the end of the block).
    pub operator_account: LeafUpdate<AccountLeaf>,

    /// Token id the protocol fee pool collects B's share in.
    pub token_p_a: u16,
    /// Token id the protocol fee pool collects A's share in.
    pub token_p_b: u16,
    /// Step 10 of §4.11: protocol's balance for B's fee share.
    pub balance_p_b: LeafUpdate<BalanceLeaf>,
    /// Step 10 of §4.11: protocol's balance for A's fee share.
    pub balance_p_a: LeafUpdate<BalanceLeaf>,

    /// Payer/signer-A's signature, when required by this tx kind.
    pub signature_a: Option<EdDsaSignature>,
    /// Dual-author/signer-B's signature, when required by this tx kind.
    pub signature_b: Option<EdDsaSignature>,

    /// Running count of on-chain-authorized ("conditional") transactions,
    /// including this one, threaded sequentially per `spec.md` §9.
    pub num_conditional_txs_after: u32,
}

/// The full witness for one block (`spec.md` §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BlockWitness {
    /// Exchange identifier bound into every signed message and public data.
    pub exchange_id: [u8; 20],
    /// Account tree root before any transaction in this block.
    pub root_before: FieldBytes,
    /// Account tree root after every transaction in this block.
    pub root_after: FieldBytes,
    /// Block timestamp, bound into orders' expiry checks.
    pub timestamp: u32,
    /// Protocol fee (taker side), in basis points.
    pub protocol_taker_bips: u16,
    /// Protocol fee (maker side), in basis points.
    pub protocol_maker_bips: u16,
    /// Account id of the block's operator.
    pub operator_account_id: u32,
    /// Operator's nonce before the block's closing bump.
    pub operator_nonce_before: u32,
    /// Operator's signature over the block's public input.
    pub operator_signature: EdDsaSignature,
    /// The block's transactions, applied in order.
    pub txs: Vec<TxWitness>,

    /// Operator account leaf update closing the block (nonce bump).
    pub operator_account_final: LeafUpdate<AccountLeaf>,
    /// Protocol-fee account leaf update closing the block (balances root
    /// commit only; see `spec.md` §4.11's final paragraph).
    pub protocol_account_final: LeafUpdate<AccountLeaf>,
    /// Passthrough "index account" update, present in the witness schema
    /// but not consumed by any transaction sub-circuit — see the Open
    /// Question on this field in `SPEC_FULL.md` §9.
    pub index_account: Option<LeafUpdate<AccountLeaf>>,
}

impl BlockWitness {
    /// Number of on-chain-authorized transactions in the block, read off
    /// the last transaction's running counter (or zero for an empty
    /// block).
    #[must_use]
    pub fn num_conditional_txs(&self) -> u32 {
        self.txs
            .last()
            .map_or(0, |tx| tx.num_conditional_txs_after)
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockWitness, EdDsaSignature, LeafUpdate, TxData, TxWitness};
    use crate::schema::{AccountLeaf, BalanceLeaf, FieldBytes, MerkleProof, StorageLeaf};

    fn empty_account_update() -> LeafUpdate<AccountLeaf> {
        let leaf = AccountLeaf::empty(FieldBytes::ZERO);
        LeafUpdate {
            before: leaf,
            after: leaf,
            proof: MerkleProof {
                siblings: vec![FieldBytes::ZERO; 48],
            },
        }
    }

    fn empty_balance_update() -> LeafUpdate<BalanceLeaf> {
        let leaf = BalanceLeaf::empty(FieldBytes::ZERO);
        LeafUpdate {
            before: leaf,
            after: leaf,
            proof: MerkleProof {
                siblings: vec![FieldBytes::ZERO; 24],
            },
        }
    }

    fn empty_storage_update() -> LeafUpdate<StorageLeaf> {
        LeafUpdate {
            before: StorageLeaf::EMPTY,
            after: StorageLeaf::EMPTY,
            proof: MerkleProof {
                siblings: vec![FieldBytes::ZERO; 21],
            },
        }
    }

    fn noop_tx(num_conditional_txs_after: u32) -> TxWitness {
        TxWitness {
            tx_type: rollup_core_tx_type_noop(),
            data: TxData::Noop,
            account_a_id: 0,
            account_b_id: 1,
            token_a_s: 0,
            token_a_b: 0,
            token_b_s: 0,
            token_b_b: 0,
            account_a: empty_account_update(),
            account_b: empty_account_update(),
            storage_a: empty_storage_update(),
            balance_a_s: empty_balance_update(),
            balance_a_b: empty_balance_update(),
            storage_b: empty_storage_update(),
            balance_b_s: empty_balance_update(),
            balance_b_b: empty_balance_update(),
            token_o_a: 0,
            token_o_b: 0,
            balance_o_b: empty_balance_update(),
            balance_o_a: empty_balance_update(),
            operator_account: empty_account_update(),
            token_p_a: 0,
            token_p_b: 0,
            balance_p_b: empty_balance_update(),
            balance_p_a: empty_balance_update(),
            signature_a: None,
            signature_b: None,
            num_conditional_txs_after,
        }
    }

    const fn rollup_core_tx_type_noop() -> u8 {
        crate::constants::tx_type::NOOP
    }

    #[test]
    fn num_conditional_txs_reads_last_tx_counter() {
        let block = BlockWitness {
            exchange_id: [0_u8; 20],
            root_before: FieldBytes::ZERO,
            root_after: FieldBytes::ZERO,
            timestamp: 0,
            protocol_taker_bips: 0,
            protocol_maker_bips: 0,
            operator_account_id: 1,
            operator_nonce_before: 0,
            operator_signature: EdDsaSignature {
                r_x: FieldBytes::ZERO,
                r_y: FieldBytes::ZERO,
                s: FieldBytes::ZERO,
            },
            txs: vec![noop_tx(0), noop_tx(2), noop_tx(2)],
            operator_account_final: empty_account_update(),
            protocol_account_final: empty_account_update(),
            index_account: None,
        };
        assert_eq!(block.num_conditional_txs(), 2);
    }

    #[test]
    fn empty_block_has_zero_conditional_txs() {
        let block = BlockWitness {
            exchange_id: [0_u8; 20],
            root_before: FieldBytes::ZERO,
            root_after: FieldBytes::ZERO,
            timestamp: 0,
            protocol_taker_bips: 0,
            protocol_maker_bips: 0,
            operator_account_id: 1,
            operator_nonce_before: 0,
            operator_signature: EdDsaSignature {
                r_x: FieldBytes::ZERO,
                r_y: FieldBytes::ZERO,
                s: FieldBytes::ZERO,
            },
            txs: vec![],
            operator_account_final: empty_account_update(),
            protocol_account_final: empty_account_update(),
            index_account: None,
        };
        assert_eq!(block.num_conditional_txs(), 0);
    }
}
