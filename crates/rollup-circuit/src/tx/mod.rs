//! Uniform transaction output record and the ten transaction kinds that
//! populate it (`SPEC_FULL.md` §4.9).
//!
//! Every kind is a plain function from a [`TxContext`] (the witness
//! already allocated as circuit variables, the shared leaf "before"
//! values, and anything a sub-circuit needs to read) to a [`TxOutput`]:
//! a flat struct with one field per row of the output table, always
//! fully populated — never a sparse/optional map — per the uniform-shape
//! design in `spec.md` §4.9. A kind overrides only the fields its own
//! semantics touch; [`TxOutput::identity`] is the starting point every
//! kind builds from.

use bellman::gadgets::boolean::{self, Boolean};
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;

use crate::gadgets::field::Constants;
use crate::state::{AccountLeafVars, BalanceLeafVars, StorageLeafVars};

/// Account update, withdrawal and deposit sub-circuits.
pub mod account_update;
/// AMM pool fee/weight update.
pub mod amm_update;
/// Deposit.
pub mod deposit;
/// No-op.
pub mod noop;
/// NFT mint and NFT metadata-posting.
pub mod nft;
/// One-hot selection across all ten kinds.
pub mod selector;
/// Raw message-hash signature check with no state change.
pub mod signature_verification;
/// Order matching.
pub mod spot_trade;
/// Transfer.
pub mod transfer;
/// Withdrawal.
pub mod withdrawal;

/// Everything a transaction sub-circuit may read: its "before" leaves
/// (already verified against the block's running roots by the uniform
/// pipeline in [`crate::block`]) and the exchange-wide constants it is
/// signed against.
#[derive(Clone)]
pub struct LeafContext {
    /// Account A's id.
    pub account_a_id: AllocatedNum<Scalar>,
    /// Account B's id.
    pub account_b_id: AllocatedNum<Scalar>,
    /// Token id for account A's primary/sell side.
    pub token_a_s: AllocatedNum<Scalar>,
    /// Token id for account A's secondary/buy side.
    pub token_a_b: AllocatedNum<Scalar>,
    /// Token id for account B's primary/sell side.
    pub token_b_s: AllocatedNum<Scalar>,
    /// Token id for account B's secondary/buy side.
    pub token_b_b: AllocatedNum<Scalar>,
    /// Account A's leaf before this transaction.
    pub account_a: AccountLeafVars,
    /// Account B's leaf before this transaction.
    pub account_b: AccountLeafVars,
    /// Account A's primary-token balance before this transaction.
    pub balance_a_s: BalanceLeafVars,
    /// Account A's secondary-token balance before this transaction.
    pub balance_a_b: BalanceLeafVars,
    /// Account B's primary-token balance before this transaction.
    pub balance_b_s: BalanceLeafVars,
    /// Account B's secondary-token balance before this transaction.
    pub balance_b_b: BalanceLeafVars,
    /// Account A's primary-token storage slot before this transaction.
    pub storage_a: StorageLeafVars,
    /// Account B's primary-token storage slot before this transaction.
    pub storage_b: StorageLeafVars,
    /// Operator's balance crediting account A's fee share, before.
    pub balance_o_a: BalanceLeafVars,
    /// Operator's balance crediting account B's fee share, before.
    pub balance_o_b: BalanceLeafVars,
    /// Protocol-fee pool's balance crediting account A's fee share, before.
    pub balance_p_a: BalanceLeafVars,
    /// Protocol-fee pool's balance crediting account B's fee share, before.
    pub balance_p_b: BalanceLeafVars,
    /// The exchange id every signed message and compressed public-key
    /// check is bound to.
    pub exchange_id: AllocatedNum<Scalar>,
    /// The block's timestamp, bound into order-expiry checks.
    pub timestamp: AllocatedNum<Scalar>,
    /// Protocol fee charged on the taker side of a spot trade, in bips.
    pub protocol_taker_bips: AllocatedNum<Scalar>,
    /// Protocol fee charged on the maker side of a spot trade, in bips.
    pub protocol_maker_bips: AllocatedNum<Scalar>,
}

/// The uniform per-transaction output record (`spec.md` §4.9's output
/// table).
#[derive(Clone)]
pub struct TxOutput {
    /// Account A's leaf after this transaction.
    pub account_a: AccountLeafVars,
    /// Account B's leaf after this transaction.
    pub account_b: AccountLeafVars,
    /// Account A's primary-token balance after this transaction.
    pub balance_a_s: BalanceLeafVars,
    /// Account A's secondary-token balance after this transaction.
    pub balance_a_b: BalanceLeafVars,
    /// Account B's primary-token balance after this transaction.
    pub balance_b_s: BalanceLeafVars,
    /// Account B's secondary-token balance after this transaction.
    pub balance_b_b: BalanceLeafVars,
    /// Operator's balance crediting account A's fee share, after.
    pub balance_o_a: BalanceLeafVars,
    /// Operator's balance crediting account B's fee share, after.
    pub balance_o_b: BalanceLeafVars,
    /// Protocol-fee pool's balance crediting account A's fee share, after.
    pub balance_p_a: BalanceLeafVars,
    /// Protocol-fee pool's balance crediting account B's fee share, after.
    pub balance_p_b: BalanceLeafVars,
    /// Account A's primary-token storage slot after this transaction.
    pub storage_a: StorageLeafVars,
    /// Account B's primary-token storage slot after this transaction.
    pub storage_b: StorageLeafVars,

    /// Message hash signer A is required to have signed, when
    /// `signature_required_a`.
    pub hash_a: AllocatedNum<Scalar>,
    /// Message hash signer B is required to have signed, when
    /// `signature_required_b`.
    pub hash_b: AllocatedNum<Scalar>,
    /// Whether signer A's signature is checked this transaction.
    pub signature_required_a: Boolean,
    /// Whether signer B's signature is checked this transaction.
    pub signature_required_b: Boolean,

    /// Running count of on-chain-authorized transactions, including
    /// this one.
    pub num_conditional_txs: AllocatedNum<Scalar>,

    /// This transaction's public-data record, excluding the leading
    /// 1-byte tx-type tag the selector prepends (`spec.md` §4.9, §4.12).
    pub public_data: Vec<Boolean>,
}

impl TxOutput {
    /// The identity output: every leaf, hash and counter equal to its
    /// "before" value, no signature required, empty public data. Every
    /// sub-circuit starts here and overrides only what it changes.
    pub fn identity<CS: ConstraintSystem<Scalar>>(
        mut cs: CS,
        ctx: &LeafContext,
        num_conditional_txs_before: &AllocatedNum<Scalar>,
        constants: &Constants,
    ) -> Result<Self, SynthesisError> {
        let _ = &mut cs;
        Ok(Self {
            account_a: ctx.account_a.clone(),
            account_b: ctx.account_b.clone(),
            balance_a_s: ctx.balance_a_s.clone(),
            balance_a_b: ctx.balance_a_b.clone(),
            balance_b_s: ctx.balance_b_s.clone(),
            balance_b_b: ctx.balance_b_b.clone(),
            balance_o_a: ctx.balance_o_a.clone(),
            balance_o_b: ctx.balance_o_b.clone(),
            balance_p_a: ctx.balance_p_a.clone(),
            balance_p_b: ctx.balance_p_b.clone(),
            storage_a: ctx.storage_a.clone(),
            storage_b: ctx.storage_b.clone(),
            hash_a: constants.zero.clone(),
            hash_b: constants.zero.clone(),
            signature_required_a: Boolean::constant(false),
            signature_required_b: Boolean::constant(false),
            num_conditional_txs: num_conditional_txs_before.clone(),
            public_data: Vec::new(),
        })
    }
}

/// Render `value` as `bit_width` big-endian bits (MSB first), the byte
/// order every per-tx public-data record is built from.
pub(crate) fn be_bits<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    value: &AllocatedNum<Scalar>,
    bit_width: usize,
) -> Result<Vec<Boolean>, SynthesisError> {
    let mut le = boolean::field_into_boolean_vec_le(cs.namespace(|| "le bits"), value.get_value())?;
    le.truncate(bit_width);
    le.resize(bit_width, Boolean::constant(false));
    le.reverse();
    Ok(le)
}

/// Render a fixed 20-byte address as 160 big-endian bits.
pub(crate) fn address_bits(bytes: [u8; 20]) -> Vec<Boolean> {
    let mut bits = Vec::with_capacity(160);
    for byte in bytes {
        for i in (0..8).rev() {
            bits.push(Boolean::constant((byte >> i) & 1 == 1));
        }
    }
    bits
}

/// Shared sample-witness builder for the per-kind unit tests below.
#[cfg(test)]
pub(crate) mod tests_support {
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;

    use super::LeafContext;
    use crate::gadgets::field::Constants;
    use crate::state::{AccountLeafVars, BalanceLeafVars, StorageLeafVars};
    use bellman::gadgets::num::AllocatedNum;

    pub(crate) fn alloc(cs: &mut TestConstraintSystem<Scalar>, name: &'static str, value: u64) -> AllocatedNum<Scalar> {
        AllocatedNum::alloc(cs.namespace(|| name), || Ok(Scalar::from(value))).unwrap()
    }

    pub(crate) fn sample_account(cs: &mut TestConstraintSystem<Scalar>, tag: &'static str, zero: &AllocatedNum<Scalar>) -> AccountLeafVars {
        AccountLeafVars {
            owner: alloc(cs, tag, 0xAAAA_u64),
            public_key_x: zero.clone(),
            public_key_y: zero.clone(),
            nonce: zero.clone(),
            fee_bips_amm: zero.clone(),
            balances_root: zero.clone(),
        }
    }

    pub(crate) fn sample_balance(zero: &AllocatedNum<Scalar>, balance: AllocatedNum<Scalar>) -> BalanceLeafVars {
        BalanceLeafVars {
            balance,
            weight_amm: zero.clone(),
            storage_root: zero.clone(),
        }
    }

    pub(crate) fn sample_context(cs: &mut TestConstraintSystem<Scalar>) -> (LeafContext, Constants, AllocatedNum<Scalar>) {
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let zero = constants.zero.clone();
        let balance = alloc(cs, "balance", 1000);
        let ctx = LeafContext {
            account_a_id: alloc(cs, "account_a_id", 7),
            account_b_id: alloc(cs, "account_b_id", 1),
            token_a_s: alloc(cs, "token_a_s", 0),
            token_a_b: alloc(cs, "token_a_b", 1),
            token_b_s: alloc(cs, "token_b_s", 1),
            token_b_b: alloc(cs, "token_b_b", 0),
            account_a: sample_account(cs, "owner_a", &zero),
            account_b: sample_account(cs, "owner_b", &zero),
            balance_a_s: sample_balance(&zero, balance.clone()),
            balance_a_b: sample_balance(&zero, zero.clone()),
            balance_b_s: sample_balance(&zero, zero.clone()),
            balance_b_b: sample_balance(&zero, zero.clone()),
            storage_a: StorageLeafVars { data: zero.clone(), storage_id: zero.clone() },
            storage_b: StorageLeafVars { data: zero.clone(), storage_id: zero.clone() },
            balance_o_a: sample_balance(&zero, zero.clone()),
            balance_o_b: sample_balance(&zero, zero.clone()),
            balance_p_a: sample_balance(&zero, zero.clone()),
            balance_p_b: sample_balance(&zero, zero.clone()),
            exchange_id: alloc(cs, "exchange_id", 99),
            timestamp: alloc(cs, "timestamp", 1_000),
            protocol_taker_bips: zero.clone(),
            protocol_maker_bips: zero.clone(),
        };
        let num_conditional = alloc(cs, "num_conditional_before", 0);
        (ctx, constants, num_conditional)
    }
}
