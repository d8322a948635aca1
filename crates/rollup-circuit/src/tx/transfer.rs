//! Transfer: dual-authorized movement of `amount` of a token from A to B,
//! with a fee to the operator (`SPEC_FULL.md` §4.9).
//!
//! A signed (non-conditional) transfer consumes `storage_id` against
//! account A's storage slot as a one-shot replay nonce
//! ([`storage::consume_nonce`]), so the same signed transfer can't be
//! replayed into the block twice under a different transfer else the
//! rest of its payload matched byte-for-byte (`spec.md` §4.5 scenario
//! S5). A conditional transfer leaves the slot untouched.
//!
//! Both signatures (payer and dual author) are verified here, directly
//! against the keys carried on [`TransferData`], rather than through the
//! generic `hash_a`/`hash_b`-against-the-leaf's-own-key path the
//! single-signer kinds use — a transfer's dual author is not necessarily
//! account B's own key (`spec.md` S4: an absent dual author resolves to
//! the payer's key and a single signature suffices), so it can't be
//! pinned to a leaf the way a self-authorizing signer can. Both output
//! signature bits are left `false`; nothing else consults them for this
//! kind.

use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use rollup_core::constants::{
    FLOAT16_ACCURACY, FLOAT16_ENCODING, FLOAT24_ACCURACY, FLOAT24_ENCODING, NUM_BITS_AMOUNT,
};

use super::{address_bits, be_bits, LeafContext, TxOutput};
use crate::gadgets::field::Constants;
use crate::gadgets::signature::Point;
use crate::gadgets::{float, math, signature, storage};
use crate::state::{credit_balance, debit_balance};

/// Transfer payload, already allocated.
pub struct TransferData {
    /// Storage slot consumed as this transfer's replay nonce, when
    /// signed (`storage_a`'s slot, per `spec.md` §4.5).
    pub storage_id: AllocatedNum<Scalar>,
    /// Destination address, as raw bytes (for public data) ...
    pub to: [u8; 20],
    /// ... and as a field element (for the consistency checks below).
    pub to_field: AllocatedNum<Scalar>,
    /// The address the payer's signed message pinned the transfer to, or
    /// `0` to leave it unconstrained.
    pub payer_to: AllocatedNum<Scalar>,
    /// The account id the dual author's signed message pinned the
    /// transfer to, or `0` to leave it unconstrained.
    pub payee_to_account_id: AllocatedNum<Scalar>,
    /// Whether this transfer is on-chain-authorized rather than signed.
    pub conditional: bellman::gadgets::boolean::Boolean,
    /// Whether the full addresses are included in this transfer's
    /// public-data record regardless of the new-account/conditional
    /// tests (a user can opt into on-chain visibility).
    pub put_addresses_in_da: bellman::gadgets::boolean::Boolean,
    /// Exact amount moved, before DA float-rounding.
    pub exact_amount: AllocatedNum<Scalar>,
    /// `exact_amount`, `FLOAT24_ENCODING`-packed, as posted to public data.
    pub amount_packed: Option<Scalar>,
    /// Exact fee charged, before DA float-rounding.
    pub exact_fee: AllocatedNum<Scalar>,
    /// `exact_fee`, `FLOAT16_ENCODING`-packed, as posted to public data.
    pub fee_packed: Option<Scalar>,
    /// The payer's public key.
    pub payer_public_key: Point,
    /// The payer signature's `R`.
    pub payer_r: Point,
    /// The payer signature's `S`.
    pub payer_s: Option<jubjub::Fr>,
    /// The message hash the payer signed.
    pub payer_message_hash: AllocatedNum<Scalar>,
    /// The dual author's public key (the payer's own key when no
    /// separate dual author is required, per `spec.md` S4).
    pub dual_author_public_key: Point,
    /// The dual-author signature's `R`.
    pub dual_author_r: Point,
    /// The dual-author signature's `S`.
    pub dual_author_s: Option<jubjub::Fr>,
    /// The message hash the dual author signed.
    pub dual_author_message_hash: AllocatedNum<Scalar>,
}

/// Build a transfer's output.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    ctx: &LeafContext,
    data: &TransferData,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    let mut output = TxOutput::identity(cs.namespace(|| "identity"), ctx, num_conditional_txs_before, constants)?;

    math::require_not_zero(cs.namespace(|| "to is nonzero"), &data.to_field)?;

    let payer_to_nonzero = math::is_nonzero(cs.namespace(|| "payer_to nonzero"), &data.payer_to)?;
    let payer_to_matches = math::equal(cs.namespace(|| "payer_to matches to"), &data.payer_to, &data.to_field)?;
    math::if_then_require(cs.namespace(|| "payer_to consistent"), &payer_to_nonzero, &payer_to_matches)?;

    let payee_nonzero = math::is_nonzero(cs.namespace(|| "payee_toAccountID nonzero"), &data.payee_to_account_id)?;
    let payee_matches = math::equal(cs.namespace(|| "payee_toAccountID matches"), &data.payee_to_account_id, &ctx.account_b_id)?;
    math::if_then_require(cs.namespace(|| "payee_toAccountID consistent"), &payee_nonzero, &payee_matches)?;

    let amount = float::decode(cs.namespace(|| "decode amount"), data.amount_packed, FLOAT24_ENCODING)?;
    math::require_accuracy(
        cs.namespace(|| "amount accuracy"),
        &data.exact_amount,
        &amount.value,
        FLOAT24_ACCURACY,
        NUM_BITS_AMOUNT,
    )?;
    let fee = float::decode(cs.namespace(|| "decode fee"), data.fee_packed, FLOAT16_ENCODING)?;
    math::require_accuracy(
        cs.namespace(|| "fee accuracy"),
        &data.exact_fee,
        &fee.value,
        FLOAT16_ACCURACY,
        NUM_BITS_AMOUNT,
    )?;

    let required = data.conditional.not();
    signature::verify_if_required(
        cs.namespace(|| "payer signature"),
        &required,
        &data.payer_public_key,
        &data.payer_r,
        data.payer_s,
        &data.payer_message_hash,
        &constants.zero,
    )?;
    signature::verify_if_required(
        cs.namespace(|| "dual author signature"),
        &required,
        &data.dual_author_public_key,
        &data.dual_author_r,
        data.dual_author_s,
        &data.dual_author_message_hash,
        &constants.zero,
    )?;

    let nonce = storage::consume_nonce(
        cs.namespace(|| "consume replay nonce"),
        &required,
        &data.storage_id,
        &ctx.storage_a.storage_id,
        &ctx.storage_a.data,
        constants,
    )?;
    output.storage_a.storage_id = nonce.storage_id_after;
    output.storage_a.data = nonce.data_after;

    let total_debit = math::add(cs.namespace(|| "amount + fee"), &data.exact_amount, &data.exact_fee, NUM_BITS_AMOUNT)?;
    output.balance_a_s = debit_balance(cs.namespace(|| "debit payer"), &ctx.balance_a_s, &total_debit.packed, NUM_BITS_AMOUNT)?;
    output.balance_b_s = credit_balance(cs.namespace(|| "credit payee"), &ctx.balance_b_s, &data.exact_amount, NUM_BITS_AMOUNT)?;
    output.balance_o_a = credit_balance(cs.namespace(|| "credit operator fee"), &ctx.balance_o_a, &data.exact_fee, NUM_BITS_AMOUNT)?;

    let conditional_after = math::add(cs.namespace(|| "conditional + 1"), num_conditional_txs_before, &constants.one, 32)?;
    output.num_conditional_txs = math::ternary(
        cs.namespace(|| "bump conditional count"),
        &data.conditional,
        &conditional_after.packed,
        num_conditional_txs_before,
    )?;

    let owner_is_empty = math::equal(cs.namespace(|| "payee is a new account"), &ctx.account_b.owner, &constants.zero)?;
    let include_addresses = math::boolean_or(cs.namespace(|| "new account or conditional"), &owner_is_empty, &data.conditional)?;
    let include_addresses = math::boolean_or(cs.namespace(|| "or requested"), &include_addresses, &data.put_addresses_in_da)?;

    // The address fields collapse to all-zero bits when not included,
    // which is exactly `include_addresses AND real_bit` since a zero
    // address's bits are all `false`.
    let to_bits = address_bits(data.to);
    let selected_to_bits = to_bits
        .iter()
        .enumerate()
        .map(|(i, bit)| {
            bellman::gadgets::boolean::Boolean::and(cs.namespace(|| format!("to address bit {i}")), &include_addresses, bit)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut public_data = be_bits(cs.namespace(|| "account a id bits"), &ctx.account_a_id, 32)?;
    public_data.extend(be_bits(cs.namespace(|| "account b id bits"), &ctx.account_b_id, 32)?);
    public_data.extend(be_bits(cs.namespace(|| "token id bits"), &ctx.token_a_s, 16)?);
    let mut amount_bits_be = amount.packed.bits.clone();
    amount_bits_be.reverse();
    public_data.extend(amount_bits_be);
    let mut fee_bits_be = fee.packed.bits.clone();
    fee_bits_be.reverse();
    public_data.extend(fee_bits_be);
    public_data.extend(selected_to_bits);
    output.public_data = public_data;

    Ok(output)
}
