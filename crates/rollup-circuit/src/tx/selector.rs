//! One-hot selection across the ten transaction kinds' outputs
//! (`SPEC_FULL.md` §4.9, §4.10, §4.12).
//!
//! Every block slot runs all ten sub-circuits unconditionally (bellman's
//! circuit shape is fixed, so there is no branching on the witnessed tx
//! type); this module picks out the one result that actually applies and
//! assembles the 68-byte public-data record the selector contributes to
//! the block's compressed public input: a 1-byte tx-type tag followed by
//! a 67-byte (536-bit) payload, padded out per kind to that fixed width.

use bellman::gadgets::boolean::Boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use rollup_core::constants::{NUM_BITS_TX_TYPE, NUM_TX_TYPES, TX_DATA_AVAILABILITY_SIZE};

use super::{be_bits, TxOutput};
use crate::gadgets::math;
use crate::state::{AccountLeafVars, BalanceLeafVars, StorageLeafVars};

const PAYLOAD_BITS: usize = (TX_DATA_AVAILABILITY_SIZE - 1) * 8;

/// Select one of ten boolean values by a one-hot selector.
fn select_boolean<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    selector: &[Boolean],
    values: &[Boolean],
) -> Result<Boolean, SynthesisError> {
    let mut chosen: Option<Boolean> = None;
    for (i, (bit, value)) in selector.iter().zip(values.iter()).enumerate() {
        let picked = Boolean::and(cs.namespace(|| format!("pick {i}")), bit, value)?;
        chosen = Some(match chosen {
            None => picked,
            Some(acc) => math::boolean_or(cs.namespace(|| format!("accumulate {i}")), &acc, &picked)?,
        });
    }
    chosen.ok_or(SynthesisError::Unsatisfiable)
}

fn select_account<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    selector: &[Boolean],
    accounts: &[AccountLeafVars],
) -> Result<AccountLeafVars, SynthesisError> {
    Ok(AccountLeafVars {
        owner: math::array_select(cs.namespace(|| "owner"), selector, &field(accounts, |a| a.owner.clone()))?,
        public_key_x: math::array_select(cs.namespace(|| "public_key_x"), selector, &field(accounts, |a| a.public_key_x.clone()))?,
        public_key_y: math::array_select(cs.namespace(|| "public_key_y"), selector, &field(accounts, |a| a.public_key_y.clone()))?,
        nonce: math::array_select(cs.namespace(|| "nonce"), selector, &field(accounts, |a| a.nonce.clone()))?,
        fee_bips_amm: math::array_select(cs.namespace(|| "fee_bips_amm"), selector, &field(accounts, |a| a.fee_bips_amm.clone()))?,
        balances_root: math::array_select(cs.namespace(|| "balances_root"), selector, &field(accounts, |a| a.balances_root.clone()))?,
    })
}

fn select_balance<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    selector: &[Boolean],
    balances: &[BalanceLeafVars],
) -> Result<BalanceLeafVars, SynthesisError> {
    Ok(BalanceLeafVars {
        balance: math::array_select(cs.namespace(|| "balance"), selector, &field(balances, |b| b.balance.clone()))?,
        weight_amm: math::array_select(cs.namespace(|| "weight_amm"), selector, &field(balances, |b| b.weight_amm.clone()))?,
        storage_root: math::array_select(cs.namespace(|| "storage_root"), selector, &field(balances, |b| b.storage_root.clone()))?,
    })
}

fn select_storage<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    selector: &[Boolean],
    slots: &[StorageLeafVars],
) -> Result<StorageLeafVars, SynthesisError> {
    Ok(StorageLeafVars {
        data: math::array_select(cs.namespace(|| "data"), selector, &field(slots, |s| s.data.clone()))?,
        storage_id: math::array_select(cs.namespace(|| "storage_id"), selector, &field(slots, |s| s.storage_id.clone()))?,
    })
}

fn field<T, R, F: Fn(&T) -> R>(items: &[T], f: F) -> Vec<R> {
    items.iter().map(f).collect()
}

/// Pad `bits` out to [`PAYLOAD_BITS`] with trailing zero bits.
fn padded(mut bits: Vec<Boolean>) -> Vec<Boolean> {
    bits.resize(PAYLOAD_BITS, Boolean::constant(false));
    bits.truncate(PAYLOAD_BITS);
    bits
}

/// Select across all ten kinds' outputs by the witnessed transaction
/// type, and assemble the final per-transaction public-data record.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    tx_type: &AllocatedNum<Scalar>,
    outputs: &[TxOutput; NUM_TX_TYPES],
) -> Result<TxOutput, SynthesisError> {
    let selector = math::selector_gadget(cs.namespace(|| "tx type selector"), tx_type, NUM_TX_TYPES)?;

    let account_a = select_account(cs.namespace(|| "account_a"), &selector, &field(outputs, |o| o.account_a.clone()))?;
    let account_b = select_account(cs.namespace(|| "account_b"), &selector, &field(outputs, |o| o.account_b.clone()))?;
    let balance_a_s = select_balance(cs.namespace(|| "balance_a_s"), &selector, &field(outputs, |o| o.balance_a_s.clone()))?;
    let balance_a_b = select_balance(cs.namespace(|| "balance_a_b"), &selector, &field(outputs, |o| o.balance_a_b.clone()))?;
    let balance_b_s = select_balance(cs.namespace(|| "balance_b_s"), &selector, &field(outputs, |o| o.balance_b_s.clone()))?;
    let balance_b_b = select_balance(cs.namespace(|| "balance_b_b"), &selector, &field(outputs, |o| o.balance_b_b.clone()))?;
    let balance_o_a = select_balance(cs.namespace(|| "balance_o_a"), &selector, &field(outputs, |o| o.balance_o_a.clone()))?;
    let balance_o_b = select_balance(cs.namespace(|| "balance_o_b"), &selector, &field(outputs, |o| o.balance_o_b.clone()))?;
    let balance_p_a = select_balance(cs.namespace(|| "balance_p_a"), &selector, &field(outputs, |o| o.balance_p_a.clone()))?;
    let balance_p_b = select_balance(cs.namespace(|| "balance_p_b"), &selector, &field(outputs, |o| o.balance_p_b.clone()))?;
    let storage_a = select_storage(cs.namespace(|| "storage_a"), &selector, &field(outputs, |o| o.storage_a.clone()))?;
    let storage_b = select_storage(cs.namespace(|| "storage_b"), &selector, &field(outputs, |o| o.storage_b.clone()))?;

    let hash_a = math::array_select(cs.namespace(|| "hash_a"), &selector, &field(outputs, |o| o.hash_a.clone()))?;
    let hash_b = math::array_select(cs.namespace(|| "hash_b"), &selector, &field(outputs, |o| o.hash_b.clone()))?;
    let signature_required_a =
        select_boolean(cs.namespace(|| "signature_required_a"), &selector, &outputs.iter().map(|o| o.signature_required_a.clone()).collect::<Vec<_>>())?;
    let signature_required_b =
        select_boolean(cs.namespace(|| "signature_required_b"), &selector, &outputs.iter().map(|o| o.signature_required_b.clone()).collect::<Vec<_>>())?;
    let num_conditional_txs = math::array_select(cs.namespace(|| "num_conditional_txs"), &selector, &field(outputs, |o| o.num_conditional_txs.clone()))?;

    let padded_payloads: Vec<Vec<Boolean>> = outputs.iter().map(|o| padded(o.public_data.clone())).collect();
    let mut public_data = be_bits(cs.namespace(|| "tx type tag"), tx_type, NUM_BITS_TX_TYPE)?;
    for bit_index in 0..PAYLOAD_BITS {
        let candidates: Vec<Boolean> = padded_payloads.iter().map(|bits| bits[bit_index].clone()).collect();
        public_data.push(select_boolean(cs.namespace(|| format!("payload bit {bit_index}")), &selector, &candidates)?);
    }

    Ok(TxOutput {
        account_a,
        account_b,
        balance_a_s,
        balance_a_b,
        balance_b_s,
        balance_b_b,
        balance_o_a,
        balance_o_b,
        balance_p_a,
        balance_p_b,
        storage_a,
        storage_b,
        hash_a,
        hash_b,
        signature_required_a,
        signature_required_b,
        num_conditional_txs,
        public_data,
    })
}
