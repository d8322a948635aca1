//! Withdrawal: debit `amount` of a token from an account, in one of four
//! sub-kinds (`SPEC_FULL.md` §4.9).
//!
//! Types 1-3 are forced withdrawals an operator posts on an account's
//! behalf without its signature; the nonce/storage write every signed
//! (type 0, user-initiated) withdrawal otherwise makes
//! ([`storage::consume_nonce`]) is skipped for them, matching the
//! deposit/AMM-update treatment of operator-driven state changes.

use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use rollup_core::constants::{withdrawal_type, FLOAT24_ENCODING, NUM_BITS_AMOUNT, NUM_BITS_TX_TYPE};

use super::{address_bits, be_bits, LeafContext, TxOutput};
use crate::gadgets::field::Constants;
use crate::gadgets::{float, math, storage};
use crate::state::debit_balance;

/// Withdrawal payload, already allocated.
pub struct WithdrawalData {
    /// The sub-kind, `0..=3` (`withdrawal_type`).
    pub withdrawal_type: AllocatedNum<Scalar>,
    /// Storage slot consumed as this withdrawal's replay nonce, when
    /// `withdrawal_type == USER`.
    pub storage_id: AllocatedNum<Scalar>,
    /// On-chain address the withdrawal is debited from.
    pub owner: [u8; 20],
    /// The amount debited, `FLOAT24_ENCODING`-packed, as it is posted to
    /// public data.
    pub amount_packed: Option<Scalar>,
    /// The message hash this withdrawal's owner signed, when
    /// `withdrawal_type == 0`.
    pub message_hash: AllocatedNum<Scalar>,
}

/// Build a withdrawal's output.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    ctx: &LeafContext,
    data: &WithdrawalData,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    let mut output = TxOutput::identity(cs.namespace(|| "identity"), ctx, num_conditional_txs_before, constants)?;

    let user_type = math::constant(cs.namespace(|| "user type"), Scalar::from(u64::from(withdrawal_type::USER)))?;
    let valid_full_type =
        math::constant(cs.namespace(|| "valid-full type"), Scalar::from(u64::from(withdrawal_type::VALID_FULL)))?;
    let invalid_full_type =
        math::constant(cs.namespace(|| "invalid-full type"), Scalar::from(u64::from(withdrawal_type::INVALID_FULL)))?;

    let is_user = math::equal(cs.namespace(|| "is user-initiated"), &data.withdrawal_type, &user_type)?;
    let is_valid_full = math::equal(cs.namespace(|| "is valid-full"), &data.withdrawal_type, &valid_full_type)?;
    let is_invalid_full = math::equal(cs.namespace(|| "is invalid-full"), &data.withdrawal_type, &invalid_full_type)?;

    let decoded = float::decode(cs.namespace(|| "decode amount"), data.amount_packed, FLOAT24_ENCODING)?;

    // Type 2 forces the full balance, type 3 forces zero; every other
    // type's amount is taken as-is.
    let required_amount = math::ternary(
        cs.namespace(|| "required for valid-full"),
        &is_valid_full,
        &ctx.balance_a_s.balance,
        &decoded.value,
    )?;
    let required_amount = math::ternary(
        cs.namespace(|| "required for invalid-full"),
        &is_invalid_full,
        &constants.zero,
        &required_amount,
    )?;
    math::enforce_equal(cs.namespace(|| "amount matches the forced kind"), &decoded.value, &required_amount);

    output.balance_a_s = debit_balance(cs.namespace(|| "debit"), &ctx.balance_a_s, &decoded.value, NUM_BITS_AMOUNT)?;

    let nonce = storage::consume_nonce(
        cs.namespace(|| "consume replay nonce"),
        &is_user,
        &data.storage_id,
        &ctx.storage_a.storage_id,
        &ctx.storage_a.data,
        constants,
    )?;
    output.storage_a.storage_id = nonce.storage_id_after;
    output.storage_a.data = nonce.data_after;

    // Forced kinds (1-3) skip the nonce/storage write above (gated on
    // `is_user`); they instead bump the conditional-tx count.
    let is_forced = math::boolean_or(cs.namespace(|| "forced kind"), &is_valid_full, &is_invalid_full)?;
    let is_forced = math::boolean_or(cs.namespace(|| "forced kind (incl. conditional)"), &is_forced, &is_user.not())?;
    let conditional_after = math::add(cs.namespace(|| "conditional + 1"), num_conditional_txs_before, &constants.one, 32)?;
    output.num_conditional_txs = math::ternary(
        cs.namespace(|| "bump conditional count when forced"),
        &is_forced,
        &conditional_after.packed,
        num_conditional_txs_before,
    )?;

    output.hash_a = data.message_hash.clone();
    output.signature_required_a = is_user.clone();

    let mut public_data = be_bits(cs.namespace(|| "type bits"), &data.withdrawal_type, NUM_BITS_TX_TYPE)?;
    public_data.extend(address_bits(data.owner));
    public_data.extend(be_bits(cs.namespace(|| "account id bits"), &ctx.account_a_id, 32)?);
    public_data.extend(be_bits(cs.namespace(|| "token id bits"), &ctx.token_a_s, 16)?);
    let mut amount_bits_be = decoded.packed.bits.clone();
    amount_bits_be.reverse();
    public_data.extend(amount_bits_be);
    output.public_data = public_data;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;
    use rollup_core::constants::{withdrawal_type, FLOAT24_ENCODING};

    use super::{apply, WithdrawalData};
    use crate::gadgets::float::pack_native;
    use crate::tx::tests_support::{alloc, sample_context};

    fn data(kind: u8, amount: u64, cs: &mut TestConstraintSystem<Scalar>) -> WithdrawalData {
        WithdrawalData {
            withdrawal_type: alloc(cs, "type", u64::from(kind)),
            storage_id: alloc(cs, "storage_id", 0),
            owner: [3_u8; 20],
            amount_packed: Some(pack_native(u128::from(amount), 0, FLOAT24_ENCODING)),
            message_hash: alloc(cs, "hash", 0),
        }
    }

    #[test]
    fn user_withdrawal_debits_and_requires_a_signature() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let data = data(withdrawal_type::USER, 400, &mut cs);
        let output = apply(cs.namespace(|| "withdrawal"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.balance_a_s.balance.get_value().unwrap(), Scalar::from(600u64));
        assert_eq!(output.signature_required_a.get_value(), Some(true));
        assert_eq!(output.num_conditional_txs.get_value().unwrap(), Scalar::from(0u64));
    }

    #[test]
    fn valid_full_withdrawal_forces_the_whole_balance() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let data = data(withdrawal_type::VALID_FULL, 1000, &mut cs);
        let output = apply(cs.namespace(|| "withdrawal"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.balance_a_s.balance.get_value().unwrap(), Scalar::from(0u64));
        assert_eq!(output.signature_required_a.get_value(), Some(false));
        assert_eq!(output.num_conditional_txs.get_value().unwrap(), Scalar::from(1u64));
    }

    #[test]
    fn valid_full_withdrawal_of_the_wrong_amount_is_unsatisfiable() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let data = data(withdrawal_type::VALID_FULL, 400, &mut cs);
        apply(cs.namespace(|| "withdrawal"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(!cs.is_satisfied());
    }

    #[test]
    fn invalid_full_withdrawal_forces_zero() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let data = data(withdrawal_type::INVALID_FULL, 0, &mut cs);
        let output = apply(cs.namespace(|| "withdrawal"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.balance_a_s.balance.get_value().unwrap(), Scalar::from(1000u64));
    }
}
