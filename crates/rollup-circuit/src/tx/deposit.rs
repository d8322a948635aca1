//! Deposit: credit `amount` of a token to an account, creating it if its
//! leaf is empty (`SPEC_FULL.md` §4.9).

use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use rollup_core::constants::{FLOAT24_ENCODING, NUM_BITS_AMOUNT};

use super::{address_bits, be_bits, LeafContext, TxOutput};
use crate::gadgets::field::Constants;
use crate::gadgets::{float, math};
use crate::state::credit_balance;

/// Deposit payload, already allocated.
pub struct DepositData {
    /// On-chain owner address the deposit is credited to.
    pub owner: [u8; 20],
    /// Owner address as a field element, matching `owner`.
    pub owner_field: AllocatedNum<Scalar>,
    /// The deposit amount as it is committed to public data: a
    /// `FLOAT24_ENCODING`-packed field element. The exact on-chain
    /// amount is rounded down to the nearest representable float by
    /// the caller that builds this witness; what's credited here is
    /// the value this packing actually recovers.
    pub amount_packed: Option<Scalar>,
}

/// Build a deposit's output.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    ctx: &LeafContext,
    data: &DepositData,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    let mut output = TxOutput::identity(cs.namespace(|| "identity"), ctx, num_conditional_txs_before, constants)?;

    let owner_is_empty = math::equal(cs.namespace(|| "owner is empty"), &ctx.account_a.owner, &constants.zero)?;
    let owner_matches = math::equal(cs.namespace(|| "owner matches"), &ctx.account_a.owner, &data.owner_field)?;
    let owner_ok = math::boolean_or(cs.namespace(|| "new account or same owner"), &owner_is_empty, &owner_matches)?;
    math::require_true(cs.namespace(|| "valid owner"), &owner_ok)?;

    let amount = float::decode(cs.namespace(|| "decode amount"), data.amount_packed, FLOAT24_ENCODING)?;

    output.account_a.owner = data.owner_field.clone();
    output.balance_a_s = credit_balance(cs.namespace(|| "credit"), &ctx.balance_a_s, &amount.value, NUM_BITS_AMOUNT)?;

    let conditional_after = math::add(cs.namespace(|| "conditional + 1"), num_conditional_txs_before, &constants.one, 32)?;
    output.num_conditional_txs = conditional_after.packed;

    let mut amount_bits_be = amount.packed.bits.clone();
    amount_bits_be.reverse();

    let mut public_data = address_bits(data.owner);
    public_data.extend(be_bits(cs.namespace(|| "account id bits"), &ctx.account_a_id, 32)?);
    public_data.extend(be_bits(cs.namespace(|| "token id bits"), &ctx.token_a_s, 16)?);
    public_data.extend(amount_bits_be);
    output.public_data = public_data;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;
    use rollup_core::constants::FLOAT24_ENCODING;

    use super::{apply, DepositData};
    use crate::gadgets::float::pack_native;
    use crate::tx::tests_support::{alloc, sample_context};

    #[test]
    fn deposit_to_a_fresh_account_credits_the_balance() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (mut ctx, constants, num_conditional) = sample_context(&mut cs);
        ctx.account_a.owner = constants.zero.clone();
        let data = DepositData {
            owner: [7_u8; 20],
            owner_field: alloc(&mut cs, "owner field", 0x0707_0707),
            amount_packed: Some(pack_native(500, 0, FLOAT24_ENCODING)),
        };
        let output = apply(cs.namespace(|| "deposit"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.balance_a_s.balance.get_value().unwrap(), Scalar::from(1500u64));
        assert_eq!(output.num_conditional_txs.get_value().unwrap(), Scalar::from(1u64));
    }

    #[test]
    fn deposit_to_a_mismatched_owner_is_unsatisfiable() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let data = DepositData {
            owner: [9_u8; 20],
            owner_field: alloc(&mut cs, "owner field", 0x0909_0909),
            amount_packed: Some(pack_native(500, 0, FLOAT24_ENCODING)),
        };
        apply(cs.namespace(|| "deposit"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(!cs.is_satisfied());
    }
}
