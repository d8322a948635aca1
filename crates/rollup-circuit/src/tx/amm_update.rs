//! AMM pool update: rewrite an account's AMM fee and a balance's AMM
//! weight (`SPEC_FULL.md` §4.9). Always conditional: there is no owner
//! key to sign over a pool's own parameters, so the operator posts this
//! kind unilaterally and it always counts toward the conditional-tx total.

use bellman::gadgets::boolean::Boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;

use super::{be_bits, LeafContext, TxOutput};
use crate::gadgets::field::Constants;
use crate::gadgets::math;

/// AMM update payload, already allocated.
pub struct AmmUpdateData {
    /// New AMM pool fee, in basis points.
    pub fee_bips_amm: AllocatedNum<Scalar>,
    /// New AMM weight for the account's primary-token balance.
    pub weight_amm: AllocatedNum<Scalar>,
}

/// Build an AMM update's output.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    ctx: &LeafContext,
    data: &AmmUpdateData,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    let mut output = TxOutput::identity(cs.namespace(|| "identity"), ctx, num_conditional_txs_before, constants)?;

    output.account_a.fee_bips_amm = data.fee_bips_amm.clone();
    output.balance_a_s.weight_amm = data.weight_amm.clone();

    output.signature_required_a = Boolean::constant(false);
    output.signature_required_b = Boolean::constant(false);

    output.num_conditional_txs =
        math::add(cs.namespace(|| "conditional + 1"), num_conditional_txs_before, &constants.one, 32)?.packed;

    let mut public_data = be_bits(cs.namespace(|| "account id bits"), &ctx.account_a_id, 32)?;
    public_data.extend(be_bits(cs.namespace(|| "fee bips bits"), &data.fee_bips_amm, 16)?);
    public_data.extend(be_bits(cs.namespace(|| "weight bits"), &data.weight_amm, 96)?);
    output.public_data = public_data;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;

    use super::{apply, AmmUpdateData};
    use crate::tx::tests_support::{alloc, sample_context};

    #[test]
    fn amm_update_writes_fee_and_weight_and_is_always_conditional() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let data = AmmUpdateData {
            fee_bips_amm: alloc(&mut cs, "fee_bips_amm", 25),
            weight_amm: alloc(&mut cs, "weight_amm", 12_345),
        };
        let output = apply(cs.namespace(|| "amm update"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.account_a.fee_bips_amm.get_value().unwrap(), Scalar::from(25u64));
        assert_eq!(output.balance_a_s.weight_amm.get_value().unwrap(), Scalar::from(12_345u64));
        assert_eq!(output.signature_required_a.get_value(), Some(false));
        assert_eq!(output.signature_required_b.get_value(), Some(false));
        assert_eq!(output.num_conditional_txs.get_value().unwrap(), Scalar::from(1u64));
    }
}
