//! No-op transaction: no state change, no signature, empty public data.

use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;

use super::{LeafContext, TxOutput};
use crate::gadgets::field::Constants;

/// Build a no-op's output: the identity, verbatim.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    cs: CS,
    ctx: &LeafContext,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    TxOutput::identity(cs, ctx, num_conditional_txs_before, constants)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;

    use super::apply;
    use crate::tx::tests_support::sample_context;

    #[test]
    fn noop_leaves_every_leaf_unchanged() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let output = apply(cs.namespace(|| "noop"), &ctx, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.account_a.owner.get_value(), ctx.account_a.owner.get_value());
        assert_eq!(output.public_data.len(), 0);
        assert_eq!(output.signature_required_a.get_value(), Some(false));
    }
}
