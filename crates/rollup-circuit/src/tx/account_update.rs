//! Account update: rotate an account's EdDSA public key
//! (`SPEC_FULL.md` §4.9, §4.6).

use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;

use super::{be_bits, LeafContext, TxOutput};
use crate::gadgets::field::Constants;
use crate::gadgets::signature::Point;
use crate::gadgets::{math, storage};

/// Account update payload, already allocated.
pub struct AccountUpdateData {
    /// The new public key.
    pub new_public_key: Point,
    /// Whether this update is on-chain-authorized rather than signed.
    pub conditional: bellman::gadgets::boolean::Boolean,
    /// The message hash the account's current owner signed over the new
    /// key, when not conditional.
    pub message_hash: AllocatedNum<Scalar>,
}

/// Build an account update's output.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    ctx: &LeafContext,
    data: &AccountUpdateData,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    let mut output = TxOutput::identity(cs.namespace(|| "identity"), ctx, num_conditional_txs_before, constants)?;

    output.account_a.public_key_x = data.new_public_key.u().clone();
    output.account_a.public_key_y = data.new_public_key.v().clone();

    let nonce_after = storage::increment_nonce(cs.namespace(|| "nonce + 1"), &ctx.account_a.nonce)?;
    output.account_a.nonce = math::ternary(
        cs.namespace(|| "nonce bump unless conditional"),
        &data.conditional,
        &ctx.account_a.nonce,
        &nonce_after,
    )?;

    output.hash_a = data.message_hash.clone();
    output.signature_required_a = data.conditional.not();

    let conditional_after = math::add(cs.namespace(|| "conditional + 1"), num_conditional_txs_before, &constants.one, 32)?;
    output.num_conditional_txs = math::ternary(
        cs.namespace(|| "bump conditional count"),
        &data.conditional,
        &conditional_after.packed,
        num_conditional_txs_before,
    )?;

    let mut public_data = be_bits(cs.namespace(|| "account id bits"), &ctx.account_a_id, 32)?;
    public_data.extend(data.new_public_key.compress(cs.namespace(|| "compress new key"))?);
    output.public_data = public_data;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::boolean::Boolean;
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;
    use group::Group;

    use super::{apply, AccountUpdateData};
    use crate::gadgets::signature::Point;
    use crate::tx::tests_support::{alloc, sample_context};

    // Any non-identity point is accepted by `Point::witness` (it only
    // rejects small-order points); the generator itself is audited and
    // known non-small-order, so it stands in for an arbitrary new key.
    fn some_key<CS: bellman::ConstraintSystem<Scalar>>(cs: CS) -> Point {
        let generator = jubjub::ExtendedPoint::from(jubjub::SubgroupPoint::generator());
        Point::witness(cs, Some(generator)).unwrap()
    }

    #[test]
    fn conditional_account_update_rotates_the_key_without_a_nonce_bump() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let new_key = some_key(cs.namespace(|| "new key"));
        let data = AccountUpdateData {
            new_public_key: new_key,
            conditional: Boolean::constant(true),
            message_hash: alloc(&mut cs, "hash", 0),
        };
        let output = apply(cs.namespace(|| "account update"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.account_a.public_key_x.get_value().unwrap(), data.new_public_key.u().get_value().unwrap());
        assert_eq!(output.account_a.nonce.get_value().unwrap(), ctx.account_a.nonce.get_value().unwrap());
        assert_eq!(output.signature_required_a.get_value(), Some(false));
        assert_eq!(output.num_conditional_txs.get_value().unwrap(), Scalar::from(1u64));
    }

    #[test]
    fn signed_account_update_bumps_the_nonce_and_requires_a_signature() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let new_key = some_key(cs.namespace(|| "new key"));
        let data = AccountUpdateData {
            new_public_key: new_key,
            conditional: Boolean::constant(false),
            message_hash: alloc(&mut cs, "hash", 42),
        };
        let output = apply(cs.namespace(|| "account update"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.account_a.nonce.get_value().unwrap(), Scalar::from(1u64));
        assert_eq!(output.signature_required_a.get_value(), Some(true));
        assert_eq!(output.hash_a.get_value().unwrap(), Scalar::from(42u64));
        assert_eq!(output.num_conditional_txs.get_value().unwrap(), Scalar::from(0u64));
    }
}
