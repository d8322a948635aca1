//! EdDSA-over-Poseidon signature verification, and public-key
//! (de)compression (`SPEC_FULL.md` §4.6).
//!
//! Public keys and the signature's `R` point are witnessed directly as
//! `sapling::circuit::ecc::EdwardsPoint`s — the same curve-membership
//! witnessing the teacher circuit uses for `ak`/`g_d` — so "compressing" a
//! public key is exactly `EdwardsPoint::repr`, the library's own
//! sign-bit-plus-`v`-coordinate encoding; no separate square-root gadget
//! is needed.
//!
//! The scheme itself is a Schnorr-style signature over the twisted
//! Edwards curve: given a fixed base point `B`, secret scalar `sk` and
//! public key `A = [sk] B`, a signature on `message` is `(R, S)` with
//! `R = [r] B`, `c = Poseidon(R.u, R.v, A.u, A.v, message)`, `S = r + c *
//! sk`. Verification checks `[S] B == R + [c] A`. `B` is this workspace's
//! only audited fixed generator, `sapling`'s `SPENDING_KEY_GENERATOR`;
//! reusing it here is a deliberate, disclosed choice (`DESIGN.md`).

use bellman::gadgets::boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use ff::PrimeField;
use sapling::circuit::constants::SPENDING_KEY_GENERATOR;
use sapling::circuit::ecc;

use super::{math, poseidon};

/// A witnessed, curve-checked public key or signature point.
pub struct Point {
    inner: ecc::EdwardsPoint,
}

impl Point {
    /// Witness a point, constraining it onto the curve and rejecting
    /// small-order points (the same defense-in-depth check the teacher
    /// circuit applies to `ak`).
    pub fn witness<CS: ConstraintSystem<Scalar>>(
        mut cs: CS,
        value: Option<jubjub::ExtendedPoint>,
    ) -> Result<Self, SynthesisError> {
        let inner = ecc::EdwardsPoint::witness(cs.namespace(|| "point"), value)?;
        inner.assert_not_small_order(cs.namespace(|| "not small order"))?;
        Ok(Self { inner })
    }

    /// The curve's `u` (affine x) coordinate.
    #[must_use]
    pub fn u(&self) -> &AllocatedNum<Scalar> {
        self.inner.get_u()
    }

    /// The curve's `v` (affine y) coordinate.
    #[must_use]
    pub fn v(&self) -> &AllocatedNum<Scalar> {
        self.inner.get_v()
    }

    /// The point's compressed bit representation (sign of `u` packed
    /// with `v`), the form a public key is posted to public data in.
    pub fn compress<CS: ConstraintSystem<Scalar>>(&self, cs: CS) -> Result<Vec<boolean::Boolean>, SynthesisError> {
        self.inner.repr(cs)
    }
}

/// Verify `signature` is a valid EdDSA-over-Poseidon signature by
/// `public_key` over `message`.
///
/// `s` is the signature's scalar component, witnessed directly as a
/// `jubjub::Fr` (the curve's scalar field) rather than recovered from a
/// `bls12_381::Scalar`, since it is generated and used purely as a
/// scalar-multiplication exponent.
pub fn verify<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    public_key: &Point,
    r: &Point,
    s: Option<jubjub::Fr>,
    message: &AllocatedNum<Scalar>,
) -> Result<(), SynthesisError> {
    let challenge = poseidon::hash_circuit(
        cs.namespace(|| "challenge"),
        &[r.u().clone(), r.v().clone(), public_key.u().clone(), public_key.v().clone(), message.clone()],
    )?;

    // Truncate to the scalar field's capacity so the bit string
    // unambiguously represents one jubjub::Fr value, mirroring how the
    // teacher circuit drops bits off a BLAKE2s digest before using it as
    // a scalar multiplier.
    let capacity = usize::try_from(jubjub::Fr::CAPACITY).map_err(|_| SynthesisError::Unsatisfiable)?;
    let mut challenge_bits = boolean::field_into_boolean_vec_le(cs.namespace(|| "challenge bits"), challenge.get_value())?;
    challenge_bits.truncate(capacity);

    let c_times_a = public_key.inner.mul(cs.namespace(|| "c * A"), &challenge_bits)?;
    let rhs = r.inner.add(cs.namespace(|| "R + c * A"), &c_times_a)?;

    let s_bits = boolean::field_into_boolean_vec_le(cs.namespace(|| "s bits"), s)?;
    let lhs = ecc::fixed_base_multiplication(cs.namespace(|| "s * B"), &SPENDING_KEY_GENERATOR, &s_bits)?;

    math::enforce_equal(cs.namespace(|| "u matches"), lhs.get_u(), rhs.get_u());
    math::enforce_equal(cs.namespace(|| "v matches"), lhs.get_v(), rhs.get_v());
    Ok(())
}

/// Verify a signature only when `required`; otherwise the signature is
/// still checked, but over the constant `0` rather than `message` — the
/// witness is free to supply any once-computed valid signature over `0`
/// in that case, so a transaction that doesn't need sign-off never has
/// to fabricate one over its real contents.
pub fn verify_if_required<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    required: &bellman::gadgets::boolean::Boolean,
    public_key: &Point,
    r: &Point,
    s: Option<jubjub::Fr>,
    message: &AllocatedNum<Scalar>,
    zero: &AllocatedNum<Scalar>,
) -> Result<(), SynthesisError> {
    let effective_message = math::ternary(cs.namespace(|| "effective message"), required, message, zero)?;
    verify(cs.namespace(|| "verify"), public_key, r, s, &effective_message)
}

#[cfg(test)]
mod tests {
    use super::Point;

    #[test]
    fn witnessing_the_identity_point_is_rejected_as_small_order() {
        use bellman::gadgets::test::TestConstraintSystem;
        use bls12_381::Scalar;

        let mut cs = TestConstraintSystem::<Scalar>::new();
        let identity = jubjub::ExtendedPoint::identity();
        Point::witness(cs.namespace(|| "identity"), Some(identity)).unwrap();
        assert!(!cs.is_satisfied());
    }
}
