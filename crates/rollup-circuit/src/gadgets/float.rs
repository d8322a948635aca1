//! Compact float encoding/decoding (`SPEC_FULL.md` §4.1, §4.3).
//!
//! A float is `encoding.mantissa_bits` mantissa bits followed by
//! `encoding.exp_bits` exponent bits, packed least-significant-bit first.
//! Its value is `mantissa * base^exponent`. Decoding unpacks the bits
//! (already range-checked by [`DualVariable`]) and accumulates
//! `base^exponent` by repeated squaring, folding it into the mantissa only
//! where the corresponding exponent bit is set — the same ternary-fold
//! shape `array_select` uses, specialized to a running product instead of
//! a one-hot pick.

use bellman::gadgets::boolean::Boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, LinearCombination, SynthesisError};
use bls12_381::Scalar;
use ff::Field;
use rollup_core::constants::FloatEncoding;

use super::field::DualVariable;
use super::math;

/// A decoded float: its packed representation and recovered value.
pub struct DecodedFloat {
    /// The packed bit-string (mantissa bits, then exponent bits) and its
    /// packed field element — this is what appears on public data.
    pub packed: DualVariable,
    /// `mantissa * base^exponent`.
    pub value: AllocatedNum<Scalar>,
}

/// Decode a float of `encoding`'s shape from its packed field value.
pub fn decode<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    packed_value: Option<Scalar>,
    encoding: FloatEncoding,
) -> Result<DecodedFloat, SynthesisError> {
    let total_bits = encoding.mantissa_bits + encoding.exp_bits;
    let packed =
        DualVariable::alloc_from_field(cs.namespace(|| "packed bits"), packed_value, total_bits)?;

    let mantissa = pack_bits(cs.namespace(|| "mantissa"), &packed.bits, 0, encoding.mantissa_bits)?;

    let mut multiplier = math::constant(cs.namespace(|| "base^0"), Scalar::ONE)?;
    let mut base_power = Scalar::from(encoding.base);
    for i in 0..encoding.exp_bits {
        let bit = packed
            .bits
            .get(encoding.mantissa_bits + i)
            .ok_or(SynthesisError::Unsatisfiable)?;
        let scaled = math::scale(
            cs.namespace(|| format!("multiplier * base^(2^{i})")),
            &multiplier,
            base_power,
        )?;
        multiplier = math::ternary(
            cs.namespace(|| format!("apply exponent bit {i}")),
            bit,
            &scaled,
            &multiplier,
        )?;
        base_power = base_power.square();
    }

    let value = math::unsafe_mul(cs.namespace(|| "mantissa * base^exponent"), &mantissa, &multiplier)?;

    Ok(DecodedFloat { packed, value })
}

fn pack_bits<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    bits: &[Boolean],
    start: usize,
    len: usize,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let mut value = Some(Scalar::ZERO);
    let mut coeff = Scalar::ONE;
    let mut lc = LinearCombination::<Scalar>::zero();
    for i in start..start + len {
        let bit = bits.get(i).ok_or(SynthesisError::Unsatisfiable)?;
        lc = lc + &bit.lc(CS::one(), coeff);
        value = value
            .zip(bit.get_value())
            .map(|(acc, set)| if set { acc + coeff } else { acc });
        coeff = coeff.double();
    }
    let packed = AllocatedNum::alloc(cs.namespace(|| "packed"), || {
        value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    cs.enforce(
        || "packing",
        |_| lc,
        |lc| lc + CS::one(),
        |lc| lc + packed.get_variable(),
    );
    Ok(packed)
}

/// Find the `(mantissa, exponent)` pair of `encoding`'s shape whose
/// recovered value `mantissa * base^exponent` is the closest to `value`
/// from below, for use building witnesses off-circuit. `decode` then
/// re-derives the same value in-circuit from the packed bits this
/// produces.
#[must_use]
#[allow(
    clippy::arithmetic_side_effects,
    reason = "native witness search bounded by exp_bits <= 5, values fit u128 comfortably for base=10"
)]
pub fn encode_native(value: u128, encoding: FloatEncoding) -> (u128, u32) {
    let max_mantissa = (1u128 << encoding.mantissa_bits) - 1;
    let max_exponent = u32::try_from((1u64 << encoding.exp_bits) - 1).unwrap_or(u32::MAX);

    let mut best = (0u128, 0u32);
    let mut best_value = 0u128;
    for exponent in 0..=max_exponent {
        let Some(base_power) = u128::from(encoding.base).checked_pow(exponent) else {
            break;
        };
        if base_power == 0 {
            break;
        }
        let mantissa = (value / base_power).min(max_mantissa);
        let candidate = mantissa * base_power;
        if candidate > best_value {
            best_value = candidate;
            best = (mantissa, exponent);
        }
    }
    best
}

/// Pack a native `(mantissa, exponent)` pair into the field element that
/// `decode` expects as `packed_value`.
#[must_use]
pub fn pack_native(mantissa: u128, exponent: u32, encoding: FloatEncoding) -> Scalar {
    let exponent = u128::from(exponent);
    let shifted = exponent << encoding.mantissa_bits;
    super::field::scalar_from_u128(mantissa | shifted)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;
    use rollup_core::constants::FLOAT24_ENCODING;

    use super::{decode, encode_native, pack_native};

    #[test]
    fn encode_native_recovers_the_largest_value_not_exceeding_the_input() {
        let (mantissa, exponent) = encode_native(123_456_789, FLOAT24_ENCODING);
        let base_power = u128::from(FLOAT24_ENCODING.base).pow(exponent);
        let recovered = mantissa * base_power;
        assert!(recovered <= 123_456_789);
        assert!(mantissa < (1u128 << FLOAT24_ENCODING.mantissa_bits));
    }

    #[test]
    fn decode_matches_encode_native() {
        let (mantissa, exponent) = encode_native(999_999, FLOAT24_ENCODING);
        let packed = pack_native(mantissa, exponent, FLOAT24_ENCODING);

        let mut cs = TestConstraintSystem::<Scalar>::new();
        let decoded = decode(cs.namespace(|| "decode"), Some(packed), FLOAT24_ENCODING).unwrap();
        assert!(cs.is_satisfied());

        let base_power = u128::from(FLOAT24_ENCODING.base).pow(exponent);
        let expected = Scalar::from(u64::try_from(mantissa * base_power).unwrap());
        assert_eq!(decoded.value.get_value().unwrap(), expected);
    }

    #[test]
    fn decode_of_zero_is_zero() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let decoded = decode(cs.namespace(|| "decode"), Some(Scalar::ZERO), FLOAT24_ENCODING).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(decoded.value.get_value().unwrap(), Scalar::ZERO);
    }
}
