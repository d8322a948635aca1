//! Arithmetic, comparison, selection and boolean-algebra gadgets
//! (`SPEC_FULL.md` §4.2).
//!
//! Every comparison here is range-based: callers must supply the bit width
//! the compared values are already known (range-checked elsewhere) to fit
//! in. Comparing values wider than their stated bit width produces a
//! satisfiable but meaningless circuit, same as the original gadget set
//! this one is modeled on.

use bellman::gadgets::boolean::{AllocatedBit, Boolean};
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, LinearCombination, SynthesisError};
use bls12_381::Scalar;
use ff::Field;
use rollup_core::constants::Accuracy;

use super::field::{self, DualVariable};

/// `a + b`, with no bound on the result's width.
///
/// Safe to use only when the caller independently knows the sum cannot
/// wrap the field (e.g. it is immediately range-checked by the caller, as
/// [`add`] does).
pub fn unsafe_add<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let value = a.get_value().zip(b.get_value()).map(|(a, b)| a + b);
    let sum = AllocatedNum::alloc(cs.namespace(|| "sum"), || {
        value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    cs.enforce(
        || "a + b = sum",
        |lc| lc + a.get_variable() + b.get_variable(),
        |lc| lc + CS::one(),
        |lc| lc + sum.get_variable(),
    );
    Ok(sum)
}

/// `a - b`, with no bound on the result's width (may wrap modulo the
/// field if `b > a` as integers).
pub fn unsafe_sub<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let value = a.get_value().zip(b.get_value()).map(|(a, b)| a - b);
    let diff = AllocatedNum::alloc(cs.namespace(|| "difference"), || {
        value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    cs.enforce(
        || "a - b = diff",
        |lc| lc + a.get_variable() - b.get_variable(),
        |lc| lc + CS::one(),
        |lc| lc + diff.get_variable(),
    );
    Ok(diff)
}

/// `a * b`.
pub fn unsafe_mul<CS: ConstraintSystem<Scalar>>(
    cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    a.mul(cs, b)
}

/// `a + constant`.
pub fn add_constant<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    constant: Scalar,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let value = a.get_value().map(|v| v + constant);
    let result = AllocatedNum::alloc(cs.namespace(|| "a + constant"), || {
        value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    cs.enforce(
        || "a + constant = result",
        |lc| lc + a.get_variable() + (constant, CS::one()),
        |lc| lc + CS::one(),
        |lc| lc + result.get_variable(),
    );
    Ok(result)
}

/// Allocate a fixed, caller-known constant as a variable bound to it by
/// an equality constraint (so it can be multiplied/compared against like
/// any other wire).
pub fn constant<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    value: Scalar,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let num = AllocatedNum::alloc(cs.namespace(|| "constant"), || Ok(value))?;
    cs.enforce(
        || "is literal",
        |lc| lc + num.get_variable(),
        |lc| lc + CS::one(),
        |lc| lc + (value, CS::one()),
    );
    Ok(num)
}

/// `a * constant`.
pub fn scale<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    constant: Scalar,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let value = a.get_value().map(|v| v * constant);
    let result = AllocatedNum::alloc(cs.namespace(|| "a * constant"), || {
        value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    cs.enforce(
        || "a * constant = result",
        |lc| lc + a.get_variable(),
        |lc| lc + (constant, CS::one()),
        |lc| lc + result.get_variable(),
    );
    Ok(result)
}

/// `a + b`, range-checked to `num_bits`.
pub fn add<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<DualVariable, SynthesisError> {
    let sum = unsafe_add(cs.namespace(|| "unsafe sum"), a, b)?;
    let checked = DualVariable::alloc_from_field(cs.namespace(|| "range check"), sum.get_value(), num_bits)?;
    enforce_equal(cs.namespace(|| "sum == checked"), &sum, &checked.packed);
    Ok(checked)
}

/// `a - b`, range-checked to `num_bits` (so `b <= a` is implied: a result
/// that wrapped below zero would not fit the width).
pub fn sub<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<DualVariable, SynthesisError> {
    let diff = unsafe_sub(cs.namespace(|| "unsafe difference"), a, b)?;
    let checked = DualVariable::alloc_from_field(cs.namespace(|| "range check"), diff.get_value(), num_bits)?;
    enforce_equal(cs.namespace(|| "diff == checked"), &diff, &checked.packed);
    Ok(checked)
}

/// `if condition { if_true } else { if_false }`.
pub fn ternary<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    condition: &Boolean,
    if_true: &AllocatedNum<Scalar>,
    if_false: &AllocatedNum<Scalar>,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let value = match (condition.get_value(), if_true.get_value(), if_false.get_value()) {
        (Some(c), Some(t), Some(f)) => Some(if c { t } else { f }),
        _ => None,
    };
    let result = AllocatedNum::alloc(cs.namespace(|| "selected"), || {
        value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    cs.enforce(
        || "condition * (if_true - if_false) = selected - if_false",
        |_| condition.lc(CS::one(), Scalar::ONE),
        |lc| lc + if_true.get_variable() - if_false.get_variable(),
        |lc| lc + result.get_variable() - if_false.get_variable(),
    );
    Ok(result)
}

/// Enforce `a == b` as field elements.
pub fn enforce_equal<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
) {
    cs.enforce(
        || "a == b",
        |lc| lc + a.get_variable(),
        |lc| lc + CS::one(),
        |lc| lc + b.get_variable(),
    );
}

/// `a != 0`. Witnesses `a`'s inverse (or zero, when `a` is zero) and
/// constrains the boolean result both ways, the standard zero-test trick.
pub fn is_nonzero<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
) -> Result<Boolean, SynthesisError> {
    let inv_value = a
        .get_value()
        .map(|v| Option::from(v.invert()).unwrap_or(Scalar::ZERO));
    let inv = AllocatedNum::alloc(cs.namespace(|| "inverse"), || {
        inv_value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    let nonzero_value = a.get_value().map(|v| v != Scalar::ZERO);
    let nonzero = AllocatedBit::alloc(cs.namespace(|| "nonzero bit"), nonzero_value)?;

    cs.enforce(
        || "a * inv = nonzero",
        |lc| lc + a.get_variable(),
        |lc| lc + inv.get_variable(),
        |lc| lc + nonzero.get_variable(),
    );
    cs.enforce(
        || "a * (1 - nonzero) = 0",
        |lc| lc + a.get_variable(),
        |lc| lc + CS::one() - nonzero.get_variable(),
        |lc| lc,
    );

    Ok(Boolean::from(nonzero))
}

/// `a == b`.
pub fn equal<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
) -> Result<Boolean, SynthesisError> {
    let diff = unsafe_sub(cs.namespace(|| "a - b"), a, b)?;
    let nonzero = is_nonzero(cs.namespace(|| "diff nonzero"), &diff)?;
    Ok(nonzero.not())
}

/// `a OR b`, via De Morgan (`!(!a AND !b)`), matching a NAND-free gate
/// count of one.
pub fn boolean_or<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &Boolean,
    b: &Boolean,
) -> Result<Boolean, SynthesisError> {
    Ok(Boolean::and(cs.namespace(|| "not a and not b"), &a.not(), &b.not())?.not())
}

/// `a <= b`, where both are known to fit in `num_bits`.
///
/// Computes `shifted = (b - a) + 2^num_bits`, which lands in
/// `[2^num_bits, 2^(num_bits+1) - 1]` exactly when `a <= b`, and in
/// `[1, 2^num_bits - 1]` otherwise; the top bit of its `(num_bits + 1)`-bit
/// decomposition is the comparison result.
pub fn leq<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<Boolean, SynthesisError> {
    let shift = field::scalar_from_u128(1u128 << num_bits);
    let diff = unsafe_sub(cs.namespace(|| "b - a"), b, a)?;
    let shifted = add_constant(cs.namespace(|| "+ 2^num_bits"), &diff, shift)?;
    let decomposed = DualVariable::alloc_from_field(
        cs.namespace(|| "shifted bits"),
        shifted.get_value(),
        num_bits + 1,
    )?;
    enforce_equal(cs.namespace(|| "shifted == decomposed"), &shifted, &decomposed.packed);
    decomposed
        .bits
        .get(num_bits)
        .cloned()
        .ok_or(SynthesisError::Unsatisfiable)
}

/// `a < b`.
pub fn lt<CS: ConstraintSystem<Scalar>>(
    cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<Boolean, SynthesisError> {
    Ok(leq(cs, b, a, num_bits)?.not())
}

/// `a >= b`.
pub fn geq<CS: ConstraintSystem<Scalar>>(
    cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<Boolean, SynthesisError> {
    leq(cs, b, a, num_bits)
}

/// `a > b`.
pub fn gt<CS: ConstraintSystem<Scalar>>(
    cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<Boolean, SynthesisError> {
    Ok(leq(cs, a, b, num_bits)?.not())
}

/// Enforce `condition` is the constant `true`.
pub fn require_true<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    condition: &Boolean,
) -> Result<(), SynthesisError> {
    cs.enforce(
        || "require true",
        |_| condition.lc(CS::one(), Scalar::ONE),
        |lc| lc + CS::one(),
        |lc| lc + CS::one(),
    );
    Ok(())
}

/// Enforce `a <= b`.
pub fn require_leq<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<(), SynthesisError> {
    let ok = leq(cs.namespace(|| "a <= b"), a, b, num_bits)?;
    require_true(cs.namespace(|| "require"), &ok)
}

/// Enforce `a < b`.
pub fn require_lt<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<(), SynthesisError> {
    let ok = lt(cs.namespace(|| "a < b"), a, b, num_bits)?;
    require_true(cs.namespace(|| "require"), &ok)
}

/// Enforce `a != 0`.
pub fn require_not_zero<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
) -> Result<(), SynthesisError> {
    let ok = is_nonzero(cs.namespace(|| "a nonzero"), a)?;
    require_true(cs.namespace(|| "require"), &ok)
}

/// Enforce `a != b`.
pub fn require_not_equal<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
) -> Result<(), SynthesisError> {
    let diff = unsafe_sub(cs.namespace(|| "a - b"), a, b)?;
    require_not_zero(cs.namespace(|| "diff nonzero"), &diff)
}

/// Enforce `condition => consequence` (`condition * !consequence == 0`).
pub fn if_then_require<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    condition: &Boolean,
    consequence: &Boolean,
) -> Result<(), SynthesisError> {
    cs.enforce(
        || "condition implies consequence",
        |_| condition.lc(CS::one(), Scalar::ONE),
        |lc| lc + CS::one() - &consequence.lc(CS::one(), Scalar::ONE),
        |lc| lc,
    );
    Ok(())
}

/// `min(a, b)`.
pub fn min<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let a_leq_b = leq(cs.namespace(|| "a <= b"), a, b, num_bits)?;
    ternary(cs.namespace(|| "select"), &a_leq_b, a, b)
}

/// `max(a, b)`.
pub fn max<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    a: &AllocatedNum<Scalar>,
    b: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let a_leq_b = leq(cs.namespace(|| "a <= b"), a, b, num_bits)?;
    ternary(cs.namespace(|| "select"), &a_leq_b, b, a)
}

/// Enforce that exactly one bit of `bits` is set.
pub fn require_one_hot<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    bits: &[Boolean],
) -> Result<(), SynthesisError> {
    let mut sum = LinearCombination::<Scalar>::zero();
    for bit in bits {
        sum = sum + &bit.lc(CS::one(), Scalar::ONE);
    }
    cs.enforce(
        || "exactly one bit set",
        |lc| lc + &sum,
        |lc| lc + CS::one(),
        |lc| lc + CS::one(),
    );
    Ok(())
}

/// Decode an index into a one-hot selector of `count` bits: `bits[i]` is
/// set exactly when `index == i`.
pub fn selector_gadget<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    index: &AllocatedNum<Scalar>,
    count: usize,
) -> Result<Vec<Boolean>, SynthesisError> {
    let index_value = index.get_value().map(field::scalar_to_u128);
    let mut bits = Vec::with_capacity(count);
    for i in 0..count {
        let i_u128 = u128::try_from(i).unwrap_or(u128::MAX);
        let bit_value = index_value.map(|v| v == i_u128);
        let bit = AllocatedBit::alloc(cs.namespace(|| format!("selector bit {i}")), bit_value)?;
        bits.push(Boolean::from(bit));
    }
    require_one_hot(cs.namespace(|| "exactly one selected"), &bits)?;

    let mut weighted = LinearCombination::<Scalar>::zero();
    for (i, bit) in bits.iter().enumerate() {
        let coeff = Scalar::from(u64::try_from(i).unwrap_or(u64::MAX));
        weighted = weighted + &bit.lc(CS::one(), coeff);
    }
    cs.enforce(
        || "selector encodes index",
        |lc| lc + &weighted,
        |lc| lc + CS::one(),
        |lc| lc + index.get_variable(),
    );

    Ok(bits)
}

/// Select one of `values` by a one-hot `bits` selector (same length),
/// folding right-to-left: the rightmost value is the fallback, and each
/// earlier `ternary` overrides it with its own value when its bit is set.
/// Given the one-hot invariant exactly one override fires.
pub fn array_select<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    bits: &[Boolean],
    values: &[AllocatedNum<Scalar>],
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    if bits.len() != values.len() || bits.is_empty() {
        return Err(SynthesisError::Unsatisfiable);
    }
    require_one_hot(cs.namespace(|| "one-hot selector"), bits)?;

    let mut pairs = bits.iter().zip(values.iter()).enumerate().rev();
    let (_, (_, last_value)) = pairs.next().ok_or(SynthesisError::Unsatisfiable)?;
    let mut acc = last_value.clone();
    for (i, (bit, value)) in pairs {
        acc = ternary(cs.namespace(|| format!("select {i}")), bit, value, &acc)?;
    }
    Ok(acc)
}

/// Witnessed `value * numerator / denominator`, with remainder, enforced
/// by cross-multiplication (`value * numerator == quotient * denominator
/// + remainder`) plus `remainder < denominator`.
pub struct MulDivResult {
    /// `floor(value * numerator / denominator)`, range-checked to
    /// `value_bits + numerator_bits`.
    pub quotient: DualVariable,
    /// `(value * numerator) mod denominator`, range-checked to
    /// `denominator_bits`.
    pub remainder: DualVariable,
}

#[allow(
    clippy::arithmetic_side_effects,
    reason = "witness-only u128 math over values already bounded well under 128 bits by their declared bit widths"
)]
pub fn mul_div<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    value: &AllocatedNum<Scalar>,
    numerator: &AllocatedNum<Scalar>,
    denominator: &AllocatedNum<Scalar>,
    value_bits: usize,
    numerator_bits: usize,
    denominator_bits: usize,
) -> Result<MulDivResult, SynthesisError> {
    require_not_zero(cs.namespace(|| "denominator nonzero"), denominator)?;

    let witness = match (value.get_value(), numerator.get_value(), denominator.get_value()) {
        (Some(v), Some(n), Some(d)) => {
            let v = field::scalar_to_u128(v);
            let n = field::scalar_to_u128(n);
            let d = field::scalar_to_u128(d);
            let product = v * n;
            Some((product / d, product % d))
        }
        _ => None,
    };

    let quotient = DualVariable::alloc_from_value(
        cs.namespace(|| "quotient"),
        witness.map(|(q, _)| q),
        value_bits + numerator_bits,
    )?;
    let remainder = DualVariable::alloc_from_value(
        cs.namespace(|| "remainder"),
        witness.map(|(_, r)| r),
        denominator_bits,
    )?;

    let product = unsafe_mul(cs.namespace(|| "value * numerator"), value, numerator)?;
    let quotient_times_denominator =
        unsafe_mul(cs.namespace(|| "quotient * denominator"), &quotient.packed, denominator)?;
    let reconstructed = unsafe_add(
        cs.namespace(|| "quotient * denominator + remainder"),
        &quotient_times_denominator,
        &remainder.packed,
    )?;
    enforce_equal(cs.namespace(|| "product == reconstructed"), &product, &reconstructed);

    require_lt(
        cs.namespace(|| "remainder < denominator"),
        &remainder.packed,
        denominator,
        denominator_bits,
    )?;

    Ok(MulDivResult { quotient, remainder })
}

/// Enforce that `decoded` (a float round-trip of `original`) is within
/// `accuracy`: `decoded <= original` and `original * accuracy.num <=
/// decoded * accuracy.den`.
pub fn require_accuracy<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    original: &AllocatedNum<Scalar>,
    decoded: &AllocatedNum<Scalar>,
    accuracy: Accuracy,
    num_bits: usize,
) -> Result<(), SynthesisError> {
    require_leq(cs.namespace(|| "decoded <= original"), decoded, original, num_bits)?;

    let lhs = scale(cs.namespace(|| "original * accuracy.num"), original, Scalar::from(accuracy.num))?;
    let rhs = scale(cs.namespace(|| "decoded * accuracy.den"), decoded, Scalar::from(accuracy.den))?;
    require_leq(
        cs.namespace(|| "original * num <= decoded * den"),
        &lhs,
        &rhs,
        num_bits + 20,
    )
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::boolean::{AllocatedBit, Boolean};
    use bellman::gadgets::num::AllocatedNum;
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;
    use rollup_core::constants::FLOAT24_ACCURACY;

    use super::{
        array_select, equal, is_nonzero, leq, lt, mul_div, require_accuracy, require_not_equal,
        selector_gadget, ternary,
    };

    fn alloc(cs: &mut TestConstraintSystem<Scalar>, name: &'static str, value: u64) -> AllocatedNum<Scalar> {
        AllocatedNum::alloc(cs.namespace(|| name), || Ok(Scalar::from(value))).unwrap()
    }

    #[test]
    fn ternary_picks_the_right_branch() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let a = alloc(&mut cs, "a", 11);
        let b = alloc(&mut cs, "b", 22);
        let bit = AllocatedBit::alloc(cs.namespace(|| "cond"), Some(true)).unwrap();
        let selected = ternary(cs.namespace(|| "select"), &Boolean::from(bit), &a, &b).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(selected.get_value().unwrap(), Scalar::from(11u64));
    }

    #[test]
    fn leq_and_lt_agree_with_integer_comparison() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let a = alloc(&mut cs, "a", 5);
        let b = alloc(&mut cs, "b", 9);
        let le = leq(cs.namespace(|| "5 <= 9"), &a, &b, 8).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(le.get_value(), Some(true));

        let less = lt(cs.namespace(|| "5 < 9"), &a, &b, 8).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(less.get_value(), Some(true));

        let not_le = leq(cs.namespace(|| "9 <= 5"), &b, &a, 8).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(not_le.get_value(), Some(false));
    }

    #[test]
    fn is_nonzero_detects_zero_and_nonzero() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let zero = alloc(&mut cs, "zero", 0);
        let nonzero = alloc(&mut cs, "nonzero", 7);
        assert_eq!(
            is_nonzero(cs.namespace(|| "zero"), &zero).unwrap().get_value(),
            Some(false)
        );
        assert_eq!(
            is_nonzero(cs.namespace(|| "nonzero"), &nonzero).unwrap().get_value(),
            Some(true)
        );
        assert!(cs.is_satisfied());
    }

    #[test]
    fn equal_and_require_not_equal_are_consistent() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let a = alloc(&mut cs, "a", 3);
        let b = alloc(&mut cs, "b", 3);
        let eq = equal(cs.namespace(|| "a == b"), &a, &b).unwrap();
        assert_eq!(eq.get_value(), Some(true));
        assert!(cs.is_satisfied());

        let c = alloc(&mut cs, "c", 4);
        require_not_equal(cs.namespace(|| "a != c"), &a, &c).unwrap();
        assert!(cs.is_satisfied());
    }

    #[test]
    fn mul_div_matches_integer_arithmetic() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let value = alloc(&mut cs, "value", 1000);
        let numerator = alloc(&mut cs, "numerator", 3);
        let denominator = alloc(&mut cs, "denominator", 7);
        let result = mul_div(cs.namespace(|| "muldiv"), &value, &numerator, &denominator, 32, 32, 32).unwrap();
        assert!(cs.is_satisfied());
        // 1000 * 3 = 3000; 3000 / 7 = 428 remainder 4.
        assert_eq!(result.quotient.packed.get_value().unwrap(), Scalar::from(428u64));
        assert_eq!(result.remainder.packed.get_value().unwrap(), Scalar::from(4u64));
    }

    #[test]
    fn require_accuracy_accepts_a_tight_float_round_trip() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let original = alloc(&mut cs, "original", 100_000);
        let decoded = alloc(&mut cs, "decoded", 99_999);
        require_accuracy(cs.namespace(|| "accuracy"), &original, &decoded, FLOAT24_ACCURACY, 32).unwrap();
        assert!(cs.is_satisfied());
    }

    #[test]
    fn selector_gadget_produces_expected_one_hot_vector() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let index = alloc(&mut cs, "index", 2);
        let bits = selector_gadget(cs.namespace(|| "selector"), &index, 4).unwrap();
        assert!(cs.is_satisfied());
        let values: Vec<bool> = bits.iter().map(|b| b.get_value().unwrap()).collect();
        assert_eq!(values, vec![false, false, true, false]);
    }

    #[test]
    fn array_select_returns_the_one_hot_selected_value() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let index = alloc(&mut cs, "index", 1);
        let bits = selector_gadget(cs.namespace(|| "selector"), &index, 3).unwrap();
        let values = vec![alloc(&mut cs, "v0", 10), alloc(&mut cs, "v1", 20), alloc(&mut cs, "v2", 30)];
        let selected = array_select(cs.namespace(|| "select"), &bits, &values).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(selected.get_value().unwrap(), Scalar::from(20u64));
    }
}
