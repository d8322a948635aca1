//! Dual variables (packed field element + bit decomposition), range
//! checks, and a named-constants gadget (`SPEC_FULL.md` §4.1).

use bellman::gadgets::boolean::{AllocatedBit, Boolean};
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use ff::{Field, PrimeField};

/// A field element paired with its little-endian bit decomposition.
///
/// Packing is enforced by `Sum(bit_i * 2^i) == packed`; each bit is
/// boolean-constrained by its `AllocatedBit` allocation. Constructing one
/// of a fixed width is how every "range-checked to N bits" value in this
/// library is produced.
#[derive(Clone)]
pub struct DualVariable {
    /// The packed field element.
    pub packed: AllocatedNum<Scalar>,
    /// Little-endian bits, `bits[0]` is the least significant.
    pub bits: Vec<Boolean>,
}

impl DualVariable {
    /// Allocate a dual variable of `num_bits` width from a known `u128`
    /// value (witness generation) or `None` (verifying-key synthesis).
    pub fn alloc_from_value<CS: ConstraintSystem<Scalar>>(
        mut cs: CS,
        value: Option<u128>,
        num_bits: usize,
    ) -> Result<Self, SynthesisError> {
        let mut bits = Vec::with_capacity(num_bits);
        for i in 0..num_bits {
            let bit_value = value.map(|v| (v >> i) & 1 == 1);
            let bit = AllocatedBit::alloc(cs.namespace(|| format!("bit {i}")), bit_value)?;
            bits.push(Boolean::from(bit));
        }
        let packed_value = value.map(scalar_from_u128);
        Self::from_bits(cs, bits, packed_value)
    }

    /// Allocate a dual variable from an already-known field element and
    /// fresh bits, enforcing the packing constraint against it.
    ///
    /// Used when the unpacked value is itself the output of a prior
    /// computation (e.g. a `MulDiv` quotient) rather than raw witness
    /// input.
    pub fn alloc_from_field<CS: ConstraintSystem<Scalar>>(
        mut cs: CS,
        value: Option<Scalar>,
        num_bits: usize,
    ) -> Result<Self, SynthesisError> {
        let bit_values: Option<Vec<bool>> = value.map(le_bits);
        let mut bits = Vec::with_capacity(num_bits);
        for i in 0..num_bits {
            let bit_value = bit_values.as_ref().map(|bs| *bs.get(i).unwrap_or(&false));
            let bit = AllocatedBit::alloc(cs.namespace(|| format!("bit {i}")), bit_value)?;
            bits.push(Boolean::from(bit));
        }
        Self::from_bits(cs, bits, value)
    }

    fn from_bits<CS: ConstraintSystem<Scalar>>(
        mut cs: CS,
        bits: Vec<Boolean>,
        packed_value: Option<Scalar>,
    ) -> Result<Self, SynthesisError> {
        let packed = AllocatedNum::alloc(cs.namespace(|| "packed"), || {
            packed_value.ok_or(SynthesisError::AssignmentMissing)
        })?;

        cs.enforce(
            || "packing",
            |lc| {
                let mut lc = lc;
                let mut coeff = Scalar::ONE;
                for bit in &bits {
                    lc = lc + &bit.lc(CS::one(), coeff);
                    coeff = coeff.double();
                }
                lc
            },
            |lc| lc + CS::one(),
            |lc| lc + packed.get_variable(),
        );

        Ok(Self { packed, bits })
    }
}

/// Convert a `u128` into its scalar-field representative.
///
/// `bls12_381::Scalar` has no native `From<u128>`, so the value is split
/// into two 64-bit limbs and handed to `Scalar::from_raw` directly.
#[allow(
    clippy::as_conversions,
    reason = "truncating casts below are masked to exactly 64 bits first"
)]
pub(crate) fn scalar_from_u128(value: u128) -> Scalar {
    let lo = (value & u128::from(u64::MAX)) as u64;
    let hi = (value >> 64) as u64;
    Scalar::from_raw([lo, hi, 0, 0])
}

/// Recover a `u128` from a scalar known to represent a value narrower than
/// 128 bits (every amount, id and fee in this circuit is).
///
/// Only the low 16 bytes of the canonical little-endian representation are
/// read; callers must not use this on an unconstrained or wide field value.
pub(crate) fn scalar_to_u128(value: Scalar) -> u128 {
    let repr = value.to_repr();
    let bytes: &[u8] = repr.as_ref();
    let mut buf = [0u8; 16];
    for (dst, src) in buf.iter_mut().zip(bytes.iter()) {
        *dst = *src;
    }
    u128::from_le_bytes(buf)
}

fn le_bits(value: Scalar) -> Vec<bool> {
    let repr = value.to_repr();
    let bytes: &[u8] = repr.as_ref();
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes {
        for i in 0..8 {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    bits
}

/// Named field constants, allocated once per circuit instance and shared
/// by every gadget that needs a literal (`SPEC_FULL.md` §3 table).
pub struct Constants {
    /// The constant `0`.
    pub zero: AllocatedNum<Scalar>,
    /// The constant `1`.
    pub one: AllocatedNum<Scalar>,
    /// The constant `1000`.
    pub c1000: AllocatedNum<Scalar>,
    /// The constant `1001`.
    pub c1001: AllocatedNum<Scalar>,
    /// The constant `10000`.
    pub c10000: AllocatedNum<Scalar>,
    /// The constant `100000`.
    pub c100000: AllocatedNum<Scalar>,
    /// `2^14`, the number of storage slots per balance.
    pub num_storage_slots: AllocatedNum<Scalar>,
}

impl Constants {
    /// Allocate every named constant, binding each to its literal value
    /// via a dedicated equality constraint (so downstream gadgets can
    /// multiply/compare against a variable instead of an inline literal).
    pub fn alloc<CS: ConstraintSystem<Scalar>>(mut cs: CS) -> Result<Self, SynthesisError> {
        let zero = Self::alloc_literal(cs.namespace(|| "zero"), 0)?;
        let one = Self::alloc_literal(cs.namespace(|| "one"), 1)?;
        let c1000 = Self::alloc_literal(cs.namespace(|| "1000"), 1000)?;
        let c1001 = Self::alloc_literal(cs.namespace(|| "1001"), 1001)?;
        let c10000 = Self::alloc_literal(cs.namespace(|| "10000"), 10000)?;
        let c100000 = Self::alloc_literal(cs.namespace(|| "100000"), 100_000)?;
        let num_storage_slots = Self::alloc_literal(
            cs.namespace(|| "num_storage_slots"),
            rollup_core::constants::NUM_STORAGE_SLOTS,
        )?;
        Ok(Self {
            zero,
            one,
            c1000,
            c1001,
            c10000,
            c100000,
            num_storage_slots,
        })
    }

    fn alloc_literal<CS: ConstraintSystem<Scalar>>(
        mut cs: CS,
        literal: u64,
    ) -> Result<AllocatedNum<Scalar>, SynthesisError> {
        let value = Scalar::from(literal);
        let num = AllocatedNum::alloc(cs.namespace(|| "value"), || Ok(value))?;
        cs.enforce(
            || "is literal",
            |lc| lc + num.get_variable(),
            |lc| lc + CS::one(),
            |lc| lc + (value, CS::one()),
        );
        Ok(num)
    }
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::test::TestConstraintSystem;

    use super::{Constants, DualVariable};

    #[test]
    fn dual_variable_packs_to_expected_value() {
        let mut cs = TestConstraintSystem::<bls12_381::Scalar>::new();
        let dv = DualVariable::alloc_from_value(cs.namespace(|| "v"), Some(0b1011), 8).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(dv.packed.get_value().unwrap(), bls12_381::Scalar::from(11u64));
        assert_eq!(dv.bits.len(), 8);
    }

    #[test]
    fn constants_are_satisfiable_and_literal() {
        let mut cs = TestConstraintSystem::<bls12_381::Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(constants.zero.get_value().unwrap(), bls12_381::Scalar::from(0u64));
        assert_eq!(constants.c1000.get_value().unwrap(), bls12_381::Scalar::from(1000u64));
    }
}
