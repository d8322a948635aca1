//! Storage-slot reader with replay/overwrite semantics, and the
//! storage-backed one-shot nonce built on top of it (`SPEC_FULL.md` §4.5).
//!
//! Each storage slot is reused across `storage_id` cycles spaced
//! `NUM_STORAGE_SLOTS` apart. A read is only satisfiable when the
//! transaction's `storage_id` is exactly the slot's current
//! `leaf_storage_id` (the same fill is in progress) or exactly
//! `leaf_storage_id + NUM_STORAGE_SLOTS` (the slot is being claimed for a
//! fresh cycle, and reads as empty) — any other `storage_id`, including
//! one that merely exceeds the leaf's without landing on the next cycle
//! boundary, is rejected.
//!
//! `account_update`'s own key-rotation replay counter
//! ([`increment_nonce`]) is a separate, simpler mechanism: a plain
//! per-account integer that only ever goes up by one, with no storage
//! leaf or cycle concept. [`consume_nonce`] is the storage-slot-keyed
//! nonce transfers and user withdrawals consume instead, since those
//! kinds have no integer counter of their own to bump.

use bellman::gadgets::boolean::Boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use rollup_core::constants::NUM_BITS_NONCE;

use super::field::Constants;
use super::math;

/// The outcome of reading a storage slot for a given transaction's
/// `storage_id`.
pub struct StorageReader {
    /// `leaf_data` when `storage_id == leaf_storage_id`, `0` otherwise
    /// (a fresh claim of the slot).
    pub data: AllocatedNum<Scalar>,
    /// Whether this read claimed a fresh cycle (`storage_id ==
    /// leaf_storage_id + NUM_STORAGE_SLOTS`) rather than continuing the
    /// current one.
    pub is_new_cycle: Boolean,
    /// `1` iff `storage_id == leaf_storage_id + NUM_STORAGE_SLOTS`
    /// (`StorageReaderGadget::getOverwrite`). Identical to `is_new_cycle`
    /// here, exposed under its own name since callers outside this
    /// module (public-data packing, book-keeping) refer to it as
    /// `overwrite`.
    pub overwrite: Boolean,
}

/// Read a storage slot. Whenever `verify`, satisfiable only when
/// `storage_id` equals `leaf_storage_id` or `leaf_storage_id +
/// NUM_STORAGE_SLOTS` (`StorageReaderGadget`, `StorageGadgets.h:116-203`);
/// when `!verify`, `storage_id` is unconstrained (a slot this
/// transaction doesn't actually touch, e.g. an operator-forced
/// withdrawal with no nonce of its own to consume).
pub fn read<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    verify: &Boolean,
    storage_id: &AllocatedNum<Scalar>,
    leaf_storage_id: &AllocatedNum<Scalar>,
    leaf_data: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<StorageReader, SynthesisError> {
    let next_storage_id = math::unsafe_add(
        cs.namespace(|| "leaf_storage_id + num_storage_slots"),
        leaf_storage_id,
        &constants.num_storage_slots,
    )?;

    let same_id = math::equal(cs.namespace(|| "storage_id == leaf_storage_id"), storage_id, leaf_storage_id)?;
    let new_cycle = math::equal(cs.namespace(|| "storage_id == next cycle"), storage_id, &next_storage_id)?;
    let valid = math::boolean_or(cs.namespace(|| "same or next cycle"), &same_id, &new_cycle)?;
    math::if_then_require(cs.namespace(|| "verify implies ls or ls + numStorageSlots"), verify, &valid)?;

    let data = math::ternary(cs.namespace(|| "effective data"), &same_id, leaf_data, &constants.zero)?;

    Ok(StorageReader {
        data,
        is_new_cycle: new_cycle.clone(),
        overwrite: new_cycle,
    })
}

/// The outcome of consuming a storage slot as a one-shot replay nonce
/// (`NonceGadget`, `StorageGadgets.h:205-246`): reuses [`read`], then
/// requires the slot's `data` be `0` before this transaction whenever
/// `required`, and reports `1` as the value to write back.
pub struct NonceConsumption {
    /// `storage_id` when `required`, `leaf_storage_id` otherwise (the
    /// slot's id to commit after this transaction).
    pub storage_id_after: AllocatedNum<Scalar>,
    /// `1` when `required`, `leaf_data` otherwise (the slot's data to
    /// commit after this transaction).
    pub data_after: AllocatedNum<Scalar>,
    /// Whether this consumption claimed a fresh cycle of the slot.
    pub overwrite: Boolean,
}

/// Consume `storage_id` as a one-shot nonce, gated by `required` (e.g. a
/// transaction's own "this was a signed, on-chain-authorized spend" flag
/// — a conditional/no-op slot leaves the leaf untouched). Unsatisfiable
/// when `required` and the slot already holds a nonzero `data` for this
/// cycle, i.e. the `storage_id` has already been consumed.
pub fn consume_nonce<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    required: &Boolean,
    storage_id: &AllocatedNum<Scalar>,
    leaf_storage_id: &AllocatedNum<Scalar>,
    leaf_data: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<NonceConsumption, SynthesisError> {
    let reader = read(cs.namespace(|| "read"), required, storage_id, leaf_storage_id, leaf_data, constants)?;

    let unused = math::equal(cs.namespace(|| "slot unused"), &reader.data, &constants.zero)?;
    math::if_then_require(cs.namespace(|| "required implies unused"), required, &unused)?;

    let storage_id_after = math::ternary(cs.namespace(|| "storage id after"), required, storage_id, leaf_storage_id)?;
    let data_after = math::ternary(cs.namespace(|| "data after"), required, &constants.one, leaf_data)?;

    Ok(NonceConsumption {
        storage_id_after,
        data_after,
        overwrite: reader.overwrite,
    })
}

/// Enforce `nonce_after == nonce_before + 1`, range-checked to
/// `NUM_BITS_NONCE` (so it cannot silently wrap). `account_update`'s own
/// per-account key-rotation counter, unrelated to any storage leaf.
pub fn increment_nonce<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    nonce_before: &AllocatedNum<Scalar>,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let one = math::constant(cs.namespace(|| "one"), Scalar::from(1u64))?;
    let checked = math::add(cs.namespace(|| "nonce + 1"), nonce_before, &one, NUM_BITS_NONCE)?;
    Ok(checked.packed)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::boolean::Boolean;
    use bellman::gadgets::num::AllocatedNum;
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;

    use super::{consume_nonce, increment_nonce, read};
    use crate::gadgets::field::Constants;

    fn alloc(cs: &mut TestConstraintSystem<Scalar>, name: &'static str, value: u64) -> AllocatedNum<Scalar> {
        AllocatedNum::alloc(cs.namespace(|| name), || Ok(Scalar::from(value))).unwrap()
    }

    #[test]
    fn continuing_a_fill_reads_back_the_stored_data() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let storage_id = alloc(&mut cs, "storage_id", 5);
        let leaf_storage_id = alloc(&mut cs, "leaf_storage_id", 5);
        let leaf_data = alloc(&mut cs, "leaf_data", 777);
        let result = read(cs.namespace(|| "read"), &Boolean::constant(true), &storage_id, &leaf_storage_id, &leaf_data, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(result.data.get_value().unwrap(), Scalar::from(777u64));
        assert_eq!(result.is_new_cycle.get_value(), Some(false));
        assert_eq!(result.overwrite.get_value(), Some(false));
    }

    #[test]
    fn claiming_a_fresh_cycle_reads_as_empty() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let storage_id = alloc(&mut cs, "storage_id", 16384 + 5);
        let leaf_storage_id = alloc(&mut cs, "leaf_storage_id", 5);
        let leaf_data = alloc(&mut cs, "leaf_data", 777);
        let result = read(cs.namespace(|| "read"), &Boolean::constant(true), &storage_id, &leaf_storage_id, &leaf_data, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(result.data.get_value().unwrap(), Scalar::from(0u64));
        assert_eq!(result.is_new_cycle.get_value(), Some(true));
        assert_eq!(result.overwrite.get_value(), Some(true));
    }

    #[test]
    fn a_regressing_storage_id_is_unsatisfiable() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let storage_id = alloc(&mut cs, "storage_id", 3);
        let leaf_storage_id = alloc(&mut cs, "leaf_storage_id", 5);
        let leaf_data = alloc(&mut cs, "leaf_data", 777);
        read(cs.namespace(|| "read"), &Boolean::constant(true), &storage_id, &leaf_storage_id, &leaf_data, &constants).unwrap();
        assert!(!cs.is_satisfied());
    }

    #[test]
    fn an_arbitrary_gap_past_the_leaf_is_unsatisfiable() {
        // Advancing by anything other than exactly NUM_STORAGE_SLOTS must
        // be rejected, not just a regression.
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let storage_id = alloc(&mut cs, "storage_id", 6);
        let leaf_storage_id = alloc(&mut cs, "leaf_storage_id", 5);
        let leaf_data = alloc(&mut cs, "leaf_data", 777);
        read(cs.namespace(|| "read"), &Boolean::constant(true), &storage_id, &leaf_storage_id, &leaf_data, &constants).unwrap();
        assert!(!cs.is_satisfied());
    }

    #[test]
    fn an_unverified_read_ignores_an_invalid_storage_id() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let storage_id = alloc(&mut cs, "storage_id", 999);
        let leaf_storage_id = alloc(&mut cs, "leaf_storage_id", 5);
        let leaf_data = alloc(&mut cs, "leaf_data", 777);
        read(cs.namespace(|| "read"), &Boolean::constant(false), &storage_id, &leaf_storage_id, &leaf_data, &constants).unwrap();
        assert!(cs.is_satisfied());
    }

    #[test]
    fn consuming_an_unused_slot_writes_one() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let storage_id = alloc(&mut cs, "storage_id", 5);
        let leaf_storage_id = alloc(&mut cs, "leaf_storage_id", 5);
        let leaf_data = alloc(&mut cs, "leaf_data", 0);
        let result = consume_nonce(
            cs.namespace(|| "consume"),
            &Boolean::constant(true),
            &storage_id,
            &leaf_storage_id,
            &leaf_data,
            &constants,
        )
        .unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(result.data_after.get_value().unwrap(), Scalar::from(1u64));
        assert_eq!(result.storage_id_after.get_value().unwrap(), Scalar::from(5u64));
    }

    #[test]
    fn consuming_an_already_used_slot_is_unsatisfiable() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let storage_id = alloc(&mut cs, "storage_id", 5);
        let leaf_storage_id = alloc(&mut cs, "leaf_storage_id", 5);
        let leaf_data = alloc(&mut cs, "leaf_data", 1);
        consume_nonce(
            cs.namespace(|| "consume"),
            &Boolean::constant(true),
            &storage_id,
            &leaf_storage_id,
            &leaf_data,
            &constants,
        )
        .unwrap();
        assert!(!cs.is_satisfied());
    }

    #[test]
    fn an_unrequired_consumption_leaves_the_slot_untouched() {
        // An irrelevant storage_id (not even ls or ls + 2^14) and an
        // already-used slot would both make a *required* consumption
        // unsatisfiable; neither should matter when `required` is false.
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let storage_id = alloc(&mut cs, "storage_id", 999);
        let leaf_storage_id = alloc(&mut cs, "leaf_storage_id", 5);
        let leaf_data = alloc(&mut cs, "leaf_data", 1);
        let result = consume_nonce(
            cs.namespace(|| "consume"),
            &Boolean::constant(false),
            &storage_id,
            &leaf_storage_id,
            &leaf_data,
            &constants,
        )
        .unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(result.data_after.get_value().unwrap(), Scalar::from(1u64));
        assert_eq!(result.storage_id_after.get_value().unwrap(), Scalar::from(5u64));
    }

    #[test]
    fn increment_nonce_adds_exactly_one() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let nonce = alloc(&mut cs, "nonce", 41);
        let after = increment_nonce(cs.namespace(|| "increment"), &nonce).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(after.get_value().unwrap(), Scalar::from(42u64));
    }
}
