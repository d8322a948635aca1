//! Quad-ary sparse Merkle tree path selector, hasher and verifier
//! (`SPEC_FULL.md` §4.4).
//!
//! Every tree in this library (accounts, balances, storage) is quad-ary:
//! each internal node has 4 children, combined by a single Poseidon call
//! over `[tag, c0, c1, c2, c3]` (arity 5, `poseidon::hash`'s `H5`
//! instance). A [`MerkleProof`](rollup_core::schema::MerkleProof) carries
//! 3 sibling field elements per level (the other 3 children), so
//! reconstructing the 4-wide child array from "my value" + "3 siblings" +
//! "my 2-bit position" is the one gadget every path walk needs; see
//! [`place_children_circuit`].

use bellman::gadgets::boolean::Boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;

use super::{math, poseidon};

const MERKLE_NODE_TAG: u64 = 0;

/// Combine 4 children into their parent hash.
pub fn quad_hash(children: [Scalar; 4]) -> Scalar {
    poseidon::hash(&[
        Scalar::from(MERKLE_NODE_TAG),
        children[0],
        children[1],
        children[2],
        children[3],
    ])
}

/// Combine 4 children into their parent hash, in-circuit.
pub fn quad_hash_circuit<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    children: &[AllocatedNum<Scalar>; 4],
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let tag = math::constant(cs.namespace(|| "merkle node tag"), Scalar::from(MERKLE_NODE_TAG))?;
    let inputs = [
        tag,
        children[0].clone(),
        children[1].clone(),
        children[2].clone(),
        children[3].clone(),
    ];
    poseidon::hash_circuit(cs.namespace(|| "quad hash"), &inputs)
}

/// Insert `value` into the 4-slot child array at `position`, with the
/// other 3 slots filled by `siblings` in ascending-index order.
fn place_children(value: Scalar, siblings: [Scalar; 3], position: u8) -> [Scalar; 4] {
    let mut children = [Scalar::from(0u64); 4];
    let mut next_sibling = 0usize;
    for (i, slot) in children.iter_mut().enumerate() {
        if u8::try_from(i).unwrap_or(u8::MAX) == position {
            *slot = value;
        } else {
            *slot = siblings.get(next_sibling).copied().unwrap_or(Scalar::from(0u64));
            next_sibling += 1;
        }
    }
    children
}

/// Fold one quad-ary level: place `value` among `siblings` at `position`
/// and hash the result.
pub fn hash_level(value: Scalar, siblings: [Scalar; 3], position: u8) -> Scalar {
    quad_hash(place_children(value, siblings, position))
}

/// Recompute a quad-ary root from a leaf value, its index and a flattened
/// sibling list (3 field elements per level, least-significant level
/// first).
#[must_use]
pub fn compute_root(leaf: Scalar, index: u64, siblings: &[Scalar], depth: usize) -> Scalar {
    let mut cur = leaf;
    let mut remaining_index = index;
    for level in 0..depth {
        let position = u8::try_from(remaining_index & 0b11).unwrap_or(0);
        let base = level * 3;
        let triple = [
            siblings.get(base).copied().unwrap_or(Scalar::from(0u64)),
            siblings.get(base + 1).copied().unwrap_or(Scalar::from(0u64)),
            siblings.get(base + 2).copied().unwrap_or(Scalar::from(0u64)),
        ];
        cur = hash_level(cur, triple, position);
        remaining_index >>= 2;
    }
    cur
}

/// Decode two path bits (`b0` least significant) into a one-hot 4-vector:
/// `[!b0&!b1, b0&!b1, !b0&b1, b0&b1]`.
fn onehot_from_two_bits<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    b0: &Boolean,
    b1: &Boolean,
) -> Result<[Boolean; 4], SynthesisError> {
    let not_b0 = b0.not();
    let not_b1 = b1.not();
    Ok([
        Boolean::and(cs.namespace(|| "00"), &not_b0, &not_b1)?,
        Boolean::and(cs.namespace(|| "01"), b0, &not_b1)?,
        Boolean::and(cs.namespace(|| "10"), &not_b0, b1)?,
        Boolean::and(cs.namespace(|| "11"), b0, b1)?,
    ])
}

/// Insert `value` into a 4-slot child array selected by a one-hot
/// 4-vector, with the other 3 slots filled by `siblings` in order. Six
/// `ternary` calls: `onehot[i]` picks `value` for slot `i`, everything
/// else resolves to the sibling that hasn't been placed yet.
#[allow(
    clippy::indexing_slicing,
    reason = "onehot is a fixed 4-element array indexed only by literal constants 0..=3"
)]
fn place_children_circuit<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    value: &AllocatedNum<Scalar>,
    siblings: [&AllocatedNum<Scalar>; 3],
    onehot: &[Boolean; 4],
) -> Result<[AllocatedNum<Scalar>; 4], SynthesisError> {
    let [s0, s1, s2] = siblings;

    let c0 = math::ternary(cs.namespace(|| "c0"), &onehot[0], value, s0)?;

    let c1_else = math::ternary(cs.namespace(|| "c1 else"), &onehot[0], s0, s1)?;
    let c1 = math::ternary(cs.namespace(|| "c1"), &onehot[1], value, &c1_else)?;

    let before_c2 = math::boolean_or(cs.namespace(|| "position < 2"), &onehot[0], &onehot[1])?;
    let c2_else = math::ternary(cs.namespace(|| "c2 else"), &before_c2, s1, s2)?;
    let c2 = math::ternary(cs.namespace(|| "c2"), &onehot[2], value, &c2_else)?;

    let c3 = math::ternary(cs.namespace(|| "c3"), &onehot[3], value, s2)?;

    Ok([c0, c1, c2, c3])
}

/// Recompute a quad-ary root in-circuit from a leaf, its path bits (2 LE
/// bits per level, least-significant level first) and a flattened
/// sibling list (3 field elements per level).
pub fn compute_root_circuit<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    leaf: &AllocatedNum<Scalar>,
    index_bits: &[Boolean],
    siblings: &[AllocatedNum<Scalar>],
    depth: usize,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    if index_bits.len() != depth * 2 || siblings.len() != depth * 3 {
        return Err(SynthesisError::Unsatisfiable);
    }

    let mut cur = leaf.clone();
    for level in 0..depth {
        let b0 = index_bits.get(level * 2).ok_or(SynthesisError::Unsatisfiable)?;
        let b1 = index_bits
            .get(level * 2 + 1)
            .ok_or(SynthesisError::Unsatisfiable)?;
        let onehot = onehot_from_two_bits(cs.namespace(|| format!("level {level} position")), b0, b1)?;

        let base = level * 3;
        let s0 = siblings.get(base).ok_or(SynthesisError::Unsatisfiable)?;
        let s1 = siblings.get(base + 1).ok_or(SynthesisError::Unsatisfiable)?;
        let s2 = siblings.get(base + 2).ok_or(SynthesisError::Unsatisfiable)?;

        let children = place_children_circuit(
            cs.namespace(|| format!("level {level} children")),
            &cur,
            [s0, s1, s2],
            &onehot,
        )?;
        cur = quad_hash_circuit(cs.namespace(|| format!("level {level} hash")), &children)?;
    }
    Ok(cur)
}

/// Check `leaf_before`'s path hashes to `root_before`, then recompute the
/// root with `leaf_after` in its place. This is the one gadget every
/// per-transaction leaf update (account, balance, storage) composes.
pub fn apply_update_circuit<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    leaf_before: &AllocatedNum<Scalar>,
    leaf_after: &AllocatedNum<Scalar>,
    index_bits: &[Boolean],
    siblings: &[AllocatedNum<Scalar>],
    depth: usize,
    root_before: &AllocatedNum<Scalar>,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let computed_before = compute_root_circuit(
        cs.namespace(|| "root before"),
        leaf_before,
        index_bits,
        siblings,
        depth,
    )?;
    math::enforce_equal(cs.namespace(|| "root before matches"), &computed_before, root_before);
    compute_root_circuit(cs.namespace(|| "root after"), leaf_after, index_bits, siblings, depth)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::boolean::{AllocatedBit, Boolean};
    use bellman::gadgets::num::AllocatedNum;
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;

    use super::{apply_update_circuit, compute_root, compute_root_circuit};

    fn bits_for(mut index: u64, depth: usize, cs: &mut TestConstraintSystem<Scalar>) -> Vec<Boolean> {
        let mut bits = Vec::with_capacity(depth * 2);
        for level in 0..depth * 2 {
            let bit = (index & 1) == 1;
            bits.push(Boolean::from(
                AllocatedBit::alloc(cs.namespace(|| format!("bit {level}")), Some(bit)).unwrap(),
            ));
            index >>= 1;
        }
        bits
    }

    fn alloc(cs: &mut TestConstraintSystem<Scalar>, name: String, value: Scalar) -> AllocatedNum<Scalar> {
        AllocatedNum::alloc(cs.namespace(|| name), || Ok(value)).unwrap()
    }

    #[test]
    fn compute_root_circuit_matches_native_compute_root() {
        let depth = 2;
        let leaf = Scalar::from(42u64);
        let index = 0b1011u64 & ((1 << (depth * 2)) - 1);
        let siblings: Vec<Scalar> = (0..depth * 3).map(|i| Scalar::from(u64::try_from(i + 1).unwrap())).collect();
        let expected = compute_root(leaf, index, &siblings, depth);

        let mut cs = TestConstraintSystem::<Scalar>::new();
        let leaf_var = alloc(&mut cs, "leaf".to_string(), leaf);
        let index_bits = bits_for(index, depth, &mut cs);
        let sibling_vars: Vec<_> = siblings
            .iter()
            .enumerate()
            .map(|(i, s)| alloc(&mut cs, format!("sibling {i}"), *s))
            .collect();

        let root = compute_root_circuit(cs.namespace(|| "root"), &leaf_var, &index_bits, &sibling_vars, depth).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(root.get_value().unwrap(), expected);
    }

    #[test]
    fn apply_update_circuit_rejects_a_wrong_root_before() {
        let depth = 1;
        let index = 2u64;
        let siblings = vec![Scalar::from(1u64), Scalar::from(2u64), Scalar::from(3u64)];
        let leaf_before = Scalar::from(7u64);
        let leaf_after = Scalar::from(8u64);
        let actual_root_before = compute_root(leaf_before, index, &siblings, depth);

        let mut cs = TestConstraintSystem::<Scalar>::new();
        let leaf_before_var = alloc(&mut cs, "before".to_string(), leaf_before);
        let leaf_after_var = alloc(&mut cs, "after".to_string(), leaf_after);
        let index_bits = bits_for(index, depth, &mut cs);
        let sibling_vars: Vec<_> = siblings
            .iter()
            .enumerate()
            .map(|(i, s)| alloc(&mut cs, format!("sibling {i}"), *s))
            .collect();
        let wrong_root = alloc(&mut cs, "wrong root".to_string(), actual_root_before + Scalar::from(1u64));

        apply_update_circuit(
            cs.namespace(|| "update"),
            &leaf_before_var,
            &leaf_after_var,
            &index_bits,
            &sibling_vars,
            depth,
            &wrong_root,
        )
        .unwrap();
        assert!(!cs.is_satisfied());
    }
}
