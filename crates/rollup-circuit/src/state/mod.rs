//! Account/balance/storage leaf hashing and tree-update gadgets
//! (`SPEC_FULL.md` §4.4, `spec.md` §3 "Cyclic references").
//!
//! Every tree leaf is hashed with the same width-5 Poseidon instance
//! internal nodes use (`H5`), zero-padded out to 5 inputs when the leaf
//! itself carries fewer fields (balance, storage), except the account
//! leaf, which exactly fills a width-6 instance (`H6`) with no padding.
//! Reusing one parameter set per width, rather than a dedicated
//! instance per leaf kind, is what `spec.md` §3's "Implementations must
//! reuse one parameter set" note asks for.

use bellman::gadgets::boolean::Boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use rollup_core::constants::{TREE_DEPTH_ACCOUNTS, TREE_DEPTH_STORAGE, TREE_DEPTH_TOKENS};

use crate::gadgets::field::Constants;
use crate::gadgets::{math, merkle, poseidon};

/// An allocated account leaf: `(owner, publicKeyX, publicKeyY, nonce,
/// feeBipsAMM, balancesRoot)`, `H6`.
#[derive(Clone)]
pub struct AccountLeafVars {
    /// 160-bit on-chain owner address, as a single field element.
    pub owner: AllocatedNum<Scalar>,
    /// EdDSA public key X coordinate.
    pub public_key_x: AllocatedNum<Scalar>,
    /// EdDSA public key Y coordinate.
    pub public_key_y: AllocatedNum<Scalar>,
    /// Replay-protection nonce.
    pub nonce: AllocatedNum<Scalar>,
    /// AMM pool fee, in basis points.
    pub fee_bips_amm: AllocatedNum<Scalar>,
    /// Root of this account's balance tree.
    pub balances_root: AllocatedNum<Scalar>,
}

impl AccountLeafVars {
    /// Hash this leaf for inclusion in the account tree.
    pub fn hash<CS: ConstraintSystem<Scalar>>(&self, mut cs: CS) -> Result<AllocatedNum<Scalar>, SynthesisError> {
        poseidon::hash_circuit(
            cs.namespace(|| "account leaf hash"),
            &[
                self.owner.clone(),
                self.public_key_x.clone(),
                self.public_key_y.clone(),
                self.nonce.clone(),
                self.fee_bips_amm.clone(),
                self.balances_root.clone(),
            ],
        )
    }
}

/// An allocated balance leaf: `(balance, weightAMM, storageRoot)`,
/// padded to `H5`.
#[derive(Clone)]
pub struct BalanceLeafVars {
    /// Token balance.
    pub balance: AllocatedNum<Scalar>,
    /// AMM weight, or an NFT content-hash.
    pub weight_amm: AllocatedNum<Scalar>,
    /// Root of this balance's storage-slot tree.
    pub storage_root: AllocatedNum<Scalar>,
}

impl BalanceLeafVars {
    /// Hash this leaf for inclusion in a balance tree.
    pub fn hash<CS: ConstraintSystem<Scalar>>(&self, mut cs: CS, constants: &Constants) -> Result<AllocatedNum<Scalar>, SynthesisError> {
        poseidon::hash_circuit(
            cs.namespace(|| "balance leaf hash"),
            &[
                self.balance.clone(),
                self.weight_amm.clone(),
                self.storage_root.clone(),
                constants.zero.clone(),
                constants.zero.clone(),
            ],
        )
    }
}

/// An allocated storage leaf: `(data, storageID)`, padded to `H5`.
#[derive(Clone)]
pub struct StorageLeafVars {
    /// Slot payload.
    pub data: AllocatedNum<Scalar>,
    /// Full storage id that last wrote this slot.
    pub storage_id: AllocatedNum<Scalar>,
}

impl StorageLeafVars {
    /// Hash this leaf for inclusion in a storage tree.
    pub fn hash<CS: ConstraintSystem<Scalar>>(&self, mut cs: CS, constants: &Constants) -> Result<AllocatedNum<Scalar>, SynthesisError> {
        poseidon::hash_circuit(
            cs.namespace(|| "storage leaf hash"),
            &[
                self.data.clone(),
                self.storage_id.clone(),
                constants.zero.clone(),
                constants.zero.clone(),
                constants.zero.clone(),
            ],
        )
    }
}

/// Take the low `num_bits` bits (least-significant-first) of a bit
/// vector, as the quad-tree path a leaf's hash is threaded through.
fn path_bits(bits: &[Boolean], num_bits: usize) -> &[Boolean] {
    bits.get(..num_bits).unwrap_or(bits)
}

/// Verify `account_before`'s path against `root_before`, then recompute
/// the root with `account_after` at the same index.
pub fn update_account<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    account_before: &AccountLeafVars,
    account_after: &AccountLeafVars,
    account_id_bits: &[Boolean],
    siblings: &[AllocatedNum<Scalar>],
    root_before: &AllocatedNum<Scalar>,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let before_hash = account_before.hash(cs.namespace(|| "before hash"))?;
    let after_hash = account_after.hash(cs.namespace(|| "after hash"))?;
    merkle::apply_update_circuit(
        cs.namespace(|| "account tree"),
        &before_hash,
        &after_hash,
        path_bits(account_id_bits, TREE_DEPTH_ACCOUNTS * 2),
        siblings,
        TREE_DEPTH_ACCOUNTS,
        root_before,
    )
}

/// Verify `balance_before`'s path against `root_before`, then recompute
/// the root with `balance_after` at the same index.
pub fn update_balance<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    balance_before: &BalanceLeafVars,
    balance_after: &BalanceLeafVars,
    token_id_bits: &[Boolean],
    siblings: &[AllocatedNum<Scalar>],
    root_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let before_hash = balance_before.hash(cs.namespace(|| "before hash"), constants)?;
    let after_hash = balance_after.hash(cs.namespace(|| "after hash"), constants)?;
    merkle::apply_update_circuit(
        cs.namespace(|| "balance tree"),
        &before_hash,
        &after_hash,
        path_bits(token_id_bits, TREE_DEPTH_TOKENS * 2),
        siblings,
        TREE_DEPTH_TOKENS,
        root_before,
    )
}

/// Verify `storage_before`'s path against `root_before`, then recompute
/// the root with `storage_after` at the same index.
pub fn update_storage<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    storage_before: &StorageLeafVars,
    storage_after: &StorageLeafVars,
    address_bits: &[Boolean],
    siblings: &[AllocatedNum<Scalar>],
    root_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let before_hash = storage_before.hash(cs.namespace(|| "before hash"), constants)?;
    let after_hash = storage_after.hash(cs.namespace(|| "after hash"), constants)?;
    merkle::apply_update_circuit(
        cs.namespace(|| "storage tree"),
        &before_hash,
        &after_hash,
        path_bits(address_bits, TREE_DEPTH_STORAGE * 2),
        siblings,
        TREE_DEPTH_STORAGE,
        root_before,
    )
}

/// `balance_after.balance = balance_before.balance + amount`, the
/// credit half of a deposit/transfer-receive, with everything else
/// carried over unchanged.
pub fn credit_balance<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    balance_before: &BalanceLeafVars,
    amount: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<BalanceLeafVars, SynthesisError> {
    let balance = math::add(cs.namespace(|| "credit"), &balance_before.balance, amount, num_bits)?;
    Ok(BalanceLeafVars {
        balance: balance.packed,
        weight_amm: balance_before.weight_amm.clone(),
        storage_root: balance_before.storage_root.clone(),
    })
}

/// `balance_after.balance = balance_before.balance - amount`, the debit
/// half of a withdrawal/transfer-send, with everything else carried
/// over unchanged.
pub fn debit_balance<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    balance_before: &BalanceLeafVars,
    amount: &AllocatedNum<Scalar>,
    num_bits: usize,
) -> Result<BalanceLeafVars, SynthesisError> {
    let balance = math::sub(cs.namespace(|| "debit"), &balance_before.balance, amount, num_bits)?;
    Ok(BalanceLeafVars {
        balance: balance.packed,
        weight_amm: balance_before.weight_amm.clone(),
        storage_root: balance_before.storage_root.clone(),
    })
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::num::AllocatedNum;
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;

    use super::{credit_balance, debit_balance, BalanceLeafVars};
    use crate::gadgets::field::Constants;

    fn alloc(cs: &mut TestConstraintSystem<Scalar>, name: &'static str, value: u64) -> AllocatedNum<Scalar> {
        AllocatedNum::alloc(cs.namespace(|| name), || Ok(Scalar::from(value))).unwrap()
    }

    #[test]
    fn credit_then_debit_round_trips_the_balance() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let before = BalanceLeafVars {
            balance: alloc(&mut cs, "balance", 100),
            weight_amm: constants.zero.clone(),
            storage_root: constants.zero.clone(),
        };
        let amount = alloc(&mut cs, "amount", 30);
        let credited = credit_balance(cs.namespace(|| "credit"), &before, &amount, 96).unwrap();
        assert_eq!(credited.balance.get_value().unwrap(), Scalar::from(130u64));
        let debited = debit_balance(cs.namespace(|| "debit"), &credited, &amount, 96).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(debited.balance.get_value().unwrap(), Scalar::from(100u64));
    }

    #[test]
    fn debit_below_zero_is_unsatisfiable() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let before = BalanceLeafVars {
            balance: alloc(&mut cs, "balance", 10),
            weight_amm: constants.zero.clone(),
            storage_root: constants.zero.clone(),
        };
        let amount = alloc(&mut cs, "amount", 30);
        debit_balance(cs.namespace(|| "debit"), &before, &amount, 96).unwrap();
        assert!(!cs.is_satisfied());
    }
}
