//! Raw signature verification: check a signature over an arbitrary
//! witness-supplied message hash, with no leaf or balance movement at
//! all (`SPEC_FULL.md` §4.9). Lets an application bind an off-chain
//! authorization to a block without spending a transfer or order slot.
//!
//! The signature is checked here, directly against the key carried on
//! [`SignatureVerificationData`], rather than through the generic
//! `hash_a`/`signature_required_a`-against-the-leaf's-own-key path the
//! single-signer kinds use — the whole point of this kind is attesting
//! to an arbitrary key's signature, not necessarily account A's own.
//! `signature_required_a` is left `false`; nothing else consults it.

use bellman::gadgets::boolean::Boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;

use super::{LeafContext, TxOutput};
use crate::gadgets::field::Constants;
use crate::gadgets::signature::{self, Point};

/// Signature-verification payload, already allocated.
pub struct SignatureVerificationData {
    /// The signer's public key.
    pub public_key: Point,
    /// The signature's `R`.
    pub r: Point,
    /// The signature's `S`.
    pub s: Option<jubjub::Fr>,
    /// The arbitrary message hash being attested to.
    pub message_hash: AllocatedNum<Scalar>,
}

/// Build a signature-verification transaction's output.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    ctx: &LeafContext,
    data: &SignatureVerificationData,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    let mut output = TxOutput::identity(cs.namespace(|| "identity"), ctx, num_conditional_txs_before, constants)?;

    signature::verify(cs.namespace(|| "verify"), &data.public_key, &data.r, data.s, &data.message_hash)?;

    output.hash_a = data.message_hash.clone();
    output.signature_required_a = Boolean::constant(false);

    Ok(output)
}
