//! NFT mint and NFT metadata-posting (`SPEC_FULL.md` §4.9).
//!
//! A mint moves `amount` of a synthetic NFT "token" into the recipient's
//! balance slot, using that slot's otherwise-unused `weight_amm` field to
//! carry the NFT's content hash (the same storage-reuse trick a regular
//! AMM pool weight occupies on a different token id). NFT data posts the
//! same metadata on its own, signed by the minter, with no balance
//! movement at all — it exists purely so metadata can be republished or
//! corrected without re-minting.

use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use rollup_core::constants::{FLOAT16_ENCODING, NUM_BITS_AMOUNT};

use super::{be_bits, LeafContext, TxOutput};
use crate::gadgets::field::Constants;
use crate::gadgets::{float, math};
use crate::state::credit_balance;

/// NFT mint payload, already allocated.
pub struct NftMintData {
    /// Token id the mint is recorded under.
    pub nft_token_id: AllocatedNum<Scalar>,
    /// The NFT's identifier within that token id.
    pub nft_id: AllocatedNum<Scalar>,
    /// Content hash, stored in the balance slot's `weight_amm` field.
    pub content_hash: AllocatedNum<Scalar>,
    /// Royalty paid to the NFT's creator, in basis points.
    pub creator_fee_bips: AllocatedNum<Scalar>,
    /// Amount minted, `FLOAT16_ENCODING`-packed, as posted to public data.
    pub amount_packed: Option<Scalar>,
    /// The message hash the minter signed over this mint.
    pub message_hash: AllocatedNum<Scalar>,
}

/// Build an NFT mint's output.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    ctx: &LeafContext,
    data: &NftMintData,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    let mut output = TxOutput::identity(cs.namespace(|| "identity"), ctx, num_conditional_txs_before, constants)?;

    let amount = float::decode(cs.namespace(|| "decode amount"), data.amount_packed, FLOAT16_ENCODING)?;

    output.balance_b_s = credit_balance(cs.namespace(|| "credit nft"), &ctx.balance_b_s, &amount.value, NUM_BITS_AMOUNT)?;
    output.balance_b_s.weight_amm = data.content_hash.clone();

    output.hash_a = data.message_hash.clone();
    output.signature_required_a = bellman::gadgets::boolean::Boolean::constant(true);

    let mut public_data = be_bits(cs.namespace(|| "minter id bits"), &ctx.account_a_id, 32)?;
    public_data.extend(be_bits(cs.namespace(|| "recipient id bits"), &ctx.account_b_id, 32)?);
    public_data.extend(be_bits(cs.namespace(|| "nft token id bits"), &data.nft_token_id, 16)?);
    public_data.extend(be_bits(cs.namespace(|| "nft id bits"), &data.nft_id, NUM_BITS_AMOUNT)?);
    public_data.extend(be_bits(cs.namespace(|| "creator fee bips bits"), &data.creator_fee_bips, 16)?);
    let mut amount_bits_be = amount.packed.bits.clone();
    amount_bits_be.reverse();
    public_data.extend(amount_bits_be);
    output.public_data = public_data;

    Ok(output)
}

/// NFT metadata-posting payload, already allocated. Republishes an
/// already-minted NFT's metadata; moves no balance.
pub struct NftDataData {
    /// Token id the metadata concerns.
    pub nft_token_id: AllocatedNum<Scalar>,
    /// The NFT's identifier within that token id.
    pub nft_id: AllocatedNum<Scalar>,
    /// Content hash being (re-)published.
    pub content_hash: AllocatedNum<Scalar>,
    /// The message hash the minter signed over this posting.
    pub message_hash: AllocatedNum<Scalar>,
}

/// Build an NFT data posting's output.
pub fn apply_data<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    ctx: &LeafContext,
    data: &NftDataData,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    let mut output = TxOutput::identity(cs.namespace(|| "identity"), ctx, num_conditional_txs_before, constants)?;

    output.hash_a = data.message_hash.clone();
    output.signature_required_a = bellman::gadgets::boolean::Boolean::constant(true);

    let mut public_data = be_bits(cs.namespace(|| "minter id bits"), &ctx.account_a_id, 32)?;
    public_data.extend(be_bits(cs.namespace(|| "nft token id bits"), &data.nft_token_id, 16)?);
    public_data.extend(be_bits(cs.namespace(|| "nft id bits"), &data.nft_id, NUM_BITS_AMOUNT)?);
    public_data.extend(be_bits(cs.namespace(|| "content hash bits"), &data.content_hash, NUM_BITS_AMOUNT)?);
    output.public_data = public_data;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;
    use rollup_core::constants::FLOAT16_ENCODING;

    use super::{apply, apply_data, NftDataData, NftMintData};
    use crate::gadgets::float::pack_native;
    use crate::tx::tests_support::{alloc, sample_context};

    #[test]
    fn minting_credits_the_balance_and_stores_the_content_hash() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let data = NftMintData {
            nft_token_id: alloc(&mut cs, "nft_token_id", 5),
            nft_id: alloc(&mut cs, "nft_id", 1),
            content_hash: alloc(&mut cs, "content_hash", 0xDEAD),
            creator_fee_bips: alloc(&mut cs, "creator_fee_bips", 100),
            amount_packed: Some(pack_native(1, 0, FLOAT16_ENCODING)),
            message_hash: alloc(&mut cs, "hash", 7),
        };
        let output = apply(cs.namespace(|| "mint"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.balance_b_s.balance.get_value().unwrap(), Scalar::from(1u64));
        assert_eq!(output.balance_b_s.weight_amm.get_value().unwrap(), Scalar::from(0xDEADu64));
        assert_eq!(output.signature_required_a.get_value(), Some(true));
    }

    #[test]
    fn data_posting_moves_no_balance() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let data = NftDataData {
            nft_token_id: alloc(&mut cs, "nft_token_id", 5),
            nft_id: alloc(&mut cs, "nft_id", 1),
            content_hash: alloc(&mut cs, "content_hash", 0xBEEF),
            message_hash: alloc(&mut cs, "hash", 7),
        };
        let output = apply_data(cs.namespace(|| "data"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        assert_eq!(output.balance_a_s.balance.get_value().unwrap(), ctx.balance_a_s.balance.get_value().unwrap());
        assert_eq!(output.balance_b_s.balance.get_value().unwrap(), ctx.balance_b_s.balance.get_value().unwrap());
    }
}
