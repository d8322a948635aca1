//! Spot trade: match two orders and move the resulting fills, maker/taker
//! fees, and the protocol's cut of each, between the two accounts, the
//! operator, and the protocol-fee pool (`SPEC_FULL.md` §4.7, §4.9).

use bellman::gadgets::boolean::Boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use rollup_core::constants::{NUM_BITS_AMOUNT, NUM_BITS_BIPS};

use super::{be_bits, LeafContext, TxOutput};
use crate::gadgets::field::Constants;
use crate::gadgets::order::{self, OrderFields};
use crate::gadgets::signature::Point;
use crate::gadgets::{math, signature, storage};
use crate::state::{credit_balance, debit_balance};

/// One side of a spot trade: the order itself, whether it was signed
/// off-chain or posted on-chain, and the fill it contributes.
pub struct OrderSide {
    /// The order's fields.
    pub order: OrderFields,
    /// The storage leaf this order's cumulative fill is tracked under,
    /// before this trade.
    pub leaf_storage_id: AllocatedNum<Scalar>,
    /// That leaf's cumulative-fill data, before this trade.
    pub leaf_data: AllocatedNum<Scalar>,
    /// Amount of `order.token_s` this side sends in this trade.
    pub fill_s: AllocatedNum<Scalar>,
    /// Whether this order was posted on-chain (and so needs no
    /// signature) rather than signed off-chain by its owner.
    pub conditional: Boolean,
    /// The order owner's public key, as registered on their account leaf.
    pub public_key: Point,
    /// The signature's `R`.
    pub r: Point,
    /// The signature's `S`.
    pub s: Option<jubjub::Fr>,
}

/// Spot trade payload, already allocated.
pub struct SpotTradeData {
    /// Order A (account A's side of the trade).
    pub side_a: OrderSide,
    /// Order B (account B's side of the trade).
    pub side_b: OrderSide,
}

/// Build a spot trade's output.
pub fn apply<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    ctx: &LeafContext,
    data: &SpotTradeData,
    num_conditional_txs_before: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<TxOutput, SynthesisError> {
    let mut output = TxOutput::identity(cs.namespace(|| "identity"), ctx, num_conditional_txs_before, constants)?;

    let message_a = order::message_hash(cs.namespace(|| "order a message"), &ctx.exchange_id, &data.side_a.order)?;
    let message_b = order::message_hash(cs.namespace(|| "order b message"), &ctx.exchange_id, &data.side_b.order)?;
    let required_a = data.side_a.conditional.not();
    let required_b = data.side_b.conditional.not();
    signature::verify_if_required(
        cs.namespace(|| "order a signature"),
        &required_a,
        &data.side_a.public_key,
        &data.side_a.r,
        data.side_a.s,
        &message_a,
        &constants.zero,
    )?;
    signature::verify_if_required(
        cs.namespace(|| "order b signature"),
        &required_b,
        &data.side_b.public_key,
        &data.side_b.r,
        data.side_b.s,
        &message_b,
        &constants.zero,
    )?;

    let always_verify = Boolean::constant(true);
    let read_a = storage::read(
        cs.namespace(|| "read order a storage"),
        &always_verify,
        &data.side_a.order.storage_id,
        &data.side_a.leaf_storage_id,
        &data.side_a.leaf_data,
        constants,
    )?;
    let read_b = storage::read(
        cs.namespace(|| "read order b storage"),
        &always_verify,
        &data.side_b.order.storage_id,
        &data.side_b.leaf_storage_id,
        &data.side_b.leaf_data,
        constants,
    )?;

    let matched = order::match_orders(
        cs.namespace(|| "match orders"),
        &data.side_a.order,
        &data.side_b.order,
        &read_a.data,
        &read_b.data,
        &data.side_a.fill_s,
        &data.side_b.fill_s,
        &ctx.timestamp,
        constants,
    )?;

    output.storage_a.data = matched.filled_after_a.packed;
    output.storage_a.storage_id = data.side_a.order.storage_id.clone();
    output.storage_b.data = matched.filled_after_b.packed;
    output.storage_b.storage_id = data.side_b.order.storage_id.clone();

    // A's fill_s (token_a_s) is B's incoming token_b, and vice versa.
    let fee_a = order::calculate_fee(cs.namespace(|| "a fee"), &data.side_a.order, &data.side_b.fill_s)?;
    let fee_b = order::calculate_fee(cs.namespace(|| "b fee"), &data.side_b.order, &data.side_a.fill_s)?;

    let protocol_fee_a = math::mul_div(
        cs.namespace(|| "protocol share of a fee"),
        &fee_a,
        &ctx.protocol_taker_bips,
        &constants.c10000,
        NUM_BITS_AMOUNT,
        NUM_BITS_BIPS,
        14,
    )?
    .quotient
    .packed;
    let protocol_fee_b = math::mul_div(
        cs.namespace(|| "protocol share of b fee"),
        &fee_b,
        &ctx.protocol_maker_bips,
        &constants.c10000,
        NUM_BITS_AMOUNT,
        NUM_BITS_BIPS,
        14,
    )?
    .quotient
    .packed;
    let operator_fee_a = math::sub(cs.namespace(|| "operator share of a fee"), &fee_a, &protocol_fee_a, NUM_BITS_AMOUNT)?;
    let operator_fee_b = math::sub(cs.namespace(|| "operator share of b fee"), &fee_b, &protocol_fee_b, NUM_BITS_AMOUNT)?;

    output.balance_a_s = debit_balance(cs.namespace(|| "debit a sells"), &ctx.balance_a_s, &data.side_a.fill_s, NUM_BITS_AMOUNT)?;
    output.balance_b_s = debit_balance(cs.namespace(|| "debit b sells"), &ctx.balance_b_s, &data.side_b.fill_s, NUM_BITS_AMOUNT)?;

    let b_receives = math::sub(cs.namespace(|| "b receives after fee"), &data.side_a.fill_s, &fee_b, NUM_BITS_AMOUNT)?;
    let a_receives = math::sub(cs.namespace(|| "a receives after fee"), &data.side_b.fill_s, &fee_a, NUM_BITS_AMOUNT)?;
    output.balance_a_b = credit_balance(cs.namespace(|| "credit a buys"), &ctx.balance_a_b, &a_receives.packed, NUM_BITS_AMOUNT)?;
    output.balance_b_b = credit_balance(cs.namespace(|| "credit b buys"), &ctx.balance_b_b, &b_receives.packed, NUM_BITS_AMOUNT)?;

    output.balance_o_a = credit_balance(cs.namespace(|| "credit operator a fee"), &ctx.balance_o_a, &operator_fee_a.packed, NUM_BITS_AMOUNT)?;
    output.balance_o_b = credit_balance(cs.namespace(|| "credit operator b fee"), &ctx.balance_o_b, &operator_fee_b.packed, NUM_BITS_AMOUNT)?;
    output.balance_p_a = credit_balance(cs.namespace(|| "credit protocol a fee"), &ctx.balance_p_a, &protocol_fee_a, NUM_BITS_AMOUNT)?;
    output.balance_p_b = credit_balance(cs.namespace(|| "credit protocol b fee"), &ctx.balance_p_b, &protocol_fee_b, NUM_BITS_AMOUNT)?;

    let any_conditional = math::boolean_or(cs.namespace(|| "either side conditional"), &data.side_a.conditional, &data.side_b.conditional)?;
    let conditional_after = math::add(cs.namespace(|| "conditional + 1"), num_conditional_txs_before, &constants.one, 32)?;
    output.num_conditional_txs = math::ternary(
        cs.namespace(|| "bump conditional count"),
        &any_conditional,
        &conditional_after.packed,
        num_conditional_txs_before,
    )?;

    let mut public_data = be_bits(cs.namespace(|| "account a id bits"), &ctx.account_a_id, 32)?;
    public_data.extend(be_bits(cs.namespace(|| "account b id bits"), &ctx.account_b_id, 32)?);
    public_data.extend(be_bits(cs.namespace(|| "a fill bits"), &data.side_a.fill_s, NUM_BITS_AMOUNT)?);
    public_data.extend(be_bits(cs.namespace(|| "b fill bits"), &data.side_b.fill_s, NUM_BITS_AMOUNT)?);
    output.public_data = public_data;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::boolean::{AllocatedBit, Boolean};
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;
    use group::Group;

    use super::{apply, OrderSide, SpotTradeData};
    use crate::gadgets::order::OrderFields;
    use crate::gadgets::signature::Point;
    use crate::tx::tests_support::sample_context;

    fn num(cs: &mut TestConstraintSystem<Scalar>, name: String, value: u64) -> bellman::gadgets::num::AllocatedNum<Scalar> {
        bellman::gadgets::num::AllocatedNum::alloc(cs.namespace(|| name), || Ok(Scalar::from(value))).unwrap()
    }

    // Both orders are posted on-chain, so no off-chain signature needs
    // fabricating; the dummy key/R below are never verified against.
    fn dummy_point<CS: bellman::ConstraintSystem<Scalar>>(cs: CS) -> Point {
        let generator = jubjub::ExtendedPoint::from(jubjub::SubgroupPoint::generator());
        Point::witness(cs, Some(generator)).unwrap()
    }

    fn side(cs: &mut TestConstraintSystem<Scalar>, tag: &str, account_id: u64, token_s: u64, token_b: u64, fill_s: u64) -> OrderSide {
        let order = OrderFields {
            storage_id: num(cs, format!("{tag} storage_id"), 1),
            account_id: num(cs, format!("{tag} account_id"), account_id),
            token_s: num(cs, format!("{tag} token_s"), token_s),
            token_b: num(cs, format!("{tag} token_b"), token_b),
            amount_s: num(cs, format!("{tag} amount_s"), 1000),
            amount_b: num(cs, format!("{tag} amount_b"), 1000),
            valid_until: num(cs, format!("{tag} valid_until"), 1_000_000),
            max_fee_bips: num(cs, format!("{tag} max_fee_bips"), 50),
            fee_bips: num(cs, format!("{tag} fee_bips"), 10),
            fill_amount_b_or_s: Boolean::from(AllocatedBit::alloc(cs.namespace(|| format!("{tag} buy")), Some(false)).unwrap()),
            taker: num(cs, format!("{tag} taker"), 0),
        };
        OrderSide {
            order,
            leaf_storage_id: num(cs, format!("{tag} leaf_storage_id"), 0),
            leaf_data: num(cs, format!("{tag} leaf_data"), 0),
            fill_s: num(cs, format!("{tag} fill_s"), fill_s),
            conditional: Boolean::constant(true),
            public_key: dummy_point(cs.namespace(|| format!("{tag} key"))),
            r: dummy_point(cs.namespace(|| format!("{tag} r"))),
            s: None,
        }
    }

    #[test]
    fn matching_orders_swap_balances_and_pay_fees() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let (ctx, constants, num_conditional) = sample_context(&mut cs);
        let side_a = side(&mut cs, "a", 7, 0, 1, 1000);
        let side_b = side(&mut cs, "b", 1, 1, 0, 1000);
        let data = SpotTradeData { side_a, side_b };
        let output = apply(cs.namespace(|| "trade"), &ctx, &data, &num_conditional, &constants).unwrap();
        assert!(cs.is_satisfied());
        // a starts with 1000 of token_a_s (sells all of it)
        assert_eq!(output.balance_a_s.balance.get_value().unwrap(), Scalar::from(0u64));
        // b receives a's 1000 minus a 1-unit fee (1000 * 10 / 10000 == 1)
        assert_eq!(output.balance_b_b.balance.get_value().unwrap(), Scalar::from(999u64));
        assert_eq!(output.num_conditional_txs.get_value().unwrap(), Scalar::from(1u64));
    }
}
