//! Order validation and order-matching gadgets (`SPEC_FULL.md` §4.7).
//!
//! These operate purely on an order's own fields plus whatever the
//! surrounding spot-trade circuit has already read out of the storage
//! tree (the order's cumulative fill) — they don't touch the account or
//! balance trees themselves, matching the original gadget split between
//! order-level checks and the transaction circuit that wires them to
//! account state.

use bellman::gadgets::boolean::Boolean;
use bellman::gadgets::num::AllocatedNum;
use bellman::{ConstraintSystem, SynthesisError};
use bls12_381::Scalar;
use ff::Field;
use rollup_core::constants::{NUM_BITS_AMOUNT, NUM_BITS_BIPS, NUM_BITS_TIMESTAMP};

use super::field::{Constants, DualVariable};
use super::math;
use super::poseidon;

/// An order's fields, already allocated.
pub struct OrderFields {
    /// Storage slot this order's fill progress is tracked under.
    pub storage_id: AllocatedNum<Scalar>,
    /// Account placing the order.
    pub account_id: AllocatedNum<Scalar>,
    /// Token sold.
    pub token_s: AllocatedNum<Scalar>,
    /// Token bought.
    pub token_b: AllocatedNum<Scalar>,
    /// Maximum amount of `token_s` to sell.
    pub amount_s: AllocatedNum<Scalar>,
    /// Maximum amount of `token_b` to buy.
    pub amount_b: AllocatedNum<Scalar>,
    /// Unix timestamp after which the order can no longer be filled.
    pub valid_until: AllocatedNum<Scalar>,
    /// Maximum fee, in basis points, this order's owner will accept.
    pub max_fee_bips: AllocatedNum<Scalar>,
    /// Fee actually charged, in basis points.
    pub fee_bips: AllocatedNum<Scalar>,
    /// Whether fill is denominated in `token_b` (`true`) or `token_s`.
    pub fill_amount_b_or_s: Boolean,
    /// Required counterparty account id, or zero for an open order.
    pub taker: AllocatedNum<Scalar>,
}

/// Hash an order's signed fields (`H12`: exchange id plus the 10 fields
/// below, in declaration order — `fee_bips` is the fee actually charged
/// at matching time, not part of what the order's owner signs).
pub fn message_hash<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    exchange_id: &AllocatedNum<Scalar>,
    order: &OrderFields,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let buy = boolean_to_num(cs.namespace(|| "buy as field element"), &order.fill_amount_b_or_s)?;
    poseidon::hash_circuit(
        cs.namespace(|| "order message"),
        &[
            exchange_id.clone(),
            order.storage_id.clone(),
            order.account_id.clone(),
            order.token_s.clone(),
            order.token_b.clone(),
            order.amount_s.clone(),
            order.amount_b.clone(),
            order.valid_until.clone(),
            order.max_fee_bips.clone(),
            buy,
            order.taker.clone(),
        ],
    )
}

fn boolean_to_num<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    bit: &Boolean,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let value = bit.get_value().map(|set| if set { Scalar::ONE } else { Scalar::ZERO });
    let num = AllocatedNum::alloc(cs.namespace(|| "bit as field element"), || {
        value.ok_or(SynthesisError::AssignmentMissing)
    })?;
    cs.enforce(
        || "bit equals field element",
        |_| bit.lc(CS::one(), Scalar::ONE),
        |lc| lc + CS::one(),
        |lc| lc + num.get_variable(),
    );
    Ok(num)
}

/// Enforce `fee_bips <= max_fee_bips`.
pub fn require_fee_within_limit<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    order: &OrderFields,
) -> Result<(), SynthesisError> {
    math::require_leq(
        cs.namespace(|| "fee within limit"),
        &order.fee_bips,
        &order.max_fee_bips,
        NUM_BITS_BIPS,
    )
}

/// Enforce the order has not expired as of `timestamp`.
pub fn require_not_expired<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    timestamp: &AllocatedNum<Scalar>,
    order: &OrderFields,
) -> Result<(), SynthesisError> {
    math::require_lt(
        cs.namespace(|| "not expired"),
        timestamp,
        &order.valid_until,
        NUM_BITS_TIMESTAMP,
    )
}

/// Enforce the order's `taker` restriction: an order with `taker == 0` is
/// open to anyone, otherwise `counterparty_account_id` must match.
pub fn require_valid_taker<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    order: &OrderFields,
    counterparty_account_id: &AllocatedNum<Scalar>,
) -> Result<(), SynthesisError> {
    let zero = math::constant(cs.namespace(|| "zero"), Scalar::ZERO)?;
    let is_open = math::equal(cs.namespace(|| "taker is zero"), &order.taker, &zero)?;
    let matches = math::equal(cs.namespace(|| "taker matches"), &order.taker, counterparty_account_id)?;
    let ok = math::boolean_or(cs.namespace(|| "open or matches"), &is_open, &matches)?;
    math::require_true(cs.namespace(|| "valid taker"), &ok)
}

/// Enforce the trade's fill rate is at least as good as the order's
/// stated price, with a 0.1% tolerance for rounding:
/// `fill_s * amount_b * 1000 <= fill_b * amount_s * 1001`. Cross
/// products are computed with `unsafe_mul` (no intermediate range
/// check — only the final `Leq` is range-checked, and amounts bounded
/// to 96 bits keep both sides well within field capacity even after the
/// small multiplier). Also enforces the fill is either on both sides or
/// neither (no one-sided dust fill).
pub fn require_fill_rate<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    order: &OrderFields,
    fill_s: &AllocatedNum<Scalar>,
    fill_b: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<(), SynthesisError> {
    let fill_s_amount_b = math::unsafe_mul(cs.namespace(|| "fill_s * amount_b"), fill_s, &order.amount_b)?;
    let lhs = math::unsafe_mul(cs.namespace(|| "* 1000"), &fill_s_amount_b, &constants.c1000)?;
    let fill_b_amount_s = math::unsafe_mul(cs.namespace(|| "fill_b * amount_s"), fill_b, &order.amount_s)?;
    let rhs = math::unsafe_mul(cs.namespace(|| "* 1001"), &fill_b_amount_s, &constants.c1001)?;
    math::require_leq(cs.namespace(|| "rate at least as good"), &lhs, &rhs, NUM_BITS_AMOUNT * 2 + 10)?;

    let s_nonzero = math::is_nonzero(cs.namespace(|| "fill_s nonzero"), fill_s)?;
    let b_nonzero = math::is_nonzero(cs.namespace(|| "fill_b nonzero"), fill_b)?;
    math::enforce_equal(
        cs.namespace(|| "both sides filled or neither"),
        &math::ternary(cs.namespace(|| "s as num"), &s_nonzero, &constants.one, &constants.zero)?,
        &math::ternary(cs.namespace(|| "b as num"), &b_nonzero, &constants.one, &constants.zero)?,
    );
    Ok(())
}

/// Enforce the order's cumulative fill (`filled_before + this fill`)
/// does not exceed its limit (`amount_b` when fill is `token_b`-
/// denominated, `amount_s` otherwise), returning the new cumulative
/// fill to write back to storage.
pub fn require_fill_limit<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    order: &OrderFields,
    filled_before: &AllocatedNum<Scalar>,
    fill_s: &AllocatedNum<Scalar>,
    fill_b: &AllocatedNum<Scalar>,
) -> Result<DualVariable, SynthesisError> {
    let fill_amount = math::ternary(
        cs.namespace(|| "fill amount in the order's denomination"),
        &order.fill_amount_b_or_s,
        fill_b,
        fill_s,
    )?;
    let limit = math::ternary(
        cs.namespace(|| "limit in the order's denomination"),
        &order.fill_amount_b_or_s,
        &order.amount_b,
        &order.amount_s,
    )?;
    let filled_after = math::add(
        cs.namespace(|| "filled_before + fill_amount"),
        filled_before,
        &fill_amount,
        NUM_BITS_AMOUNT,
    )?;
    math::require_leq(
        cs.namespace(|| "filled_after <= limit"),
        &filled_after.packed,
        &limit,
        NUM_BITS_AMOUNT,
    )?;
    Ok(filled_after)
}

/// Compute the fee this order owes on a fill: `fill_b * fee_bips /
/// 10000`.
pub fn calculate_fee<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    order: &OrderFields,
    fill_b: &AllocatedNum<Scalar>,
) -> Result<AllocatedNum<Scalar>, SynthesisError> {
    let bips_base = math::constant(cs.namespace(|| "10000"), Scalar::from(10_000u64))?;
    let result = math::mul_div(
        cs.namespace(|| "fee = fill_b * fee_bips / 10000"),
        fill_b,
        &order.fee_bips,
        &bips_base,
        NUM_BITS_AMOUNT,
        NUM_BITS_BIPS,
        14,
    )?;
    Ok(result.quotient.packed)
}

/// Enforce an order is self-consistent: it doesn't sell and buy the same
/// token, and both amounts are nonzero (`tokenS_neq_tokenB`,
/// `amountS_notZero`, `amountB_notZero`, `OrderGadgets.h:120-122`). With
/// either amount zero the fill-rate cross-product degenerates and
/// accepts any price.
pub fn validate_order<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    order: &OrderFields,
) -> Result<(), SynthesisError> {
    math::require_not_equal(cs.namespace(|| "token_s != token_b"), &order.token_s, &order.token_b)?;
    math::require_not_zero(cs.namespace(|| "amount_s != 0"), &order.amount_s)?;
    math::require_not_zero(cs.namespace(|| "amount_b != 0"), &order.amount_b)?;
    Ok(())
}

/// Enforce two orders trade complementary tokens:
/// `order_a.token_s == order_b.token_b && order_a.token_b == order_b.token_s`.
pub fn require_token_match<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    order_a: &OrderFields,
    order_b: &OrderFields,
) -> Result<(), SynthesisError> {
    math::enforce_equal(cs.namespace(|| "a sells what b buys"), &order_a.token_s, &order_b.token_b);
    math::enforce_equal(cs.namespace(|| "a buys what b sells"), &order_a.token_b, &order_b.token_s);
    Ok(())
}

/// The full order-matching check for a spot trade: complementary
/// tokens, both orders' own fee/expiry/taker constraints, both sides'
/// fill rate, and both sides' fill limit (against each order's
/// storage-read cumulative fill), returning the new cumulative fills to
/// write back.
pub struct MatchingResult {
    /// Order A's cumulative fill after this trade.
    pub filled_after_a: DualVariable,
    /// Order B's cumulative fill after this trade.
    pub filled_after_b: DualVariable,
}

#[allow(clippy::too_many_arguments, reason = "mirrors the original OrderMatchingGadget's flat argument list")]
pub fn match_orders<CS: ConstraintSystem<Scalar>>(
    mut cs: CS,
    order_a: &OrderFields,
    order_b: &OrderFields,
    filled_before_a: &AllocatedNum<Scalar>,
    filled_before_b: &AllocatedNum<Scalar>,
    fill_s_a: &AllocatedNum<Scalar>,
    fill_s_b: &AllocatedNum<Scalar>,
    timestamp: &AllocatedNum<Scalar>,
    constants: &Constants,
) -> Result<MatchingResult, SynthesisError> {
    validate_order(cs.namespace(|| "a self-consistent"), order_a)?;
    validate_order(cs.namespace(|| "b self-consistent"), order_b)?;
    require_token_match(cs.namespace(|| "token match"), order_a, order_b)?;

    require_fee_within_limit(cs.namespace(|| "a fee within limit"), order_a)?;
    require_fee_within_limit(cs.namespace(|| "b fee within limit"), order_b)?;
    require_not_expired(cs.namespace(|| "a not expired"), timestamp, order_a)?;
    require_not_expired(cs.namespace(|| "b not expired"), timestamp, order_b)?;
    require_valid_taker(cs.namespace(|| "a valid taker"), order_a, &order_b.account_id)?;
    require_valid_taker(cs.namespace(|| "b valid taker"), order_b, &order_a.account_id)?;

    // order_a fills token_b with what order_b sends as token_s, and vice
    // versa, so each order's "fill_b" is the counterparty's "fill_s".
    require_fill_rate(cs.namespace(|| "a fill rate"), order_a, fill_s_a, fill_s_b, constants)?;
    require_fill_rate(cs.namespace(|| "b fill rate"), order_b, fill_s_b, fill_s_a, constants)?;

    let filled_after_a = require_fill_limit(cs.namespace(|| "a fill limit"), order_a, filled_before_a, fill_s_a, fill_s_b)?;
    let filled_after_b = require_fill_limit(cs.namespace(|| "b fill limit"), order_b, filled_before_b, fill_s_b, fill_s_a)?;

    Ok(MatchingResult { filled_after_a, filled_after_b })
}

#[cfg(test)]
mod tests {
    use bellman::gadgets::boolean::{AllocatedBit, Boolean};
    use bellman::gadgets::num::AllocatedNum;
    use bellman::gadgets::test::TestConstraintSystem;
    use bls12_381::Scalar;

    use super::super::field::Constants;
    use super::{calculate_fee, require_fill_rate, require_valid_taker, validate_order, OrderFields};

    fn alloc(cs: &mut TestConstraintSystem<Scalar>, name: &'static str, value: u64) -> AllocatedNum<Scalar> {
        AllocatedNum::alloc(cs.namespace(|| name), || Ok(Scalar::from(value))).unwrap()
    }

    fn sample_order(cs: &mut TestConstraintSystem<Scalar>) -> OrderFields {
        OrderFields {
            storage_id: alloc(cs, "storage_id", 1),
            account_id: alloc(cs, "account_id", 7),
            token_s: alloc(cs, "token_s", 0),
            token_b: alloc(cs, "token_b", 1),
            amount_s: alloc(cs, "amount_s", 1000),
            amount_b: alloc(cs, "amount_b", 2000),
            valid_until: alloc(cs, "valid_until", 1_000_000),
            max_fee_bips: alloc(cs, "max_fee_bips", 20),
            fee_bips: alloc(cs, "fee_bips", 10),
            fill_amount_b_or_s: Boolean::from(AllocatedBit::alloc(cs.namespace(|| "buy"), Some(false)).unwrap()),
            taker: alloc(cs, "taker", 0),
        }
    }

    #[test]
    fn fill_rate_accepts_the_exact_order_price() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let order = sample_order(&mut cs);
        let fill_s = alloc(&mut cs, "fill_s", 500);
        let fill_b = alloc(&mut cs, "fill_b", 1000);
        require_fill_rate(cs.namespace(|| "rate"), &order, &fill_s, &fill_b, &constants).unwrap();
        assert!(cs.is_satisfied());
    }

    #[test]
    fn fill_rate_rejects_a_worse_than_quoted_price() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let constants = Constants::alloc(cs.namespace(|| "constants")).unwrap();
        let order = sample_order(&mut cs);
        let fill_s = alloc(&mut cs, "fill_s", 500);
        let fill_b = alloc(&mut cs, "fill_b", 900);
        require_fill_rate(cs.namespace(|| "rate"), &order, &fill_s, &fill_b, &constants).unwrap();
        assert!(!cs.is_satisfied());
    }

    #[test]
    fn open_order_accepts_any_taker() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let order = sample_order(&mut cs);
        let counterparty = alloc(&mut cs, "counterparty", 99);
        require_valid_taker(cs.namespace(|| "taker"), &order, &counterparty).unwrap();
        assert!(cs.is_satisfied());
    }

    #[test]
    fn validate_order_accepts_a_well_formed_order() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let order = sample_order(&mut cs);
        validate_order(cs.namespace(|| "validate"), &order).unwrap();
        assert!(cs.is_satisfied());
    }

    #[test]
    fn validate_order_rejects_a_zero_amount_s() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let mut order = sample_order(&mut cs);
        order.amount_s = alloc(&mut cs, "zero amount_s", 0);
        validate_order(cs.namespace(|| "validate"), &order).unwrap();
        assert!(!cs.is_satisfied());
    }

    #[test]
    fn validate_order_rejects_matching_tokens() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let mut order = sample_order(&mut cs);
        order.token_b = alloc(&mut cs, "same as token_s", 0);
        validate_order(cs.namespace(|| "validate"), &order).unwrap();
        assert!(!cs.is_satisfied());
    }

    #[test]
    fn calculate_fee_applies_the_bips_rate() {
        let mut cs = TestConstraintSystem::<Scalar>::new();
        let order = sample_order(&mut cs);
        let fill_b = alloc(&mut cs, "fill_b", 1000);
        let fee = calculate_fee(cs.namespace(|| "fee"), &order, &fill_b).unwrap();
        assert!(cs.is_satisfied());
        // 1000 * 10 / 10000 == 1
        assert_eq!(fee.get_value().unwrap(), Scalar::from(1u64));
    }
}
