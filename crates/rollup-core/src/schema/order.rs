//! Order schema type (`spec.md` §3 "Orders", §4.7).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::field::FieldBytes;

/// A user order, as committed to by its EdDSA signature.
///
/// The signed message is the Poseidon-12 hash of the exchange id followed
/// by every field below in declaration order (`SPEC_FULL.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Order {
    /// Storage-slot id this order's fill progress is tracked under.
    pub storage_id: u32,
    /// Account placing the order.
    pub account_id: u32,
    /// Token sold.
    pub token_s: u16,
    /// Token bought.
    pub token_b: u16,
    /// Maximum amount of `token_s` to sell, at most 96 bits.
    pub amount_s: u128,
    /// Maximum amount of `token_b` to buy, at most 96 bits.
    pub amount_b: u128,
    /// Unix timestamp after which the order may no longer be filled.
    pub valid_until: u32,
    /// Maximum fee, in basis points, the order's owner will accept.
    pub max_fee_bips: u16,
    /// Whether the order is fill-amount-denominated in `token_b` (`true`)
    /// or `token_s` (`false`).
    pub fill_amount_b_or_s: bool,
    /// Fee actually charged, in basis points; must be `<= max_fee_bips`.
    pub fee_bips: u16,
    /// Required counterparty account id, or zero for an open order.
    pub taker: u32,
    /// AMM pool weight, when this order originates from an AMM account.
    pub weight_amm: FieldBytes,
}

impl Order {
    /// `true` when the order's fee is within its own stated ceiling.
    #[must_use]
    pub const fn fee_within_limit(&self) -> bool {
        self.fee_bips <= self.max_fee_bips
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldBytes, Order};

    fn sample_order() -> Order {
        Order {
            storage_id: 1,
            account_id: 7,
            token_s: 0,
            token_b: 1,
            amount_s: 1000,
            amount_b: 100,
            valid_until: 1_000_000,
            max_fee_bips: 20,
            fill_amount_b_or_s: false,
            fee_bips: 10,
            taker: 0,
            weight_amm: FieldBytes::ZERO,
        }
    }

    #[test]
    fn fee_within_limit_respects_max_fee_bips() {
        let mut order = sample_order();
        assert!(order.fee_within_limit());
        order.fee_bips = 21;
        assert!(!order.fee_within_limit());
    }
}
