//! Named constants shared between witness construction and the circuit.
//!
//! Values are taken from the exchange's original fixed parameterization
//! (tree depths, bit widths, float encodings); see `SPEC_FULL.md` §3.

/// Depth of the per-balance storage-slot tree (quad-ary, so `4^depth` leaves).
pub const TREE_DEPTH_STORAGE: usize = 7;
/// Depth of the account tree.
pub const TREE_DEPTH_ACCOUNTS: usize = 16;
/// Depth of the per-account balance (token) tree.
pub const TREE_DEPTH_TOKENS: usize = 8;

/// Bytes reserved for a single transaction's public-data record.
pub const TX_DATA_AVAILABILITY_SIZE: usize = 68;

/// Bit width of a packed amount (balances, fill amounts).
pub const NUM_BITS_AMOUNT: usize = 96;
/// Bit width of a storage-slot address (`TREE_DEPTH_STORAGE * 2`).
pub const NUM_BITS_STORAGE_ADDRESS: usize = TREE_DEPTH_STORAGE * 2;
/// Bit width of an account address (`TREE_DEPTH_ACCOUNTS * 2`).
pub const NUM_BITS_ACCOUNT: usize = TREE_DEPTH_ACCOUNTS * 2;
/// Bit width of a token id (`TREE_DEPTH_TOKENS * 2`).
pub const NUM_BITS_TOKEN: usize = TREE_DEPTH_TOKENS * 2;
/// Bit width of a storage id.
pub const NUM_BITS_STORAGEID: usize = 32;
/// Bit width of a block timestamp.
pub const NUM_BITS_TIMESTAMP: usize = 32;
/// Bit width of an account nonce.
pub const NUM_BITS_NONCE: usize = 32;
/// Bit width of a basis-points fee value.
pub const NUM_BITS_BIPS: usize = 12;
/// Bit width of the data-availability-compressed basis-points fee value.
pub const NUM_BITS_BIPS_DA: usize = 6;
/// Bit width of a protocol fee basis-points value.
pub const NUM_BITS_PROTOCOL_FEE_BIPS: usize = 8;
/// Bit width of a transaction-type selector.
pub const NUM_BITS_TX_TYPE: usize = 8;
/// Bit width of an AMM pool fee basis-points value.
pub const NUM_BITS_AMM_BIPS: usize = 8;

/// Number of slots in a storage tree (`2^NUM_BITS_STORAGE_ADDRESS`).
pub const NUM_STORAGE_SLOTS: u64 = 1 << NUM_BITS_STORAGE_ADDRESS;

/// Fixed-point base used by `MulDiv`-based fee/accuracy arithmetic.
pub const FEE_MULTIPLIER: u64 = 50;

/// Number of distinct transaction kinds the selector multiplexes over.
pub const NUM_TX_TYPES: usize = 10;

/// Ordered list of transaction-type codes, matching the selector order
/// in `spec.md` §4.10.
pub mod tx_type {
    /// No-op.
    pub const NOOP: u8 = 0;
    /// Deposit.
    pub const DEPOSIT: u8 = 1;
    /// Withdrawal.
    pub const WITHDRAWAL: u8 = 2;
    /// Transfer.
    pub const TRANSFER: u8 = 3;
    /// Spot trade.
    pub const SPOT_TRADE: u8 = 4;
    /// Account update.
    pub const ACCOUNT_UPDATE: u8 = 5;
    /// AMM update.
    pub const AMM_UPDATE: u8 = 6;
    /// Signature verification.
    pub const SIGNATURE_VERIFICATION: u8 = 7;
    /// NFT mint.
    pub const NFT_MINT: u8 = 8;
    /// NFT data.
    pub const NFT_DATA: u8 = 9;
}

/// Withdrawal sub-kind codes (`spec.md` §4.9).
pub mod withdrawal_type {
    /// User-initiated, signed withdrawal.
    pub const USER: u8 = 0;
    /// Conditional (on-chain authorized) withdrawal.
    pub const CONDITIONAL: u8 = 1;
    /// Forced full withdrawal, valid: amount must equal the full balance.
    pub const VALID_FULL: u8 = 2;
    /// Forced full withdrawal, invalid: amount must be zero.
    pub const INVALID_FULL: u8 = 3;
}

/// Reserved account addresses.
pub mod reserved_account {
    /// Protocol-fee account.
    pub const PROTOCOL_FEE: u64 = 0;
    /// Operator-writable slot used when a tx has no "second account".
    pub const OPERATOR_DEFAULT: u64 = 1;
}

/// A compact-float encoding shape: `exp_bits` exponent bits, `mantissa_bits`
/// mantissa bits, exponent multiplier base `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatEncoding {
    /// Number of exponent bits.
    pub exp_bits: usize,
    /// Number of mantissa bits.
    pub mantissa_bits: usize,
    /// Base the exponent is raised to.
    pub base: u64,
}

/// `(numerator, denominator)` bound on a float round-trip's relative loss:
/// `value * den >= original * num`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accuracy {
    /// Numerator.
    pub num: u64,
    /// Denominator.
    pub den: u64,
}

/// Encoding used for amounts on public data (24-bit float).
pub const FLOAT24_ENCODING: FloatEncoding = FloatEncoding {
    exp_bits: 5,
    mantissa_bits: 19,
    base: 10,
};
/// Encoding used for fees on public data (16-bit float).
pub const FLOAT16_ENCODING: FloatEncoding = FloatEncoding {
    exp_bits: 5,
    mantissa_bits: 11,
    base: 10,
};

/// Accuracy bound paired with [`FLOAT24_ENCODING`] (~99.998%).
pub const FLOAT24_ACCURACY: Accuracy = Accuracy {
    num: 100_000 - 2,
    den: 100_000,
};
/// Accuracy bound paired with [`FLOAT16_ENCODING`] (~99.5%).
pub const FLOAT16_ACCURACY: Accuracy = Accuracy {
    num: 1_000 - 5,
    den: 1_000,
};

#[cfg(test)]
mod tests {
    use super::{
        FLOAT16_ACCURACY, FLOAT16_ENCODING, FLOAT24_ACCURACY, FLOAT24_ENCODING,
        NUM_BITS_ACCOUNT, NUM_BITS_STORAGE_ADDRESS, NUM_BITS_TOKEN, NUM_STORAGE_SLOTS,
    };

    #[test]
    fn derived_bit_widths_match_tree_depths() {
        assert_eq!(NUM_BITS_STORAGE_ADDRESS, 14);
        assert_eq!(NUM_BITS_ACCOUNT, 32);
        assert_eq!(NUM_BITS_TOKEN, 16);
        assert_eq!(NUM_STORAGE_SLOTS, 16384);
    }

    #[test]
    fn accuracy_bounds_are_below_unity() {
        assert!(FLOAT24_ACCURACY.num < FLOAT24_ACCURACY.den);
        assert!(FLOAT16_ACCURACY.num < FLOAT16_ACCURACY.den);
        assert_eq!(FLOAT24_ENCODING.mantissa_bits + FLOAT24_ENCODING.exp_bits, 24);
        assert_eq!(FLOAT16_ENCODING.mantissa_bits + FLOAT16_ENCODING.exp_bits, 16);
    }
}
