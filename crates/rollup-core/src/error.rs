//! Errors detectable before constraint synthesis even begins: a malformed
//! witness can never be turned into a valid circuit input, regardless of
//! what the constraint system would say about it.

use thiserror::Error;

/// A witness-construction failure caught ahead of constraint synthesis.
///
/// `bellman::SynthesisError`, not this type, is what propagates once a
/// circuit actually starts allocating variables and constraints; see
/// `SPEC_FULL.md` §7.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CircuitError {
    /// A Merkle proof did not have the expected number of sibling triples.
    #[error("merkle proof for {tree} expected {expected} sibling triples, got {actual}")]
    WrongProofLength {
        /// Name of the tree the proof is for (account/balance/storage).
        tree: &'static str,
        /// Expected sibling-triple count (`3 * depth`).
        expected: usize,
        /// Actual length found on the witness.
        actual: usize,
    },
    /// A transaction-type byte did not name one of the ten known kinds.
    #[error("unknown transaction type code {0}")]
    UnknownTxType(u8),
    /// A withdrawal sub-kind byte did not name one of the four known kinds.
    #[error("unknown withdrawal type code {0}")]
    UnknownWithdrawalType(u8),
    /// A value intended to fit in `bits` bits does not.
    #[error("value {value} does not fit in {bits} bits")]
    ValueOutOfRange {
        /// The offending value.
        value: u128,
        /// The bit width it was required to fit.
        bits: usize,
    },
    /// 32 bytes did not decode to a canonical scalar-field element.
    #[error("bytes do not encode a canonical field element")]
    NonCanonicalFieldElement,
}

#[cfg(test)]
mod tests {
    use super::CircuitError;

    #[test]
    fn renders_actionable_messages() {
        let err = CircuitError::WrongProofLength {
            tree: "account",
            expected: 48,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "merkle proof for account expected 48 sibling triples, got 3"
        );
    }
}
