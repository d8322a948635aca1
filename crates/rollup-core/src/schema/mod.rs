//! Serializable schema for the witness input described in `spec.md` §6.
//!
//! These are plain data contracts only — no JSON ingestion driver lives
//! here, matching the teacher crate's `schema` module, which carries types
//! but no I/O.

/// Canonical field-element byte representation and its hex `serde` adapter.
pub mod field;
/// Account/balance/storage leaf and Merkle-proof schema types.
pub mod leaves;
/// Order schema type.
pub mod order;
/// Per-transaction and per-block witness schema types.
pub mod witness;

pub use field::FieldBytes;
pub use leaves::{AccountLeaf, BalanceLeaf, MerkleProof, StorageLeaf};
pub use order::Order;
pub use witness::{BlockWitness, TxData, TxWitness};
