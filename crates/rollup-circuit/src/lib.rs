//! Rollup block circuit.

pub mod block;
pub mod gadgets;
pub mod state;
pub mod tx;

pub use block::{
    AccountWitness, ActivePayload, BalanceWitness, Block, DummySignature, OrderSideWitness,
    PathWitness, SpotTradePayload, StorageWitness, TransactionWitness, TransferPayload,
};
