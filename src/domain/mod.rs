//! Framework-agnostic wallet rules.

pub mod gift_card;
pub mod transaction;

pub use transaction::{BalanceEffect, TransactionKind};
