//! Wallet core library for shroud.
//!
//! Provides what a wallet needs on top of the synchronized store:
//! - Coin selection with atomic spend reservation
//! - Transaction assembly with structural checks
//! - Spend, deposit and key-addition flows
//! - Rescanning stored transactions for newly added keys
//! - Balance summaries

pub mod balance;
pub mod error;
pub mod reservation;
pub mod selector;
pub mod sync;
pub mod transaction_builder;
pub mod wallet;

pub use balance::BalanceSummary;
pub use error::WalletError;
pub use reservation::Reservation;
pub use selector::{
    best_subset, plan_inputs, CoinSelector, Selection, SelectionLimits, SelectionRequest,
    Shortfall, Subset,
};
pub use sync::CommitmentSync;
pub use transaction_builder::{DraftParts, TransactionDraft};
pub use wallet::{DepositReceipt, SpendKind, SpendOutcome, SpendRequest, Wallet};
