//! Balance summaries for display.

use serde::Serialize;
use shroud_store::{Balances, LedgerStore};

use crate::error::WalletError;

/// Spendable, incoming and outgoing balances, per owner and asset.
#[derive(Clone, Debug, Serialize)]
pub struct BalanceSummary {
    pub spendable: Balances,
    /// Deposits not yet confirmed on-chain.
    pub pending_deposit: Balances,
    /// Spends accepted locally but not yet confirmed on-chain.
    pub pending_spent: Balances,
}

impl BalanceSummary {
    pub fn load(store: &dyn LedgerStore) -> Result<Self, WalletError> {
        Ok(Self {
            spendable: store.balances()?,
            pending_deposit: store.pending_deposit_balances()?,
            pending_spent: store.pending_spent_balances()?,
        })
    }
}
