//! Coin selection.
//!
//! A spend needs value inputs of the transferred asset and, when a fee is
//! paid, fee inputs of the fee asset. Both groups share one limit on the
//! number of inputs a transaction can consume. For each group the selector
//! picks the subset whose total covers the target with the least change,
//! preferring more inputs when the change is equal (this consolidates dust).
//!
//! Selection and reservation happen under one process-wide lock, so two
//! concurrent spends can never pick the same commitment.

use std::sync::Arc;

use shroud_store::LedgerStore;
use shroud_types::{CommitmentRecord, EthAddress, TokenId, ZkpPublicKey};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::WalletError;
use crate::reservation::Reservation;

/// A chosen subset, as indices into the ascending candidate values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subset {
    pub indices: Vec<usize>,
    pub change: u128,
}

impl Subset {
    fn offset(mut self, by: usize) -> Self {
        for index in &mut self.indices {
            *index += by;
        }
        self
    }
}

/// Best subset of exactly `size` values covering `target`: the one with the
/// smallest sum that is still `>= target`.
///
/// `values` must be sorted ascending.
pub fn best_subset(values: &[u128], target: u128, size: usize) -> Option<Subset> {
    if size == 0 || size > values.len() {
        return None;
    }
    match size {
        1 => {
            let index = values.partition_point(|v| *v < target);
            values.get(index).map(|v| Subset {
                indices: vec![index],
                change: v - target,
            })
        }
        2 => {
            let (mut lo, mut hi) = (0, values.len() - 1);
            let mut best: Option<Subset> = None;
            while lo < hi {
                let sum = values[lo].saturating_add(values[hi]);
                if sum >= target {
                    let change = sum - target;
                    if best.as_ref().is_none_or(|b| change < b.change) {
                        best = Some(Subset {
                            indices: vec![lo, hi],
                            change,
                        });
                    }
                    hi -= 1;
                } else {
                    lo += 1;
                }
            }
            best
        }
        _ => {
            let mut best: Option<Subset> = None;
            for first in 0..=values.len() - size {
                let value = values[first];
                let rest = &values[first + 1..];
                let Some(tail) = best_subset(rest, target.saturating_sub(value), size - 1) else {
                    continue;
                };
                // The tail may overshoot a target that `value` already met.
                let tail_sum = tail.indices.iter().map(|i| rest[*i]).fold(0, u128::saturating_add);
                let change = value.saturating_add(tail_sum) - target;
                if best.as_ref().is_none_or(|b| change < b.change) {
                    let mut indices = vec![first];
                    indices.extend(tail.offset(first + 1).indices);
                    best = Some(Subset { indices, change });
                }
            }
            best
        }
    }
}

/// Smallest `n <= max_size` such that the `n` largest values cover `target`.
fn min_covering_size(values: &[u128], target: u128, max_size: usize) -> Option<usize> {
    let mut sum: u128 = 0;
    for (taken, value) in values.iter().rev().take(max_size).enumerate() {
        sum = sum.saturating_add(*value);
        if sum >= target {
            return Some(taken + 1);
        }
    }
    None
}

/// Pick inputs covering `target` using between one and `max_size` of the
/// ascending `values`: least change first, then more inputs.
pub fn plan_inputs(values: &[u128], target: u128, max_size: usize) -> Option<Subset> {
    let max_size = max_size.min(values.len());
    let min_size = min_covering_size(values, target, max_size)?;
    let mut best: Option<(usize, Subset)> = None;
    for size in min_size..=max_size {
        if let Some(subset) = best_subset(values, target, size) {
            if best.as_ref().is_none_or(|(_, b)| subset.change <= b.change) {
                best = Some((size, subset));
            }
        }
    }
    best.map(|(_, subset)| subset)
}

/// Input budget for one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionLimits {
    pub max_inputs: usize,
    pub max_fee_inputs: usize,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_inputs: shroud_sync::MAX_TRANSACTION_INPUTS,
            max_fee_inputs: shroud_sync::MAX_TRANSACTION_INPUTS - 1,
        }
    }
}

impl From<&shroud_sync::SyncConfig> for SelectionLimits {
    fn from(config: &shroud_sync::SyncConfig) -> Self {
        Self {
            max_inputs: config.max_inputs,
            max_fee_inputs: config.max_fee_inputs,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionRequest {
    pub owner: ZkpPublicKey,
    pub erc_address: EthAddress,
    pub token_id: TokenId,
    pub value: u128,
    pub fee_erc_address: EthAddress,
    pub fee: u128,
}

impl SelectionRequest {
    /// Fee and value can be drawn from one pool when they are the same
    /// fungible asset.
    fn merges_fee(&self) -> bool {
        self.fee > 0 && self.fee_erc_address == self.erc_address && self.token_id.is_fungible()
    }
}

/// Why a selection could not be made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shortfall {
    pub erc_address: EthAddress,
    pub required: u128,
    /// Most that the allowed number of inputs could have provided.
    pub available: u128,
}

#[derive(Debug)]
pub enum Selection {
    Selected(Reservation),
    Insufficient(Shortfall),
}

/// What a plan picked, before it is reserved.
#[derive(Debug, PartialEq, Eq)]
struct Plan {
    inputs: Vec<CommitmentRecord>,
    fee_inputs: Vec<CommitmentRecord>,
}

fn take(candidates: &[CommitmentRecord], subset: &Subset) -> Vec<CommitmentRecord> {
    subset.indices.iter().map(|i| candidates[*i].clone()).collect()
}

fn shortfall(values: &[u128], erc_address: EthAddress, required: u128, max_size: usize) -> Shortfall {
    Shortfall {
        erc_address,
        required,
        available: values.iter().rev().take(max_size).copied().fold(0, u128::saturating_add),
    }
}

fn values_of(candidates: &[CommitmentRecord]) -> Vec<u128> {
    candidates.iter().map(CommitmentRecord::value).collect()
}

/// Choose value and fee inputs from ascending candidate lists.
fn plan(
    request: &SelectionRequest,
    candidates: &[CommitmentRecord],
    fee_candidates: &[CommitmentRecord],
    limits: SelectionLimits,
) -> Result<Plan, Shortfall> {
    let values = values_of(candidates);

    if request.merges_fee() {
        let target = request.value.saturating_add(request.fee);
        return match plan_inputs(&values, target, limits.max_inputs) {
            Some(subset) => Ok(Plan {
                inputs: take(candidates, &subset),
                fee_inputs: Vec::new(),
            }),
            None => Err(shortfall(&values, request.erc_address, target, limits.max_inputs)),
        };
    }

    let fee_values = values_of(fee_candidates);
    let fee_budget = limits.max_fee_inputs.min(limits.max_inputs - 1);
    let fee_count = if request.fee == 0 {
        0
    } else if fee_values.is_empty() {
        return Err(shortfall(&fee_values, request.fee_erc_address, request.fee, fee_budget));
    } else {
        match min_covering_size(&fee_values, request.fee, fee_budget) {
            Some(count) => count,
            None => {
                return Err(shortfall(&fee_values, request.fee_erc_address, request.fee, fee_budget))
            }
        }
    };

    let value_budget = limits.max_inputs - fee_count;
    let Some(subset) = plan_inputs(&values, request.value, value_budget) else {
        return Err(shortfall(&values, request.erc_address, request.value, value_budget));
    };
    let inputs = take(candidates, &subset);

    let fee_inputs = if fee_count == 0 {
        Vec::new()
    } else {
        let fee_budget = limits.max_inputs - inputs.len();
        match plan_inputs(&fee_values, request.fee, fee_budget) {
            Some(subset) => take(fee_candidates, &subset),
            None => {
                return Err(shortfall(&fee_values, request.fee_erc_address, request.fee, fee_budget))
            }
        }
    };

    Ok(Plan { inputs, fee_inputs })
}

/// Selects and reserves inputs for spends. Clones share the lock.
#[derive(Clone)]
pub struct CoinSelector {
    store: Arc<dyn LedgerStore>,
    lock: Arc<Mutex<()>>,
    limits: SelectionLimits,
}

impl CoinSelector {
    pub fn new(store: Arc<dyn LedgerStore>, limits: SelectionLimits) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
            limits,
        }
    }

    pub fn limits(&self) -> SelectionLimits {
        self.limits
    }

    /// Pick inputs for `request` and mark them pending. The returned
    /// reservation releases them again unless it is finalized.
    pub async fn select(&self, request: &SelectionRequest) -> Result<Selection, WalletError> {
        let _guard = self.lock.lock().await;

        let store = Arc::clone(&self.store);
        let request = request.clone();
        let limits = self.limits;
        tokio::task::spawn_blocking(move || reserve(store, &request, limits))
            .await
            .map_err(|e| WalletError::Other(format!("selection task failed: {e}")))?
    }
}

fn reserve(
    store: Arc<dyn LedgerStore>,
    request: &SelectionRequest,
    limits: SelectionLimits,
) -> Result<Selection, WalletError> {
    let candidates =
        store.spendable_commitments(&request.owner, &request.erc_address, &request.token_id)?;
    let fee_candidates = if request.fee == 0 || request.merges_fee() {
        Vec::new()
    } else {
        store.spendable_commitments(&request.owner, &request.fee_erc_address, &TokenId::ZERO)?
    };

    let plan = match plan(request, &candidates, &fee_candidates, limits) {
        Ok(plan) => plan,
        Err(shortfall) => {
            info!(
                asset = %shortfall.erc_address,
                required = shortfall.required,
                available = shortfall.available,
                "insufficient commitments for spend"
            );
            return Ok(Selection::Insufficient(shortfall));
        }
    };

    let hashes: Vec<_> = plan
        .inputs
        .iter()
        .chain(&plan.fee_inputs)
        .map(|c| c.hash)
        .collect();
    store.mark_pending(&hashes)?;
    debug!(
        inputs = plan.inputs.len(),
        fee_inputs = plan.fee_inputs.len(),
        "reserved commitments"
    );
    Ok(Selection::Selected(Reservation::new(
        store,
        plan.inputs,
        plan.fee_inputs,
    )))
}
