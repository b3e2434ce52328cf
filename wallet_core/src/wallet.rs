//! The wallet: spending, depositing, and adding keys.

use std::future::Future;
use std::sync::Arc;

use shroud_crypto::{commitment_hash, encrypt_note, new_commitment_record, random_salt, NoteSecrets, ZkpKeys};
use shroud_store::LedgerStore;
use shroud_sync::KeyRing;
use shroud_types::{
    Clock, CommitmentRecord, EthAddress, L2Transaction, Preimage, TokenId, TransactionRecord,
    TransactionType, TxHash, ZkpPublicKey,
};
use tracing::{info, warn};

use crate::balance::BalanceSummary;
use crate::error::WalletError;
use crate::reservation::Reservation;
use crate::selector::{CoinSelector, Selection, SelectionLimits, SelectionRequest, Shortfall};
use crate::sync::CommitmentSync;
use crate::transaction_builder::{DraftParts, TransactionDraft};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpendKind {
    /// Pay `recipient` on L2.
    Transfer { recipient: ZkpPublicKey },
    /// Move value out to L1.
    Withdraw,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendRequest {
    pub kind: SpendKind,
    pub erc_address: EthAddress,
    pub token_id: TokenId,
    pub value: u128,
    pub fee_erc_address: EthAddress,
    pub fee: u128,
}

#[derive(Debug)]
pub enum SpendOutcome {
    Submitted {
        transaction_hash: TxHash,
        draft: TransactionDraft,
    },
    Insufficient(Shortfall),
}

/// A locally created deposit, to be submitted on L1.
#[derive(Clone, Debug)]
pub struct DepositReceipt {
    pub commitment: CommitmentRecord,
    pub transaction: L2Transaction,
}

pub struct Wallet {
    store: Arc<dyn LedgerStore>,
    keys: KeyRing,
    selector: CoinSelector,
    clock: Arc<dyn Clock>,
}

impl Wallet {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        keys: KeyRing,
        limits: SelectionLimits,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let selector = CoinSelector::new(Arc::clone(&store), limits);
        Self {
            store,
            keys,
            selector,
            clock,
        }
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub fn selector(&self) -> &CoinSelector {
        &self.selector
    }

    pub fn balances(&self) -> Result<BalanceSummary, WalletError> {
        BalanceSummary::load(self.store.as_ref())
    }

    /// Spend from `sender`'s commitments.
    ///
    /// Inputs are reserved, the transaction is assembled, and `submit` is
    /// awaited with it. On success the inputs are marked spent and the
    /// sender's outputs and the transaction are stored. On any failure the
    /// reservation is released before the error is returned.
    pub async fn spend<F, Fut>(
        &self,
        sender: &ZkpKeys,
        request: SpendRequest,
        submit: F,
    ) -> Result<SpendOutcome, WalletError>
    where
        F: FnOnce(TransactionDraft) -> Fut,
        Fut: Future<Output = Result<TxHash, WalletError>>,
    {
        let selection = self
            .selector
            .select(&SelectionRequest {
                owner: sender.zkp_public_key,
                erc_address: request.erc_address,
                token_id: request.token_id,
                value: request.value,
                fee_erc_address: request.fee_erc_address,
                fee: request.fee,
            })
            .await?;
        let reservation = match selection {
            Selection::Selected(reservation) => reservation,
            Selection::Insufficient(shortfall) => return Ok(SpendOutcome::Insufficient(shortfall)),
        };

        let draft = match build_draft(sender, &request, &reservation) {
            Ok(draft) => draft,
            Err(e) => return release_then(reservation, e),
        };
        let transaction_type = draft.transaction_type();

        let transaction_hash = match submit(draft.clone()).await {
            Ok(hash) => hash,
            Err(e) => return release_then(reservation, e),
        };

        reservation.finalize(transaction_hash, transaction_type)?;
        self.store_outputs(&draft)?;
        let mut record =
            TransactionRecord::from_l2(&draft.to_l2_transaction(transaction_hash), self.clock.now());
        record.is_decrypted = true;
        self.store.put_transaction(&record)?;

        info!(
            tx = %transaction_hash,
            kind = transaction_type.as_str(),
            inputs = draft.inputs().len(),
            "spend submitted"
        );
        Ok(SpendOutcome::Submitted {
            transaction_hash,
            draft,
        })
    }

    /// Store outputs owned by one of our keys as unconfirmed commitments.
    fn store_outputs(&self, draft: &TransactionDraft) -> Result<(), WalletError> {
        let keys = self.keys.snapshot();
        for preimage in draft.outputs() {
            let Some(owner) = keys.iter().find(|k| k.zkp_public_key == preimage.owner) else {
                continue;
            };
            let record = new_commitment_record(preimage.clone(), &owner.nullifier_key);
            self.store.put_commitment(&record)?;
        }
        Ok(())
    }

    /// Create and store a deposit commitment for `owner`. It becomes
    /// spendable once a block confirms it.
    pub fn record_deposit(
        &self,
        owner: &ZkpKeys,
        erc_address: EthAddress,
        token_id: TokenId,
        value: u128,
        fee: u128,
    ) -> Result<DepositReceipt, WalletError> {
        let preimage = Preimage {
            erc_address,
            token_id,
            value,
            owner: owner.zkp_public_key,
            salt: random_salt(),
        };
        let draft = TransactionDraft::assemble(DraftParts {
            transaction_type: TransactionType::Deposit,
            erc_address,
            token_id,
            value,
            fee,
            inputs: Vec::new(),
            nullifiers: Vec::new(),
            output_hashes: vec![commitment_hash(&preimage)],
            outputs: vec![preimage.clone()],
            encrypted_note: None,
        })?;
        let transaction = draft.to_l2_transaction(draft.digest());

        let commitment = new_commitment_record(preimage, &owner.nullifier_key).deposited();
        self.store.put_commitment(&commitment)?;
        let mut record = TransactionRecord::from_l2(&transaction, self.clock.now());
        record.is_decrypted = true;
        self.store.put_transaction(&record)?;

        info!(commitment = %commitment.hash, value, "deposit recorded");
        Ok(DepositReceipt {
            commitment,
            transaction,
        })
    }

    /// Start tracking `keys` and recover any stored notes addressed to them.
    /// Returns how many commitments the rescan recovered.
    pub async fn add_keys(&self, keys: ZkpKeys) -> Result<usize, WalletError> {
        if !self.keys.add(keys.clone()) {
            return Ok(0);
        }
        let sync = CommitmentSync::new(Arc::clone(&self.store));
        tokio::task::spawn_blocking(move || sync.rescan(&[keys]))
            .await
            .map_err(|e| WalletError::Other(format!("rescan task failed: {e}")))?
    }
}

fn release_then<T>(reservation: Reservation, error: WalletError) -> Result<T, WalletError> {
    if let Err(release_error) = reservation.release() {
        warn!(error = %release_error, "failed to release reservation");
    }
    Err(error)
}

/// Outputs in order: the recipient's (so its note matches the first
/// commitment), the sender's change, then the sender's fee change.
fn build_draft(
    sender: &ZkpKeys,
    request: &SpendRequest,
    reservation: &Reservation,
) -> Result<TransactionDraft, WalletError> {
    let merged_fee = reservation.fee_inputs().is_empty() && request.fee > 0;
    let spent = if merged_fee {
        request.value.saturating_add(request.fee)
    } else {
        request.value
    };
    let change = reservation.input_value().checked_sub(spent).ok_or_else(|| {
        WalletError::StructureMismatch("inputs do not cover the spend".into())
    })?;
    let fee_change = if reservation.fee_inputs().is_empty() {
        0
    } else {
        reservation
            .fee_input_value()
            .checked_sub(request.fee)
            .ok_or_else(|| WalletError::StructureMismatch("fee inputs do not cover the fee".into()))?
    };

    let mut outputs = Vec::new();
    let mut encrypted_note = None;
    if let SpendKind::Transfer { recipient } = request.kind {
        let preimage = Preimage {
            erc_address: request.erc_address,
            token_id: request.token_id,
            value: request.value,
            owner: recipient,
            salt: random_salt(),
        };
        encrypted_note = Some(encrypt_note(&NoteSecrets::from_preimage(&preimage), &recipient)?);
        outputs.push(preimage);
    }
    if change > 0 {
        outputs.push(Preimage {
            erc_address: request.erc_address,
            token_id: request.token_id,
            value: change,
            owner: sender.zkp_public_key,
            salt: random_salt(),
        });
    }
    if fee_change > 0 {
        outputs.push(Preimage {
            erc_address: request.fee_erc_address,
            token_id: TokenId::ZERO,
            value: fee_change,
            owner: sender.zkp_public_key,
            salt: random_salt(),
        });
    }

    let transaction_type = match request.kind {
        SpendKind::Withdraw => TransactionType::Withdraw,
        SpendKind::Transfer { .. } if reservation.inputs().len() == 1 => {
            TransactionType::SingleTransfer
        }
        SpendKind::Transfer { .. } => TransactionType::DoubleTransfer,
    };

    TransactionDraft::assemble(DraftParts {
        transaction_type,
        erc_address: request.erc_address,
        token_id: request.token_id,
        value: request.value,
        fee: request.fee,
        inputs: reservation.hashes(),
        nullifiers: reservation
            .inputs()
            .iter()
            .chain(reservation.fee_inputs())
            .map(|c| c.nullifier)
            .collect(),
        output_hashes: outputs.iter().map(commitment_hash).collect(),
        outputs,
        encrypted_note,
    })
}
