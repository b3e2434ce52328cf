//! L2 transactions as published on-chain and as recorded locally.

use serde::{Deserialize, Serialize};

use crate::address::{EthAddress, TokenId};
use crate::hash::{CommitmentHash, L1TxHash, NullifierHash, TxHash};
use crate::keys::ZkpPublicKey;
use crate::time::Timestamp;
use crate::tree::MerkleWitness;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    SingleTransfer,
    DoubleTransfer,
    Withdraw,
}

impl TransactionType {
    /// Transfers hand new commitments to a recipient through an encrypted note.
    pub fn creates_commitments(&self) -> bool {
        matches!(self, Self::SingleTransfer | Self::DoubleTransfer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::SingleTransfer => "single_transfer",
            Self::DoubleTransfer => "double_transfer",
            Self::Withdraw => "withdraw",
        }
    }
}

/// Encrypted preimage secrets for the recipient of a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedNote {
    pub ephemeral_public_key: ZkpPublicKey,
    #[serde(with = "crate::hash::hex_bytes")]
    pub ciphertext: Vec<u8>,
}

/// A transaction as carried in a proposed block. Commitment and nullifier
/// arrays are fixed-width; unused slots hold the zero hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Transaction {
    pub transaction_hash: TxHash,
    pub transaction_type: TransactionType,
    pub erc_address: EthAddress,
    #[serde(default)]
    pub token_id: TokenId,
    #[serde(default)]
    pub value: u128,
    #[serde(default)]
    pub fee: u128,
    pub commitments: Vec<CommitmentHash>,
    pub nullifiers: Vec<NullifierHash>,
    #[serde(default)]
    pub encrypted_note: Option<EncryptedNote>,
}

impl L2Transaction {
    pub fn live_commitments(&self) -> Vec<CommitmentHash> {
        self.commitments.iter().filter(|c| !c.is_zero()).copied().collect()
    }

    pub fn live_nullifiers(&self) -> Vec<NullifierHash> {
        self.nullifiers.iter().filter(|n| !n.is_zero()).copied().collect()
    }
}

/// A transaction the wallet knows about: one it built, or one it observed
/// touching its commitments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_hash: TxHash,
    pub transaction_type: TransactionType,
    pub commitments: Vec<CommitmentHash>,
    pub nullifiers: Vec<NullifierHash>,
    pub erc_address: EthAddress,
    pub token_id: TokenId,
    pub value: u128,
    pub fee: u128,
    pub created_time: Timestamp,
    pub block_number_l2: Option<u64>,
    pub block_number_l1: Option<u64>,
    pub transaction_hash_l1: Option<L1TxHash>,
    pub is_decrypted: bool,
    pub encrypted_note: Option<EncryptedNote>,
    /// Membership proof in its block's transaction-hash tree (withdrawals).
    pub witness: Option<MerkleWitness>,
}

impl TransactionRecord {
    /// Record for an on-chain transaction; zero placeholders are dropped.
    pub fn from_l2(tx: &L2Transaction, created_time: Timestamp) -> Self {
        Self {
            transaction_hash: tx.transaction_hash,
            transaction_type: tx.transaction_type,
            commitments: tx.live_commitments(),
            nullifiers: tx.live_nullifiers(),
            erc_address: tx.erc_address,
            token_id: tx.token_id,
            value: tx.value,
            fee: tx.fee,
            created_time,
            block_number_l2: None,
            block_number_l1: None,
            transaction_hash_l1: None,
            is_decrypted: false,
            encrypted_note: tx.encrypted_note.clone(),
            witness: None,
        }
    }

    pub fn shares_outputs_or_inputs(
        &self,
        commitments: &[CommitmentHash],
        nullifiers: &[NullifierHash],
    ) -> bool {
        self.commitments.iter().any(|c| commitments.contains(c))
            || self.nullifiers.iter().any(|n| nullifiers.contains(n))
    }
}
