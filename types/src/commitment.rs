//! Commitment preimages and the locally stored commitment record.

use serde::{Deserialize, Serialize};

use crate::address::{EthAddress, TokenId};
use crate::hash::{CommitmentHash, L1TxHash, NullifierHash, TxHash};
use crate::keys::{Salt, ZkpPublicKey};
use crate::transaction::TransactionType;
use crate::tree::MerkleWitness;

/// The secret fields whose digest is published on-chain as a commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preimage {
    pub erc_address: EthAddress,
    pub token_id: TokenId,
    pub value: u128,
    pub owner: ZkpPublicKey,
    pub salt: Salt,
}

/// A commitment owned by one of the wallet's keys, with its lifecycle state.
///
/// `on_chain` and `nullified_on_chain` hold the L2 block number that confirmed
/// the commitment or its spend; `None` means "not yet observed on-chain".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentRecord {
    pub hash: CommitmentHash,
    pub preimage: Preimage,
    pub nullifier: NullifierHash,
    pub is_deposited: bool,
    pub on_chain: Option<u64>,
    pub is_pending_nullification: bool,
    pub is_nullified: bool,
    pub nullified_on_chain: Option<u64>,
    /// L1 block that carried the block confirming or spending this commitment.
    pub block_number_l1: Option<u64>,
    pub committed_l1: Option<L1TxHash>,
    pub nullified_l1: Option<L1TxHash>,
    /// Local transaction that spends this commitment.
    pub spent_in: Option<TxHash>,
    pub spend_type: Option<TransactionType>,
    pub witness: Option<MerkleWitness>,
}

impl CommitmentRecord {
    /// A fresh, unconfirmed, unspent record.
    pub fn new(hash: CommitmentHash, preimage: Preimage, nullifier: NullifierHash) -> Self {
        Self {
            hash,
            preimage,
            nullifier,
            is_deposited: false,
            on_chain: None,
            is_pending_nullification: false,
            is_nullified: false,
            nullified_on_chain: None,
            block_number_l1: None,
            committed_l1: None,
            nullified_l1: None,
            spent_in: None,
            spend_type: None,
            witness: None,
        }
    }

    pub fn deposited(mut self) -> Self {
        self.is_deposited = true;
        self
    }

    pub fn owner(&self) -> &ZkpPublicKey {
        &self.preimage.owner
    }

    pub fn erc_address(&self) -> &EthAddress {
        &self.preimage.erc_address
    }

    pub fn token_id(&self) -> &TokenId {
        &self.preimage.token_id
    }

    pub fn value(&self) -> u128 {
        self.preimage.value
    }

    /// Confirmed on-chain, not spent (locally or on-chain), and not reserved
    /// by an in-flight spend.
    pub fn is_spendable(&self) -> bool {
        !self.is_nullified
            && self.nullified_on_chain.is_none()
            && self.on_chain.is_some()
            && !self.is_pending_nullification
    }

    /// Contribution to a balance: NFTs count as one unit, fungible tokens by value.
    pub fn balance_weight(&self) -> u128 {
        if self.preimage.token_id.is_fungible() {
            self.preimage.value
        } else {
            1
        }
    }
}
