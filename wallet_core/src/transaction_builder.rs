//! Transaction assembly.
//!
//! Turns a reservation plus freshly built output preimages into the
//! transaction handed to the proposer, checking that its parts line up.

use serde::Serialize;
use shroud_crypto::{blake2b_256_multi, commitment_hash};
use shroud_sync::MAX_TRANSACTION_INPUTS;
use shroud_types::{
    CommitmentHash, EncryptedNote, EthAddress, L2Transaction, NullifierHash, Preimage, TokenId,
    TransactionType, TxHash,
};

use crate::error::WalletError;

/// Loose parts of a transaction, before validation.
#[derive(Clone, Debug)]
pub struct DraftParts {
    pub transaction_type: TransactionType,
    pub erc_address: EthAddress,
    pub token_id: TokenId,
    pub value: u128,
    pub fee: u128,
    pub inputs: Vec<CommitmentHash>,
    pub nullifiers: Vec<NullifierHash>,
    pub outputs: Vec<Preimage>,
    pub output_hashes: Vec<CommitmentHash>,
    pub encrypted_note: Option<EncryptedNote>,
}

/// A structurally valid transaction, ready to be proven and submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionDraft {
    transaction_type: TransactionType,
    erc_address: EthAddress,
    token_id: TokenId,
    value: u128,
    fee: u128,
    inputs: Vec<CommitmentHash>,
    nullifiers: Vec<NullifierHash>,
    outputs: Vec<Preimage>,
    output_hashes: Vec<CommitmentHash>,
    encrypted_note: Option<EncryptedNote>,
}

impl TransactionDraft {
    pub fn assemble(parts: DraftParts) -> Result<Self, WalletError> {
        if parts.inputs.len() != parts.nullifiers.len() {
            return Err(WalletError::StructureMismatch(format!(
                "{} inputs but {} nullifiers",
                parts.inputs.len(),
                parts.nullifiers.len()
            )));
        }
        if parts.outputs.len() != parts.output_hashes.len() {
            return Err(WalletError::StructureMismatch(format!(
                "{} output preimages but {} output commitments",
                parts.outputs.len(),
                parts.output_hashes.len()
            )));
        }
        if parts.inputs.len() > MAX_TRANSACTION_INPUTS {
            return Err(WalletError::StructureMismatch(format!(
                "{} inputs exceeds the limit of {MAX_TRANSACTION_INPUTS}",
                parts.inputs.len()
            )));
        }
        match parts.transaction_type {
            TransactionType::Deposit if !parts.inputs.is_empty() => {
                return Err(WalletError::StructureMismatch(
                    "deposit cannot consume inputs".into(),
                ))
            }
            TransactionType::Deposit => {}
            _ if parts.inputs.is_empty() => {
                return Err(WalletError::StructureMismatch(format!(
                    "{} needs at least one input",
                    parts.transaction_type.as_str()
                )))
            }
            _ => {}
        }
        for (index, (preimage, hash)) in parts.outputs.iter().zip(&parts.output_hashes).enumerate() {
            if commitment_hash(preimage) != *hash {
                return Err(WalletError::StructureMismatch(format!(
                    "output {index} does not match its preimage"
                )));
            }
        }

        Ok(Self {
            transaction_type: parts.transaction_type,
            erc_address: parts.erc_address,
            token_id: parts.token_id,
            value: parts.value,
            fee: parts.fee,
            inputs: parts.inputs,
            nullifiers: parts.nullifiers,
            outputs: parts.outputs,
            output_hashes: parts.output_hashes,
            encrypted_note: parts.encrypted_note,
        })
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn inputs(&self) -> &[CommitmentHash] {
        &self.inputs
    }

    pub fn nullifiers(&self) -> &[NullifierHash] {
        &self.nullifiers
    }

    pub fn outputs(&self) -> &[Preimage] {
        &self.outputs
    }

    pub fn output_hashes(&self) -> &[CommitmentHash] {
        &self.output_hashes
    }

    pub fn encrypted_note(&self) -> Option<&EncryptedNote> {
        self.encrypted_note.as_ref()
    }

    /// Content digest over the published fields. Usable as the transaction
    /// hash when the proposer does not assign one.
    pub fn digest(&self) -> TxHash {
        let value = self.value.to_be_bytes();
        let fee = self.fee.to_be_bytes();
        let mut parts: Vec<&[u8]> = vec![
            self.transaction_type.as_str().as_bytes(),
            self.erc_address.as_bytes().as_slice(),
            self.token_id.as_bytes().as_slice(),
            &value[..],
            &fee[..],
        ];
        parts.extend(self.output_hashes.iter().map(|h| h.as_bytes().as_slice()));
        parts.extend(self.nullifiers.iter().map(|n| n.as_bytes().as_slice()));
        TxHash::new(blake2b_256_multi(&parts))
    }

    /// The transaction as it will appear in a block.
    pub fn to_l2_transaction(&self, transaction_hash: TxHash) -> L2Transaction {
        L2Transaction {
            transaction_hash,
            transaction_type: self.transaction_type,
            erc_address: self.erc_address,
            token_id: self.token_id,
            value: self.value,
            fee: self.fee,
            commitments: self.output_hashes.clone(),
            nullifiers: self.nullifiers.clone(),
            encrypted_note: self.encrypted_note.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_types::{Salt, ZkpPublicKey};

    fn preimage(value: u128) -> Preimage {
        Preimage {
            erc_address: EthAddress::new([1; 20]),
            token_id: TokenId::ZERO,
            value,
            owner: ZkpPublicKey::new([2; 32]),
            salt: Salt::new([value as u8; 32]),
        }
    }

    fn parts() -> DraftParts {
        let output = preimage(5);
        DraftParts {
            transaction_type: TransactionType::SingleTransfer,
            erc_address: EthAddress::new([1; 20]),
            token_id: TokenId::ZERO,
            value: 5,
            fee: 0,
            inputs: vec![CommitmentHash::new([3; 32])],
            nullifiers: vec![NullifierHash::new([4; 32])],
            output_hashes: vec![commitment_hash(&output)],
            outputs: vec![output],
            encrypted_note: None,
        }
    }

    #[test]
    fn assembles_consistent_parts() {
        let draft = TransactionDraft::assemble(parts()).unwrap();
        let tx = draft.to_l2_transaction(draft.digest());
        assert_eq!(tx.commitments, draft.output_hashes());
        assert_eq!(tx.nullifiers, draft.nullifiers());
        assert_eq!(tx.transaction_hash, draft.digest());
    }

    #[test]
    fn nullifier_count_must_match_inputs() {
        let mut parts = parts();
        parts.nullifiers.push(NullifierHash::new([5; 32]));
        assert!(matches!(
            TransactionDraft::assemble(parts),
            Err(WalletError::StructureMismatch(_))
        ));
    }

    #[test]
    fn output_hashes_must_match_preimages() {
        let mut parts = parts();
        parts.outputs.push(preimage(6));
        assert!(matches!(
            TransactionDraft::assemble(parts.clone()),
            Err(WalletError::StructureMismatch(_))
        ));

        parts.output_hashes.push(CommitmentHash::new([8; 32]));
        assert!(matches!(
            TransactionDraft::assemble(parts),
            Err(WalletError::StructureMismatch(_))
        ));
    }

    #[test]
    fn transfers_need_inputs_and_deposits_refuse_them() {
        let mut transfer = parts();
        transfer.inputs.clear();
        transfer.nullifiers.clear();
        assert!(TransactionDraft::assemble(transfer).is_err());

        let mut deposit = parts();
        deposit.transaction_type = TransactionType::Deposit;
        assert!(TransactionDraft::assemble(deposit).is_err());
    }

    #[test]
    fn digest_depends_on_outputs() {
        let a = TransactionDraft::assemble(parts()).unwrap();
        let mut other = parts();
        let output = preimage(7);
        other.output_hashes = vec![commitment_hash(&output)];
        other.outputs = vec![output];
        let b = TransactionDraft::assemble(other).unwrap();
        assert_ne!(a.digest(), b.digest());
    }
}
