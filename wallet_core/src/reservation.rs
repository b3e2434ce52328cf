//! Reserved spend inputs.

use std::fmt;
use std::sync::Arc;

use shroud_store::LedgerStore;
use shroud_types::{CommitmentHash, CommitmentRecord, TransactionType, TxHash};
use tracing::{debug, warn};

use crate::error::WalletError;

/// Commitments marked pending for one in-flight spend.
///
/// Dropping a reservation without finalizing it releases the commitments, so
/// an abandoned or failed spend never leaves them locked.
pub struct Reservation {
    store: Arc<dyn LedgerStore>,
    inputs: Vec<CommitmentRecord>,
    fee_inputs: Vec<CommitmentRecord>,
    settled: bool,
}

impl Reservation {
    pub(crate) fn new(
        store: Arc<dyn LedgerStore>,
        inputs: Vec<CommitmentRecord>,
        fee_inputs: Vec<CommitmentRecord>,
    ) -> Self {
        Self {
            store,
            inputs,
            fee_inputs,
            settled: false,
        }
    }

    pub fn inputs(&self) -> &[CommitmentRecord] {
        &self.inputs
    }

    pub fn fee_inputs(&self) -> &[CommitmentRecord] {
        &self.fee_inputs
    }

    pub fn input_value(&self) -> u128 {
        self.inputs
            .iter()
            .map(CommitmentRecord::value)
            .fold(0, u128::saturating_add)
    }

    pub fn fee_input_value(&self) -> u128 {
        self.fee_inputs
            .iter()
            .map(CommitmentRecord::value)
            .fold(0, u128::saturating_add)
    }

    /// Value inputs first, then fee inputs.
    pub fn hashes(&self) -> Vec<CommitmentHash> {
        self.inputs
            .iter()
            .chain(&self.fee_inputs)
            .map(|c| c.hash)
            .collect()
    }

    /// Make the commitments spendable again.
    pub fn release(mut self) -> Result<usize, WalletError> {
        self.settled = true;
        let released = self.store.clear_pending(&self.hashes())?;
        debug!(released, "released reservation");
        Ok(released)
    }

    /// Record that `spent_in` consumes the reserved commitments.
    pub fn finalize(
        mut self,
        spent_in: TxHash,
        spend_type: TransactionType,
    ) -> Result<usize, WalletError> {
        let spent = self.store.mark_nullified(&self.hashes(), spent_in, spend_type)?;
        self.settled = true;
        debug!(tx = %spent_in, spent, "finalized reservation");
        Ok(spent)
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(e) = self.store.clear_pending(&self.hashes()) {
            warn!(error = %e, "failed to release dropped reservation");
        }
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("inputs", &self.inputs.len())
            .field("fee_inputs", &self.fee_inputs.len())
            .field("settled", &self.settled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_nullables::NullStore;
    use shroud_store::CommitmentStore;
    use shroud_types::{EthAddress, NullifierHash, Preimage, Salt, TokenId, ZkpPublicKey};

    fn stored(store: &NullStore, seed: u8) -> CommitmentRecord {
        let mut record = CommitmentRecord::new(
            CommitmentHash::new([seed; 32]),
            Preimage {
                erc_address: EthAddress::new([1; 20]),
                token_id: TokenId::ZERO,
                value: seed as u128,
                owner: ZkpPublicKey::new([9; 32]),
                salt: Salt::new([seed; 32]),
            },
            NullifierHash::new([seed; 32]),
        );
        record.on_chain = Some(1);
        record.is_pending_nullification = true;
        store.put_commitment(&record).unwrap();
        record
    }

    #[test]
    fn drop_releases_pending_commitments() {
        let store = Arc::new(NullStore::new());
        let record = stored(&store, 3);
        let reservation = Reservation::new(store.clone(), vec![record.clone()], Vec::new());
        drop(reservation);
        let after = store.get_commitment(&record.hash).unwrap().unwrap();
        assert!(!after.is_pending_nullification);
        assert!(after.is_spendable());
    }

    #[test]
    fn input_values_saturate() {
        let store = Arc::new(NullStore::new());
        let mut huge = [stored(&store, 3), stored(&store, 4)];
        for record in &mut huge {
            record.preimage.value = u128::MAX;
        }
        let reservation = Reservation::new(store.clone(), huge.to_vec(), huge.to_vec());
        assert_eq!(reservation.input_value(), u128::MAX);
        assert_eq!(reservation.fee_input_value(), u128::MAX);
    }

    #[test]
    fn finalize_marks_spent_and_skips_release() {
        let store = Arc::new(NullStore::new());
        let input = stored(&store, 3);
        let fee = stored(&store, 4);
        let reservation = Reservation::new(store.clone(), vec![input.clone()], vec![fee.clone()]);
        assert_eq!(reservation.input_value(), 3);
        assert_eq!(reservation.fee_input_value(), 4);

        let spent = reservation
            .finalize(TxHash::new([7; 32]), TransactionType::SingleTransfer)
            .unwrap();
        assert_eq!(spent, 2);
        for hash in [input.hash, fee.hash] {
            let after = store.get_commitment(&hash).unwrap().unwrap();
            assert!(after.is_nullified);
            assert!(!after.is_pending_nullification);
            assert_eq!(after.spent_in, Some(TxHash::new([7; 32])));
        }
    }

    #[test]
    fn release_reports_count() {
        let store = Arc::new(NullStore::new());
        let a = stored(&store, 1);
        let b = stored(&store, 2);
        let reservation = Reservation::new(store.clone(), vec![a, b], Vec::new());
        assert_eq!(reservation.release().unwrap(), 2);
    }
}
