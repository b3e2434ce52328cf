//! Balance aggregation over commitment records.

use serde::Serialize;
use shroud_types::{CommitmentRecord, EthAddress, ZkpPublicKey};
use std::collections::BTreeMap;

/// Totals per owner and asset. NFTs (non-zero token id) count one unit each.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Balances(BTreeMap<ZkpPublicKey, BTreeMap<EthAddress, u128>>);

impl Balances {
    /// Sum every record accepted by `include`.
    pub fn aggregate<'a, I>(records: I, include: fn(&CommitmentRecord) -> bool) -> Self
    where
        I: IntoIterator<Item = &'a CommitmentRecord>,
    {
        let mut totals: BTreeMap<ZkpPublicKey, BTreeMap<EthAddress, u128>> = BTreeMap::new();
        for record in records.into_iter().filter(|r| include(r)) {
            let slot = totals
                .entry(*record.owner())
                .or_default()
                .entry(*record.erc_address())
                .or_default();
            *slot = slot.saturating_add(record.balance_weight());
        }
        Self(totals)
    }

    pub fn get(&self, owner: &ZkpPublicKey, erc_address: &EthAddress) -> u128 {
        self.0
            .get(owner)
            .and_then(|assets| assets.get(erc_address))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ZkpPublicKey, &EthAddress, u128)> {
        self.0
            .iter()
            .flat_map(|(owner, assets)| assets.iter().map(move |(erc, v)| (owner, erc, *v)))
    }
}

pub fn is_spendable(record: &CommitmentRecord) -> bool {
    record.is_spendable()
}

/// Deposited but not yet seen in a block.
pub fn is_pending_deposit(record: &CommitmentRecord) -> bool {
    record.is_deposited && !record.is_nullified && record.on_chain.is_none()
}

/// Spent locally but the spend is not yet seen in a block.
pub fn is_pending_spent(record: &CommitmentRecord) -> bool {
    record.is_nullified && record.nullified_on_chain.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_types::{CommitmentHash, NullifierHash, Preimage, Salt, TokenId};

    fn record(owner: u8, erc: u8, token: u8, value: u128, on_chain: Option<u64>) -> CommitmentRecord {
        let mut r = CommitmentRecord::new(
            CommitmentHash::new([value as u8; 32]),
            Preimage {
                erc_address: EthAddress::new([erc; 20]),
                token_id: TokenId::new([token; 32]),
                value,
                owner: ZkpPublicKey::new([owner; 32]),
                salt: Salt::ZERO,
            },
            NullifierHash::ZERO,
        );
        r.on_chain = on_chain;
        r
    }

    #[test]
    fn fungible_values_add_and_nfts_count_once() {
        let records = vec![
            record(1, 1, 0, 10, Some(1)),
            record(1, 1, 0, 15, Some(2)),
            record(1, 2, 7, 999, Some(2)),
            record(1, 2, 8, 999, Some(2)),
        ];
        let balances = Balances::aggregate(&records, is_spendable);
        let owner = ZkpPublicKey::new([1; 32]);
        assert_eq!(balances.get(&owner, &EthAddress::new([1; 20])), 25);
        assert_eq!(balances.get(&owner, &EthAddress::new([2; 20])), 2);
    }

    #[test]
    fn unconfirmed_and_spent_are_excluded() {
        let mut spent = record(1, 1, 0, 5, Some(1));
        spent.is_nullified = true;
        let records = vec![record(1, 1, 0, 10, None), spent];
        assert!(Balances::aggregate(&records, is_spendable).is_empty());
    }

    #[test]
    fn pending_filters() {
        let deposit = record(1, 1, 0, 10, None).deposited();
        let mut spent = record(1, 1, 0, 4, Some(3));
        spent.is_nullified = true;
        assert!(is_pending_deposit(&deposit));
        assert!(!is_pending_deposit(&spent));
        assert!(is_pending_spent(&spent));
        spent.nullified_on_chain = Some(4);
        assert!(!is_pending_spent(&spent));
    }
}
