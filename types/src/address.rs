//! Asset identifiers.

fixed_bytes!(
    /// A 20-byte L1 contract or account address (token contract, proposer).
    EthAddress,
    20
);

fixed_bytes!(
    /// Token identifier within an asset contract. Zero for fungible tokens.
    TokenId,
    32
);

impl TokenId {
    /// Fungible assets use the zero token id; any other id is a unit-valued NFT.
    pub fn is_fungible(&self) -> bool {
        self.is_zero()
    }
}
