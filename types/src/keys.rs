//! Key material for commitment ownership and nullification.

use zeroize::{Zeroize, ZeroizeOnDrop};

fixed_bytes!(
    /// A 32-byte X25519 public key. Also serves as the compressed ownership tag
    /// used to index commitments.
    ZkpPublicKey,
    32
);

fixed_bytes!(
    /// Blinding salt of a commitment preimage.
    Salt,
    32
);

/// Secret scalar used to decrypt notes addressed to this wallet.
///
/// Does not implement `Debug`, `Serialize`, or `Copy`. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZkpPrivateKey(pub [u8; 32]);

/// Secret used to derive nullifiers of owned commitments. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct NullifierKey(pub [u8; 32]);
