//! KEM-DEM encryption of commitment secrets for the recipient of a transfer.
//!
//! An ephemeral X25519 key agrees a shared secret with the recipient's public
//! key, Blake2b turns it into a ChaCha20-Poly1305 key, and the nonce is taken
//! from the ephemeral public key (first 12 bytes), which is fresh per note.
//! The recipient's public key is not encrypted: the recipient re-derives the
//! commitment hash with its own key to confirm the note is theirs.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use shroud_types::{EncryptedNote, EthAddress, Preimage, Salt, TokenId, ZkpPrivateKey, ZkpPublicKey};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::hash::blake2b_256_multi;

const NOTE_KDF_DOMAIN: &[u8] = b"shroud-note-kdf";
const PLAINTEXT_LEN: usize = 20 + 32 + 16 + 32;

/// The preimage fields a recipient cannot know in advance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteSecrets {
    pub erc_address: EthAddress,
    pub token_id: TokenId,
    pub value: u128,
    pub salt: Salt,
}

impl NoteSecrets {
    pub fn from_preimage(preimage: &Preimage) -> Self {
        Self {
            erc_address: preimage.erc_address,
            token_id: preimage.token_id,
            value: preimage.value,
            salt: preimage.salt,
        }
    }

    /// Rebuild the preimage assuming `owner` is the recipient.
    pub fn into_preimage(self, owner: ZkpPublicKey) -> Preimage {
        Preimage {
            erc_address: self.erc_address,
            token_id: self.token_id,
            value: self.value,
            owner,
            salt: self.salt,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PLAINTEXT_LEN);
        out.extend_from_slice(self.erc_address.as_bytes());
        out.extend_from_slice(self.token_id.as_bytes());
        out.extend_from_slice(&self.value.to_be_bytes());
        out.extend_from_slice(self.salt.as_bytes());
        out
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PLAINTEXT_LEN {
            return Err(CryptoError::InvalidPlaintext {
                expected: PLAINTEXT_LEN,
                actual: bytes.len(),
            });
        }
        let invalid = |_| CryptoError::InvalidPlaintext {
            expected: PLAINTEXT_LEN,
            actual: bytes.len(),
        };
        let (erc, rest) = bytes.split_at(20);
        let (token, rest) = rest.split_at(32);
        let (value, salt) = rest.split_at(16);
        let mut value_be = [0u8; 16];
        value_be.copy_from_slice(value);
        Ok(Self {
            erc_address: EthAddress::from_slice(erc).map_err(invalid)?,
            token_id: TokenId::from_slice(token).map_err(invalid)?,
            value: u128::from_be_bytes(value_be),
            salt: Salt::from_slice(salt).map_err(invalid)?,
        })
    }
}

fn cipher_for(shared: &[u8; 32]) -> ChaCha20Poly1305 {
    let mut key = blake2b_256_multi(&[shared, NOTE_KDF_DOMAIN]);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    key.zeroize();
    cipher
}

fn nonce_for(ephemeral_public_key: &ZkpPublicKey) -> Nonce {
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&ephemeral_public_key.as_bytes()[..12]);
    Nonce::from(nonce)
}

/// Encrypt `secrets` to `recipient` under a caller-supplied ephemeral secret.
pub fn encrypt_note_with(
    secrets: &NoteSecrets,
    recipient: &ZkpPublicKey,
    ephemeral_secret: [u8; 32],
) -> Result<EncryptedNote, CryptoError> {
    let secret = StaticSecret::from(ephemeral_secret);
    let ephemeral_public_key = ZkpPublicKey::new(X25519Public::from(&secret).to_bytes());
    let shared = secret.diffie_hellman(&X25519Public::from(*recipient.as_bytes()));

    let mut plaintext = secrets.to_bytes();
    let ciphertext = cipher_for(shared.as_bytes())
        .encrypt(&nonce_for(&ephemeral_public_key), plaintext.as_ref())
        .map_err(|_| CryptoError::Encryption)?;
    plaintext.zeroize();

    Ok(EncryptedNote {
        ephemeral_public_key,
        ciphertext,
    })
}

/// Encrypt `secrets` to `recipient` under a fresh ephemeral key.
pub fn encrypt_note(secrets: &NoteSecrets, recipient: &ZkpPublicKey) -> Result<EncryptedNote, CryptoError> {
    let mut ephemeral = [0u8; 32];
    OsRng.fill_bytes(&mut ephemeral);
    let note = encrypt_note_with(secrets, recipient, ephemeral);
    ephemeral.zeroize();
    note
}

/// Raw decryption primitive.
///
/// A wrong key fails authentication and returns [`CryptoError::Decryption`];
/// callers treat that as "not addressed to us".
pub fn decrypt(
    private_key: &ZkpPrivateKey,
    ephemeral_public_key: &ZkpPublicKey,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let secret = StaticSecret::from(private_key.0);
    let shared = secret.diffie_hellman(&X25519Public::from(*ephemeral_public_key.as_bytes()));
    cipher_for(shared.as_bytes())
        .decrypt(&nonce_for(ephemeral_public_key), ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

pub fn decrypt_note(private_key: &ZkpPrivateKey, note: &EncryptedNote) -> Result<NoteSecrets, CryptoError> {
    let mut plaintext = decrypt(private_key, &note.ephemeral_public_key, &note.ciphertext)?;
    let secrets = NoteSecrets::from_bytes(&plaintext);
    plaintext.zeroize();
    secrets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ZkpKeys;

    fn secrets() -> NoteSecrets {
        NoteSecrets {
            erc_address: EthAddress::new([0xaa; 20]),
            token_id: TokenId::ZERO,
            value: 1_000_000_000_000_000_000,
            salt: Salt::new([0x55; 32]),
        }
    }

    #[test]
    fn recipient_recovers_secrets() {
        let bob = ZkpKeys::from_root_key(&[2; 32]);
        let note = encrypt_note_with(&secrets(), &bob.zkp_public_key, [9; 32]).unwrap();
        assert_eq!(decrypt_note(&bob.zkp_private_key, &note).unwrap(), secrets());
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let bob = ZkpKeys::from_root_key(&[2; 32]);
        let eve = ZkpKeys::from_root_key(&[3; 32]);
        let note = encrypt_note(&secrets(), &bob.zkp_public_key).unwrap();
        assert_eq!(
            decrypt_note(&eve.zkp_private_key, &note),
            Err(CryptoError::Decryption)
        );
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let bob = ZkpKeys::from_root_key(&[2; 32]);
        let mut note = encrypt_note(&secrets(), &bob.zkp_public_key).unwrap();
        note.ciphertext[0] ^= 0xff;
        assert!(decrypt_note(&bob.zkp_private_key, &note).is_err());
    }

    #[test]
    fn ciphertext_carries_auth_tag() {
        let bob = ZkpKeys::from_root_key(&[2; 32]);
        let note = encrypt_note(&secrets(), &bob.zkp_public_key).unwrap();
        assert_eq!(note.ciphertext.len(), PLAINTEXT_LEN + 16);
    }
}
