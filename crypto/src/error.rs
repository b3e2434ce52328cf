use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication failed. For incoming notes this usually means the note
    /// was addressed to someone else.
    #[error("note decryption failed")]
    Decryption,

    #[error("note encryption failed")]
    Encryption,

    #[error("invalid note plaintext: expected {expected} bytes, got {actual}")]
    InvalidPlaintext { expected: usize, actual: usize },
}
