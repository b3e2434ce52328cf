use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("store error: {0}")]
    Store(#[from] shroud_store::StoreError),

    #[error("transaction structure mismatch: {0}")]
    StructureMismatch(String),

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] shroud_crypto::CryptoError),

    #[error("sync error: {0}")]
    Sync(#[from] shroud_sync::SyncError),

    #[error("{0}")]
    Other(String),
}
