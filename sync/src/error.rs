use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] shroud_store::StoreError),

    #[error("tree error: {0}")]
    Tree(#[from] shroud_tree::TreeError),

    #[error("unexpected payload for event {0}")]
    UnexpectedPayload(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("event queue closed")]
    QueueClosed,

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
