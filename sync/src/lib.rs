//! Client-side chain synchronization for the shroud wallet.
//!
//! Chain events enter through the [`EventRouter`], which queues each on one
//! of two [`EventQueue`] lanes. Confirmed blocks go to the
//! [`BlockFinalityProcessor`]; rollbacks and un-emitted proposals go to the
//! [`ReorgHandler`]. Both mutate the store through the `shroud-store` traits.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod finality;
pub mod keyring;
pub mod metrics;
pub mod queue;
pub mod reorg;
pub mod router;
pub mod shutdown;
pub mod tracing_spans;

pub use config::{SyncConfig, MAX_TRANSACTION_INPUTS};
pub use discovery::recover_commitment;
pub use engine::SyncEngine;
pub use error::SyncError;
pub use finality::{BlockFinalityProcessor, FinalityReport};
pub use keyring::KeyRing;
pub use metrics::SyncMetrics;
pub use queue::{EventQueue, Lane, LanePriority, TaskFuture};
pub use reorg::{ReorgHandler, RollbackReport, UndoReport};
pub use router::{handler, Dispatch, EventRouter, Handler};
pub use shutdown::ShutdownController;
