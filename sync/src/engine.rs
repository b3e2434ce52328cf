//! Wires the queue, router, finality processor and reorg handler together.

use shroud_store::LedgerStore;
use shroud_types::{event, ChainEvent, EventPayload};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::config::SyncConfig;
use crate::finality::BlockFinalityProcessor;
use crate::keyring::KeyRing;
use crate::metrics::SyncMetrics;
use crate::queue::{EventQueue, Lane};
use crate::reorg::ReorgHandler;
use crate::router::{handler, Dispatch, EventRouter};
use crate::shutdown::ShutdownController;
use crate::tracing_spans::block_finality_span;
use crate::SyncError;

/// The running synchronization engine.
///
/// BlockProposed and Rollback are routed to the fast lane; an un-emitted
/// BlockProposed runs the L1 undo as its remover.
pub struct SyncEngine {
    store: Arc<dyn LedgerStore>,
    keys: KeyRing,
    config: Arc<SyncConfig>,
    metrics: Arc<SyncMetrics>,
    router: EventRouter,
    reorg: Arc<ReorgHandler>,
}

impl SyncEngine {
    /// Build the engine and start its queue workers. Must run inside a tokio runtime.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        keys: KeyRing,
        config: SyncConfig,
        shutdown: &ShutdownController,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let config = Arc::new(config);
        let metrics = Arc::new(SyncMetrics::new()?);
        let queue = EventQueue::new(
            config.lane_priority,
            config.max_queue,
            Arc::clone(&metrics),
            shutdown.subscribe(),
        );
        let finality = Arc::new(BlockFinalityProcessor::new(
            Arc::clone(&store),
            keys.clone(),
            config.tree_height,
        ));
        let reorg = Arc::new(ReorgHandler::new(Arc::clone(&store)));

        let mut router = EventRouter::new(queue, Arc::clone(&metrics));

        let on_block = {
            let finality = Arc::clone(&finality);
            let metrics = Arc::clone(&metrics);
            handler(move |event: ChainEvent| {
                let finality = Arc::clone(&finality);
                let metrics = Arc::clone(&metrics);
                async move {
                    let EventPayload::BlockProposed(proposed) = event.payload else {
                        return Err(SyncError::UnexpectedPayload(event.name));
                    };
                    let span = block_finality_span(
                        proposed.block.block_number_l2,
                        &proposed.transaction_hash,
                    );
                    let started = Instant::now();
                    let report = tokio::task::spawn_blocking(move || finality.process(&proposed))
                        .instrument(span)
                        .await
                        .map_err(|e| SyncError::Other(format!("finality task failed: {e}")))??;

                    metrics
                        .block_process_time_ms
                        .observe(started.elapsed().as_secs_f64() * 1_000.0);
                    metrics.blocks_processed.inc();
                    if report.block_stored {
                        metrics.blocks_stored.inc();
                    }
                    metrics.commitments_decrypted.inc_by(report.decrypted as u64);
                    metrics.tree_leaf_count.set(report.leaf_count as i64);
                    Ok(())
                }
            })
        };

        let on_block_removed = {
            let reorg = Arc::clone(&reorg);
            handler(move |event: ChainEvent| {
                let reorg = Arc::clone(&reorg);
                async move {
                    let EventPayload::BlockProposed(proposed) = event.payload else {
                        return Err(SyncError::UnexpectedPayload(event.name));
                    };
                    reorg.undo_block_proposal(proposed.transaction_hash).await?;
                    Ok(())
                }
            })
        };

        let on_rollback = {
            let reorg = Arc::clone(&reorg);
            let metrics = Arc::clone(&metrics);
            handler(move |event: ChainEvent| {
                let reorg = Arc::clone(&reorg);
                let metrics = Arc::clone(&metrics);
                async move {
                    let EventPayload::Rollback(rollback) = event.payload else {
                        return Err(SyncError::UnexpectedPayload(event.name));
                    };
                    reorg.rollback(rollback.block_number_l2).await?;
                    metrics.rollbacks.inc();
                    Ok(())
                }
            })
        };

        router
            .register(event::BLOCK_PROPOSED, Lane::Fast, on_block, Some(on_block_removed))
            .register(event::ROLLBACK, Lane::Fast, on_rollback, None);

        Ok(Self {
            store,
            keys,
            config,
            metrics,
            router,
            reorg,
        })
    }

    pub fn dispatch(&self, event: ChainEvent) -> Result<Dispatch, SyncError> {
        self.router.dispatch(event)
    }

    /// Resolve once everything dispatched so far has been processed.
    pub async fn flush(&self) -> Result<(), SyncError> {
        self.router.queue().flush(Lane::Fast).await?;
        self.router.queue().flush(Lane::Slow).await
    }

    /// Apply a rollback directly, bypassing the queue.
    pub async fn rollback(&self, valid_to: u64) -> Result<crate::RollbackReport, SyncError> {
        let report = self.reorg.rollback(valid_to).await?;
        self.metrics.rollbacks.inc();
        Ok(report)
    }

    pub fn router_mut(&mut self) -> &mut EventRouter {
        &mut self.router
    }

    pub fn queue(&self) -> &EventQueue {
        self.router.queue()
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.metrics
    }

    /// Drain both lanes and stop the workers.
    pub async fn close(self) {
        self.router.into_queue().close().await;
    }
}
