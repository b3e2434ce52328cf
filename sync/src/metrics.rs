//! Prometheus metrics for the sync engine.
//!
//! [`SyncMetrics`] owns a dedicated [`Registry`]; [`SyncMetrics::encode`]
//! renders it in the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_vec_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::queue::Lane;
use crate::SyncError;

pub struct SyncMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// BlockProposed events run through the finality processor.
    pub blocks_processed: IntCounter,
    /// Blocks relevant enough to the wallet to be persisted.
    pub blocks_stored: IntCounter,
    pub commitments_decrypted: IntCounter,
    pub rollbacks: IntCounter,
    /// Queued tasks that returned an error or panicked.
    pub failed_tasks: IntCounter,
    /// Events with no handler (or no remover) for their name.
    pub events_dropped: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Queued plus running tasks, labelled by lane.
    pub queue_depth: IntGaugeVec,
    /// Leaves in the commitment tree after the last processed block.
    pub tree_leaf_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    pub block_process_time_ms: Histogram,
}

impl SyncMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    pub fn new() -> Result<Self, SyncError> {
        let registry = Registry::new();

        let blocks_processed = register_int_counter_with_registry!(
            Opts::new("shroud_blocks_processed_total", "Total blocks processed"),
            registry
        )?;
        let blocks_stored = register_int_counter_with_registry!(
            Opts::new("shroud_blocks_stored_total", "Total blocks stored for this wallet"),
            registry
        )?;
        let commitments_decrypted = register_int_counter_with_registry!(
            Opts::new(
                "shroud_commitments_decrypted_total",
                "Total commitments recovered by decryption"
            ),
            registry
        )?;
        let rollbacks = register_int_counter_with_registry!(
            Opts::new("shroud_rollbacks_total", "Total rollback events applied"),
            registry
        )?;
        let failed_tasks = register_int_counter_with_registry!(
            Opts::new("shroud_queue_failed_tasks_total", "Total queued tasks that failed"),
            registry
        )?;
        let events_dropped = register_int_counter_with_registry!(
            Opts::new("shroud_events_dropped_total", "Total events without a handler"),
            registry
        )?;

        let queue_depth = register_int_gauge_vec_with_registry!(
            Opts::new("shroud_queue_depth", "Queued and running tasks per lane"),
            &["lane"],
            registry
        )?;
        let tree_leaf_count = register_int_gauge_with_registry!(
            Opts::new("shroud_tree_leaf_count", "Leaves in the commitment tree"),
            registry
        )?;

        let block_process_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "shroud_block_process_time_ms",
                "Block finality processing time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.1, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            blocks_processed,
            blocks_stored,
            commitments_decrypted,
            rollbacks,
            failed_tasks,
            events_dropped,
            queue_depth,
            tree_leaf_count,
            block_process_time_ms,
        })
    }

    pub fn set_queue_depth(&self, lane: Lane, depth: usize) {
        self.queue_depth
            .with_label_values(&[lane.as_str()])
            .set(depth as i64);
    }

    /// Render every metric in the text exposition format.
    pub fn encode(&self) -> Result<String, SyncError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| SyncError::Other(e.to_string()))
    }
}
