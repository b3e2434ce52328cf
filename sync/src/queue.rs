//! Two-lane event ordering queue.
//!
//! Each lane is an unbounded mpsc channel drained by exactly one worker task,
//! so a task never starts before the previous task in the same lane has
//! completed, awaits included. Tasks run on their own tokio task so that a
//! panic is caught at the lane and does not take the worker down.
//!
//! `flush` enqueues a barrier job that resolves once the worker reaches it.
//! On shutdown a lane stops after its running task and discards the rest.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use crate::metrics::SyncMetrics;
use crate::tracing_spans::queue_task_span;
use crate::SyncError;

/// A unit of queued work.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Block finality and rollback events.
    Fast,
    /// Everything else.
    Slow,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Slow => "slow",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the two lanes are ordered relative to each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanePriority {
    /// Lanes run fully independently and may interleave.
    #[default]
    Independent,
    /// The slow lane waits for the fast lane to drain before starting each task.
    FastFirst,
}

enum Job {
    Task { label: String, future: TaskFuture },
    Barrier(oneshot::Sender<()>),
}

/// Queued plus running tasks of one lane.
struct LaneCounter {
    pending: AtomicUsize,
    idle: Notify,
}

impl LaneCounter {
    fn new() -> Self {
        Self {
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn finish_one(&self) -> usize {
        let left = self.pending.fetch_sub(1, Ordering::SeqCst) - 1;
        if left == 0 {
            self.idle.notify_waiters();
        }
        left
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.len() == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct LaneHandle {
    tx: mpsc::UnboundedSender<Job>,
    counter: Arc<LaneCounter>,
    paused: watch::Sender<bool>,
}

/// The event ordering queue.
///
/// Must be created inside a tokio runtime: the constructor spawns one worker
/// per lane.
pub struct EventQueue {
    fast: LaneHandle,
    slow: LaneHandle,
    max_queue: usize,
    metrics: Arc<SyncMetrics>,
    workers: Vec<JoinHandle<()>>,
}

impl EventQueue {
    pub fn new(
        priority: LanePriority,
        max_queue: usize,
        metrics: Arc<SyncMetrics>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let (fast_tx, fast_rx) = mpsc::unbounded_channel();
        let (slow_tx, slow_rx) = mpsc::unbounded_channel();
        let (fast_paused, fast_paused_rx) = watch::channel(false);
        let (slow_paused, slow_paused_rx) = watch::channel(false);
        let fast_counter = Arc::new(LaneCounter::new());
        let slow_counter = Arc::new(LaneCounter::new());

        let yield_to = match priority {
            LanePriority::Independent => None,
            LanePriority::FastFirst => Some(Arc::clone(&fast_counter)),
        };

        let workers = vec![
            tokio::spawn(run_lane(LaneWorker {
                lane: Lane::Fast,
                rx: fast_rx,
                counter: Arc::clone(&fast_counter),
                paused: fast_paused_rx,
                yield_to: None,
                metrics: Arc::clone(&metrics),
                shutdown: shutdown.resubscribe(),
            })),
            tokio::spawn(run_lane(LaneWorker {
                lane: Lane::Slow,
                rx: slow_rx,
                counter: Arc::clone(&slow_counter),
                paused: slow_paused_rx,
                yield_to,
                metrics: Arc::clone(&metrics),
                shutdown,
            })),
        ];

        Self {
            fast: LaneHandle {
                tx: fast_tx,
                counter: fast_counter,
                paused: fast_paused,
            },
            slow: LaneHandle {
                tx: slow_tx,
                counter: slow_counter,
                paused: slow_paused,
            },
            max_queue,
            metrics,
            workers,
        }
    }

    fn handle(&self, lane: Lane) -> &LaneHandle {
        match lane {
            Lane::Fast => &self.fast,
            Lane::Slow => &self.slow,
        }
    }

    /// Append a task to `lane`. Enqueueing never blocks.
    pub fn enqueue<F>(&self, lane: Lane, label: impl Into<String>, task: F) -> Result<(), SyncError>
    where
        F: Future<Output = Result<(), SyncError>> + Send + 'static,
    {
        let handle = self.handle(lane);
        let depth = handle.counter.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if depth > self.max_queue {
            warn!(lane = %lane, depth, max_queue = self.max_queue, "event queue above configured depth");
        }
        self.metrics.set_queue_depth(lane, depth);

        let job = Job::Task {
            label: label.into(),
            future: Box::pin(task),
        };
        handle.tx.send(job).map_err(|_| {
            handle.counter.finish_one();
            SyncError::QueueClosed
        })
    }

    /// Resolve once every task enqueued on `lane` before this call has completed.
    ///
    /// On a paused lane this waits until the lane is resumed.
    pub async fn flush(&self, lane: Lane) -> Result<(), SyncError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.handle(lane)
            .tx
            .send(Job::Barrier(done_tx))
            .map_err(|_| SyncError::QueueClosed)?;
        done_rx.await.map_err(|_| SyncError::QueueClosed)
    }

    /// Stop starting new tasks on `lane`. Enqueueing still succeeds.
    pub fn pause(&self, lane: Lane) {
        debug!(lane = %lane, "pausing lane");
        self.handle(lane).paused.send_replace(true);
    }

    pub fn resume(&self, lane: Lane) {
        debug!(lane = %lane, "resuming lane");
        self.handle(lane).paused.send_replace(false);
    }

    pub fn is_paused(&self, lane: Lane) -> bool {
        *self.handle(lane).paused.borrow()
    }

    /// Queued plus running tasks on `lane`.
    pub fn len(&self, lane: Lane) -> usize {
        self.handle(lane).counter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len(Lane::Fast) == 0 && self.len(Lane::Slow) == 0
    }

    /// Stop accepting work, let both workers drain what is already queued,
    /// and wait for them to exit.
    pub async fn close(self) {
        let Self {
            fast,
            slow,
            workers,
            ..
        } = self;
        // Paused lanes would never drain.
        fast.paused.send_replace(false);
        slow.paused.send_replace(false);
        drop(fast.tx);
        drop(slow.tx);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "queue worker ended abnormally");
            }
        }
    }
}

struct LaneWorker {
    lane: Lane,
    rx: mpsc::UnboundedReceiver<Job>,
    counter: Arc<LaneCounter>,
    paused: watch::Receiver<bool>,
    yield_to: Option<Arc<LaneCounter>>,
    metrics: Arc<SyncMetrics>,
    shutdown: broadcast::Receiver<()>,
}

impl LaneWorker {
    /// Wait until the lane may start its next task. Returns false when the
    /// lane should stop instead.
    async fn ready(&mut self) -> bool {
        let Self {
            paused,
            yield_to,
            shutdown,
            ..
        } = self;
        tokio::select! {
            biased;
            _ = shutdown.recv() => false,
            ready = async {
                let resumed = paused.wait_for(|paused| !*paused).await.is_ok();
                if !resumed {
                    return false;
                }
                if let Some(fast) = yield_to.as_ref() {
                    fast.wait_idle().await;
                }
                true
            } => ready,
        }
    }

    /// Drop whatever is still queued so the lane counter reaches zero and
    /// pending flushes fail instead of hanging.
    fn discard_queued(&mut self) {
        self.rx.close();
        let mut discarded = 0usize;
        while let Ok(job) = self.rx.try_recv() {
            if let Job::Task { .. } = job {
                self.counter.finish_one();
                discarded += 1;
            }
        }
        if discarded > 0 {
            warn!(lane = %self.lane, discarded, "lane stopped with tasks still queued");
        }
        self.metrics.set_queue_depth(self.lane, self.counter.len());
    }
}

async fn run_lane(mut worker: LaneWorker) {
    let lane = worker.lane;
    loop {
        let job = tokio::select! {
            biased;
            _ = worker.shutdown.recv() => {
                debug!(lane = %lane, "shutdown received, lane stopping");
                break;
            }
            job = worker.rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        match job {
            Job::Barrier(done) => {
                let _ = done.send(());
            }
            Job::Task { label, future } => {
                if !worker.ready().await {
                    debug!(lane = %lane, task = %label, "lane stopping before task start");
                    worker.counter.finish_one();
                    break;
                }

                let span = queue_task_span(lane.as_str(), &label);
                match tokio::spawn(future.instrument(span)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(lane = %lane, task = %label, error = %e, "queued task failed");
                        worker.metrics.failed_tasks.inc();
                    }
                    Err(e) => {
                        warn!(lane = %lane, task = %label, error = %e, "queued task panicked");
                        worker.metrics.failed_tasks.inc();
                    }
                }

                let left = worker.counter.finish_one();
                worker.metrics.set_queue_depth(lane, left);
            }
        }
    }
    worker.discard_queued();
}
