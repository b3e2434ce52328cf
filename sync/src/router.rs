//! Routes chain events to their registered handlers on the event queue.

use shroud_types::ChainEvent;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::metrics::SyncMetrics;
use crate::queue::{EventQueue, Lane, TaskFuture};
use crate::SyncError;

/// Builds the task that processes one event.
pub type Handler = Arc<dyn Fn(ChainEvent) -> TaskFuture + Send + Sync>;

/// Wrap an async function as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(ChainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SyncError>> + Send + 'static,
{
    Arc::new(move |event| -> TaskFuture { Box::pin(f(event)) })
}

struct Route {
    lane: Lane,
    handler: Handler,
    remover: Option<Handler>,
}

/// What happened to a dispatched event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Queued(Lane),
    Dropped,
}

pub struct EventRouter {
    queue: EventQueue,
    routes: HashMap<String, Route>,
    metrics: Arc<SyncMetrics>,
}

impl EventRouter {
    pub fn new(queue: EventQueue, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            queue,
            routes: HashMap::new(),
            metrics,
        }
    }

    /// Register the handler for `name` and, optionally, the remover run when
    /// an event of that name is un-emitted (`removed = true`). Re-registering
    /// a name replaces the previous route.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        lane: Lane,
        handler: Handler,
        remover: Option<Handler>,
    ) -> &mut Self {
        self.routes.insert(
            name.into(),
            Route {
                lane,
                handler,
                remover,
            },
        );
        self
    }

    /// Queue the handler (or remover) for `event`. Events without one are
    /// logged and dropped.
    pub fn dispatch(&self, event: ChainEvent) -> Result<Dispatch, SyncError> {
        let Some(route) = self.routes.get(&event.name) else {
            info!(event = %event.name, "no handler registered, dropping event");
            self.metrics.events_dropped.inc();
            return Ok(Dispatch::Dropped);
        };

        let (run, label) = if event.removed {
            match &route.remover {
                Some(remover) => (remover, format!("{} (removed)", event.name)),
                None => {
                    info!(event = %event.name, "no remover registered, dropping removed event");
                    self.metrics.events_dropped.inc();
                    return Ok(Dispatch::Dropped);
                }
            }
        } else {
            (&route.handler, event.name.clone())
        };

        debug!(event = %event.name, removed = event.removed, lane = %route.lane, "queueing event");
        let task = (**run)(event);
        self.queue.enqueue(route.lane, label, task)?;
        Ok(Dispatch::Queued(route.lane))
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn into_queue(self) -> EventQueue {
        self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::LanePriority;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio::time::timeout;

    fn router() -> (EventRouter, broadcast::Sender<()>) {
        let (tx, rx) = broadcast::channel(1);
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        let queue = EventQueue::new(LanePriority::Independent, 100, Arc::clone(&metrics), rx);
        (EventRouter::new(queue, metrics), tx)
    }

    fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Handler {
        let log = Arc::clone(log);
        handler(move |event: ChainEvent| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{tag}:{}", event.name));
                Ok::<(), SyncError>(())
            }
        })
    }

    #[tokio::test]
    async fn unknown_event_is_dropped() {
        let (router, _shutdown) = router();
        let outcome = router.dispatch(ChainEvent::rollback(3)).unwrap();
        assert_eq!(outcome, Dispatch::Dropped);
        assert_eq!(router.metrics.events_dropped.get(), 1);
    }

    #[tokio::test]
    async fn removed_event_routes_to_remover() {
        let (mut router, _shutdown) = router();
        let log = Arc::new(Mutex::new(Vec::new()));
        router.register(
            "Rollback",
            Lane::Fast,
            recording(&log, "handle"),
            Some(recording(&log, "remove")),
        );

        router.dispatch(ChainEvent::rollback(3)).unwrap();
        router.dispatch(ChainEvent::rollback(3).into_removed()).unwrap();
        timeout(Duration::from_secs(5), router.queue().flush(Lane::Fast))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["handle:Rollback".to_string(), "remove:Rollback".to_string()]
        );
    }

    #[tokio::test]
    async fn removed_event_without_remover_is_dropped() {
        let (mut router, _shutdown) = router();
        let log = Arc::new(Mutex::new(Vec::new()));
        router.register("Rollback", Lane::Fast, recording(&log, "handle"), None);
        let outcome = router
            .dispatch(ChainEvent::rollback(3).into_removed())
            .unwrap();
        assert_eq!(outcome, Dispatch::Dropped);
        router.queue().flush(Lane::Fast).await.unwrap();
        assert!(log.lock().unwrap().is_empty());
    }
}
