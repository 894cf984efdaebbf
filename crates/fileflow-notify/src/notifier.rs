//! Event notifier: non-blocking publish, isolated observer dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use fileflow_core::events::{EventEnvelope, JobEvent};

use crate::observer::JobObserver;
use crate::registry::ObserverRegistry;

/// Publishes job events to every registered observer.
///
/// Cloning is cheap; all clones feed the same dispatch task. The task stops
/// once every clone has been dropped and the queued events are delivered.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    /// Sending side of the dispatch channel.
    tx: mpsc::UnboundedSender<EventEnvelope>,
    /// Observer registry shared with the dispatch task.
    registry: Arc<ObserverRegistry>,
}

impl EventNotifier {
    /// Spawn the dispatch task and return the notifier with its handle.
    pub fn start(
        registry: Arc<ObserverRegistry>,
        observer_timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(dispatch_loop(rx, Arc::clone(&registry), observer_timeout));
        (Self { tx, registry }, task)
    }

    /// Queue an event for delivery. Never blocks.
    pub fn publish(&self, event: JobEvent) {
        let envelope = EventEnvelope::new(event);
        debug!(
            event_id = %envelope.id,
            job_id = %envelope.event.job_id(),
            kind = envelope.event.kind(),
            "Publishing job event"
        );
        if self.tx.send(envelope).is_err() {
            warn!("Event dispatcher has stopped; dropping job event");
        }
    }

    /// The registry observers are read from.
    pub fn registry(&self) -> &Arc<ObserverRegistry> {
        &self.registry
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<EventEnvelope>,
    registry: Arc<ObserverRegistry>,
    observer_timeout: Duration,
) {
    while let Some(envelope) = rx.recv().await {
        let envelope = Arc::new(envelope);
        for observer in registry.snapshot().await {
            tokio::spawn(deliver(observer, Arc::clone(&envelope), observer_timeout));
        }
    }
    debug!("Event dispatcher stopped");
}

/// Calls per observer per event before the event is dropped for it.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Pause before the second call; doubles for each later one.
const REDELIVERY_BACKOFF: Duration = Duration::from_millis(100);

/// Run one observer on one event, containing its failures.
///
/// Errors and timeouts are redelivered up to [`MAX_DELIVERY_ATTEMPTS`] times,
/// so an observer may see the same event id more than once. Panics are not
/// redelivered.
async fn deliver(
    observer: Arc<dyn JobObserver>,
    envelope: Arc<EventEnvelope>,
    observer_timeout: Duration,
) {
    let name = observer.name().to_string();
    let job_id = envelope.event.job_id();
    let kind = envelope.event.kind();
    let mut backoff = REDELIVERY_BACKOFF;

    for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
        let handler = Arc::clone(&observer);
        let event = Arc::clone(&envelope);
        let mut call = tokio::spawn(async move { handler.handle(&event).await });

        match tokio::time::timeout(observer_timeout, &mut call).await {
            Ok(Ok(Ok(()))) => return,
            Ok(Ok(Err(e))) => {
                warn!(observer = %name, job_id = %job_id, kind, attempt, error = %e, "Job observer failed");
            }
            Ok(Err(join_err)) if join_err.is_panic() => {
                error!(observer = %name, job_id = %job_id, kind, "Job observer panicked");
                return;
            }
            Ok(Err(_)) => return,
            Err(_) => {
                call.abort();
                warn!(
                    observer = %name,
                    job_id = %job_id,
                    kind,
                    attempt,
                    timeout_ms = observer_timeout.as_millis() as u64,
                    "Job observer timed out"
                );
            }
        }

        if attempt < MAX_DELIVERY_ATTEMPTS {
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    error!(
        observer = %name,
        job_id = %job_id,
        kind,
        attempts = MAX_DELIVERY_ATTEMPTS,
        "Dropping job event after repeated observer failures"
    );
}
