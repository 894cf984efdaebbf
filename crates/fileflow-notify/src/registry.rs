//! Observer registry with removable handles.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::info;

use crate::observer::JobObserver;

/// Token returned by [`ObserverRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// Entry in the observer registry.
#[derive(Debug)]
struct ObserverEntry {
    handle: ObserverHandle,
    observer: Arc<dyn JobObserver>,
}

/// Registry of job observers in registration order.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    /// Registered observers.
    observers: RwLock<Vec<ObserverEntry>>,
    /// Next handle value.
    next_handle: AtomicU64,
}

impl ObserverRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer and returns its handle.
    pub async fn register(&self, observer: Arc<dyn JobObserver>) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let name = observer.name().to_string();

        self.observers
            .write()
            .await
            .push(ObserverEntry { handle, observer });

        info!(observer = %name, "Job observer registered");
        handle
    }

    /// Removes an observer. Returns `false` if the handle was unknown.
    pub async fn unregister(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.observers.write().await;
        let before = observers.len();
        observers.retain(|entry| entry.handle != handle);
        let removed = observers.len() != before;

        if removed {
            info!(handle = handle.0, "Job observer unregistered");
        }
        removed
    }

    /// Returns the current observers.
    pub async fn snapshot(&self) -> Vec<Arc<dyn JobObserver>> {
        self.observers
            .read()
            .await
            .iter()
            .map(|entry| Arc::clone(&entry.observer))
            .collect()
    }

    /// Returns the number of registered observers.
    pub async fn len(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Returns whether no observer is registered.
    pub async fn is_empty(&self) -> bool {
        self.observers.read().await.is_empty()
    }
}
