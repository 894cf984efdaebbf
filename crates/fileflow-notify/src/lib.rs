//! # fileflow-notify
//!
//! Fan-out of job outcome events to registered observers.
//!
//! Workers call [`EventNotifier::publish`], which never blocks. A dispatch
//! task delivers every event to each observer in its own task under a
//! timeout, so a slow or failing observer cannot hold up processing.

pub mod notifier;
pub mod observer;
pub mod observers;
pub mod registry;

pub use notifier::EventNotifier;
pub use observer::JobObserver;
pub use registry::{ObserverHandle, ObserverRegistry};
