// src/dispatch/mod.rs

pub mod dispatcher;
pub mod notifier;
pub mod persistence;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{CallTarget, DispatchPolicy, DispatchSummary, SideEffectDispatcher};
pub use notifier::{HttpNotifier, LoggingNotifier, Notifier};
pub use persistence::JsonlDetectionStore;
pub use worker::DispatchWorker;
