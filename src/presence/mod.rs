// src/presence/mod.rs
//
// Presence tracking core. No I/O, no blocking.
//
//   GatedDetection[] → Reconciler → PresenceLedger → TransitionEvent[]

pub mod classification_gate;
pub mod ledger;
pub mod reconciler;

pub use classification_gate::ClassificationGate;
pub use ledger::PresenceLedger;
pub use reconciler::Reconciler;
