//! Reconciliation core: status model, typed-ness detection, decision engine,
//! and the fan-out over all discovered packages.

pub mod engine;
pub mod orchestrator;
pub mod status;
pub mod typed;
