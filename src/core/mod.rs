//! Framework-agnostic business logic.
//!
//! Pure computations (aggregation, progress, validation, gating) take plain
//! snapshots; persistence functions take any SeaORM connection.

pub mod aggregator;
pub mod category;
pub mod dashboard;
pub mod entitlement;
pub mod goal;
pub mod progress;
pub mod saving;
pub mod state;
pub mod sync;
pub mod validation;
