//! Operator tooling: read-only world inspection and TPS reports.
//!
//! # Invariants
//! - Tools never mutate the registry they inspect.

mod inspector;
mod tps;

pub use inspector::{AreaSummary, EntityInfo, RegistrySummary, WorldInspector, WorldSummary};
pub use tps::TpsReport;
