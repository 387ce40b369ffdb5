//! Checkin based presence-tracing risk calculation.
//!
//! Checkins are split into calendar days, intersected with the warning
//! matches recorded for them and folded into per-day and per-checkin risk
//! levels. [`risk::CheckinRiskCalculation`] is the entry point; the [`db`]
//! module persists checkins and matches in Postgres.

pub mod db;
pub mod matcher;
pub mod models;
pub mod parameters;
pub mod report;
pub mod risk;
pub mod splitting;
pub mod store;

pub use models::{CheckinRiskCalculationResult, RiskLevel};
pub use parameters::RiskCalculationParameters;
pub use risk::CheckinRiskCalculation;
pub use splitting::CheckinSplitter;
pub use store::{CheckinStore, InMemoryEventStore};
