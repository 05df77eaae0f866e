//! Account-level risk limits applied before any order is sent, and order sizing.

pub mod gate;
pub mod sizing;

pub use gate::{DailyPnl, GateCheck, GateDecision, GateRequest, RiskGate, RiskLimits};
pub use sizing::build_order;
