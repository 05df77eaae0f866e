//! Core application primitives (engine, cycle runtime, scheduler, HTTP)

pub mod engine;
pub mod http;
pub mod runtime;
pub mod scheduler;
pub mod snapshots;

pub use engine::DecisionEngine;
pub use http::{create_router, start_server, AppState};
pub use runtime::{CycleReport, TradingRuntime};
pub use scheduler::CycleScheduler;
pub use snapshots::SnapshotBoard;
