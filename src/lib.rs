//! Quadrant: multi-timeframe decision engine running four entry strategies
//! per instrument on top of a one-minute bar stream.

pub mod config;
pub mod core;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod market;
pub mod metrics;
pub mod models;
pub mod risk;
pub mod services;
pub mod signals;
pub mod strategies;

pub use error::{EngineError, EngineResult};
