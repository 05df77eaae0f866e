//! Shared data types

pub mod bar;
pub mod signal;
pub mod strategy;
pub mod trading;

pub use bar::{Bar, IndicatorValue, Timeframe};
pub use signal::*;
pub use strategy::*;
pub use trading::*;
