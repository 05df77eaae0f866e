//! Strategy evaluation: turns signal readings into per-strategy verdicts.

pub mod evaluator;

pub use evaluator::{EvaluationContext, StrategyEvaluator};
