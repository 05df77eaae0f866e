//! Generic strategy evaluator: one code path for all four strategies,
//! parameterized by their descriptors.

use crate::models::{
    Condition, ConditionReason, ConfirmationMode, DailyBias, Direction, EntrySnapshot,
    EntryState, StrategyDescriptor, StrategyVerdict, StructureCheck, TrendReading,
};
use crate::signals::trend_filter;

/// Everything known about one instrument at evaluation time
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub bias: DailyBias,
    pub trend: &'a [TrendReading],
    pub breakout_long: bool,
    pub breakout_short: bool,
    pub structure: &'a StructureCheck,
    pub entries: &'a [EntrySnapshot],
    /// Lowest low of the current trading day
    pub running_low: Option<f64>,
}

impl EvaluationContext<'_> {
    fn breakout(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.breakout_long,
            Direction::Short => self.breakout_short,
        }
    }

    fn entry(&self, descriptor: &StrategyDescriptor) -> EntryState {
        self.entries
            .iter()
            .find(|e| e.strategy == descriptor.kind)
            .map_or(EntryState::Idle, |e| e.state)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyEvaluator;

impl StrategyEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every condition for `descriptor`. The verdict is ready only
    /// when all pass; every condition is still reported.
    pub fn evaluate(&self, descriptor: &StrategyDescriptor, ctx: &EvaluationContext<'_>) -> StrategyVerdict {
        let direction = descriptor.direction;
        let mut reasons = Vec::with_capacity(5);

        reasons.push(ConditionReason {
            condition: Condition::Bias,
            passed: ctx.bias.direction() == Some(direction),
            detail: format!("daily bias {} (need {})", ctx.bias.label(), match direction {
                Direction::Long => "directional_up",
                Direction::Short => "directional_down",
            }),
        });

        let (aligned, detail) = trend_filter::alignment(ctx.trend, direction);
        reasons.push(ConditionReason {
            condition: Condition::Trend,
            passed: aligned,
            detail,
        });

        reasons.push(match descriptor.confirmation {
            ConfirmationMode::Breakout => {
                let active = ctx.breakout(direction);
                ConditionReason {
                    condition: Condition::Breakout,
                    passed: active,
                    detail: if active {
                        format!("M30 {} break active", direction.as_str())
                    } else {
                        format!("no active M30 {} break", direction.as_str())
                    },
                }
            }
            ConfirmationMode::Structure => ConditionReason {
                condition: Condition::Structure,
                passed: ctx.structure.passed,
                detail: ctx.structure.reason.clone(),
            },
        });

        let entry = ctx.entry(descriptor);
        reasons.push(ConditionReason {
            condition: Condition::Entry,
            passed: entry.is_ready_for(direction),
            detail: format!("entry {}", entry.label()),
        });

        if descriptor.watches_day_stop() {
            reasons.push(day_stop_reason(ctx.bias, ctx.running_low));
        }

        StrategyVerdict {
            strategy: descriptor.kind,
            direction,
            ready: reasons.iter().all(|r| r.passed),
            reasons,
        }
    }
}

/// The day stop blocks once today's running low reaches the bias stop level
fn day_stop_reason(bias: DailyBias, running_low: Option<f64>) -> ConditionReason {
    let (passed, detail) = match (bias.stop_level(), running_low) {
        (Some(stop), Some(low)) if low <= stop => (
            false,
            format!("day stop hit: low {:.5} <= {:.5}", low, stop),
        ),
        (Some(stop), Some(low)) => (true, format!("low {:.5} above stop {:.5}", low, stop)),
        (Some(_), None) => (false, "no base bars today".to_string()),
        (None, _) => (false, "no stop level without a directional-down bias".to_string()),
    };
    ConditionReason {
        condition: Condition::DayStop,
        passed,
        detail,
    }
}
