//! Signal components: daily bias, trend alignment, breakout, structure,
//! entry timing and early exit.

pub mod bias;
pub mod breakout;
pub mod entry;
pub mod exit;
pub mod structure;
pub mod trend_filter;

pub use bias::DailyBiasClassifier;
pub use breakout::BreakoutDetector;
pub use entry::{EntryConfig, EntryMachine, EntryTable};
pub use exit::{ExitMonitor, ExitSignal};
pub use structure::StructureValidator;
pub use trend_filter::TrendAlignmentFilter;
