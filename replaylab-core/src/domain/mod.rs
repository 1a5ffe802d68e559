//! Domain types for ReplayLab.

pub mod info;
pub mod step;
pub mod trade;

pub use info::{ClosedPosition, EnvInfo, PositionChanges, UNKNOWN_CLOSE_REASON};
pub use step::StepRecord;
pub use trade::{Trade, TradeOutcome};

/// Symbol type alias
pub type Symbol = String;
