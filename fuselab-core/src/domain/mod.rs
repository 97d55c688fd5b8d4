//! Domain types for FuseLab

pub mod bar;
pub mod feature;
pub mod position;
pub mod snapshot;
pub mod trade;

pub use bar::Bar;
pub use feature::FeatureRow;
pub use position::{PositionState, PositionStatus};
pub use snapshot::{equity_values, PortfolioSnapshot};
pub use trade::{ExitReason, Trade};

/// Ticker symbol type alias
pub type Ticker = String;
