//! Signal evaluation: one day's feature row to named boolean sub-signals.
//!
//! Signals never see the position or the ledger. The only state they carry is
//! the per-ticker `MacdLatch`, which the caller owns and threads through every
//! call in date order.

pub mod evaluator;
pub mod ml;

pub use evaluator::{MacdLatch, SignalEvaluator, SignalSet};
pub use ml::{direction, merge, Direction, PredictionKind};
