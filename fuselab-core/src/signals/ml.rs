//! Forecast direction: how a scalar ML prediction becomes market context.
//!
//! The engine never inspects model internals. A prediction only says which way
//! the next period is expected to move relative to today's close.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a prediction value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    /// Predicted next close, compared against today's close.
    #[default]
    Price,
    /// Predicted change; its sign is the direction.
    Delta,
}

impl FromStr for PredictionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "price" => Ok(PredictionKind::Price),
            "delta" | "change" => Ok(PredictionKind::Delta),
            other => Err(format!("unknown prediction kind '{other}' (expected price|delta)")),
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionKind::Price => f.write_str("price"),
            PredictionKind::Delta => f.write_str("delta"),
        }
    }
}

/// Expected direction of the next period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

/// Direction implied by one prediction, or `None` for a non-finite value.
pub fn direction(prediction: f64, close: f64, kind: PredictionKind) -> Option<Direction> {
    if !prediction.is_finite() {
        return None;
    }
    let change = match kind {
        PredictionKind::Price => prediction - close,
        PredictionKind::Delta => prediction,
    };
    Some(if change > 0.0 {
        Direction::Up
    } else if change < 0.0 {
        Direction::Down
    } else {
        Direction::Flat
    })
}

/// Merge primary and secondary forecaster directions.
///
/// Two forecasts must agree to express a direction; a disagreement is
/// neutral. A lone forecast decides by itself. `None` means no forecast at all.
pub fn merge(primary: Option<Direction>, secondary: Option<Direction>) -> Option<Direction> {
    match (primary, secondary) {
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(_), Some(_)) => Some(Direction::Flat),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_prediction_compares_to_close() {
        assert_eq!(direction(101.0, 100.0, PredictionKind::Price), Some(Direction::Up));
        assert_eq!(direction(99.0, 100.0, PredictionKind::Price), Some(Direction::Down));
        assert_eq!(direction(100.0, 100.0, PredictionKind::Price), Some(Direction::Flat));
    }

    #[test]
    fn delta_prediction_uses_sign() {
        assert_eq!(direction(0.5, 100.0, PredictionKind::Delta), Some(Direction::Up));
        assert_eq!(direction(-0.5, 100.0, PredictionKind::Delta), Some(Direction::Down));
        assert_eq!(direction(f64::NAN, 100.0, PredictionKind::Delta), None);
    }

    #[test]
    fn merge_requires_agreement() {
        use Direction::*;
        assert_eq!(merge(Some(Up), Some(Up)), Some(Up));
        assert_eq!(merge(Some(Up), Some(Down)), Some(Flat));
        assert_eq!(merge(None, Some(Down)), Some(Down));
        assert_eq!(merge(Some(Up), None), Some(Up));
        assert_eq!(merge(None, None), None);
    }

    #[test]
    fn kind_parses_from_cli_text() {
        assert_eq!("Price".parse::<PredictionKind>(), Ok(PredictionKind::Price));
        assert_eq!("delta".parse::<PredictionKind>(), Ok(PredictionKind::Delta));
        assert!("level".parse::<PredictionKind>().is_err());
    }
}
