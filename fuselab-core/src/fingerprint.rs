//! Run fingerprinting: deterministic identification of inputs and outputs.
//!
//! - `dataset_hash`: the bar series a run consumed.
//! - `profile_hash`: exact identity of a strategy profile.
//! - `output_fingerprint`: the trade log plus equity curve a run produced.
//!
//! Two runs over identical inputs must produce identical output fingerprints.

use crate::domain::{Bar, PortfolioSnapshot, Trade};
use crate::profile::StrategyProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded BLAKE3 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines and directory names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of the raw bar values, independent of any serialization format.
pub fn dataset_hash(bars: &[Bar]) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        for value in [bar.open, bar.high, bar.low, bar.close] {
            hasher.update(&value.to_le_bytes());
        }
        hasher.update(&bar.volume.to_le_bytes());
    }
    Fingerprint(hasher.finalize().to_hex().to_string())
}

/// Exact identity of a profile (name, parameters and exit rule).
pub fn profile_hash(profile: &StrategyProfile) -> Result<Fingerprint, serde_json::Error> {
    let json = serde_json::to_vec(profile)?;
    Ok(Fingerprint::from_bytes(&json))
}

/// Hash of a run's trade log and equity curve.
pub fn output_fingerprint(
    trades: &[Trade],
    snapshots: &[PortfolioSnapshot],
) -> Result<Fingerprint, serde_json::Error> {
    #[derive(Serialize)]
    struct Outputs<'a> {
        trades: &'a [Trade],
        snapshots: &'a [PortfolioSnapshot],
    }
    let json = serde_json::to_vec(&Outputs { trades, snapshots })?;
    Ok(Fingerprint::from_bytes(&json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars() -> Vec<Bar> {
        (1..=3)
            .map(|d| Bar {
                date: NaiveDate::from_ymd_opt(2024, 7, d).unwrap(),
                open: 10.0,
                high: 11.0,
                low: 9.5,
                close: 10.0 + d as f64,
                volume: 1_000,
            })
            .collect()
    }

    #[test]
    fn dataset_hash_is_deterministic_and_sensitive() {
        let a = bars();
        let mut b = bars();
        assert_eq!(dataset_hash(&a), dataset_hash(&b));
        b[2].close += 0.01;
        assert_ne!(dataset_hash(&a), dataset_hash(&b));
    }

    #[test]
    fn profile_hash_tracks_parameters() {
        let c = StrategyProfile::conservative();
        let mut c2 = c.clone();
        assert_eq!(profile_hash(&c).unwrap(), profile_hash(&c2).unwrap());
        c2.stop_loss_pct = 0.06;
        assert_ne!(profile_hash(&c).unwrap(), profile_hash(&c2).unwrap());
    }

    #[test]
    fn short_form() {
        let fp = Fingerprint::from_bytes(b"fuselab");
        assert_eq!(fp.as_str().len(), 64);
        assert_eq!(fp.short().len(), 12);
        assert!(fp.as_str().starts_with(fp.short()));
    }

    #[test]
    fn empty_outputs_hash() {
        let a = output_fingerprint(&[], &[]).unwrap();
        let b = output_fingerprint(&[], &[]).unwrap();
        assert_eq!(a, b);
    }
}
