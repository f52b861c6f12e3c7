use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Target weight per universe symbol. The unallocated remainder is cash.
pub type WeightVector = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Bull,
    Bear,
    Chop,
}

impl Regime {
    pub fn as_str(self) -> &'static str {
        match self {
            Regime::Bull => "bull",
            Regime::Bear => "bear",
            Regime::Chop => "chop",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one decision cycle. Persisted so the next cycle can read
/// `weights` back as its turnover reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub chosen: Vec<String>,
    pub weights: WeightVector,
    pub regime: Regime,
    pub ts: i64,
}

impl Plan {
    pub fn allocated(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn cash(&self) -> f64 {
        (1.0 - self.allocated()).max(0.0)
    }
}
