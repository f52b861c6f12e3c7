//! Market regime from a benchmark's price history.
//!
//! Trend is the slope of a long moving average over a short lag; stress is the
//! percentile rank of current realized volatility within its own history.

use serde::Deserialize;

use crate::estimator::log_returns;
use crate::indicator::sma::rolling_mean;
use crate::indicator::stdev::rolling_stdev;
use crate::model::plan::Regime;
use crate::model::price_table::PriceTable;

const VOL_ANNUALIZATION_PERIODS: f64 = 365.0;

#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    pub ma_window: usize,
    pub slope_lag: usize,
    pub vol_window: usize,
    pub min_history: usize,
    pub min_vol_history: usize,
    pub high_vol_pct: f64,
    pub low_vol_pct: f64,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self {
            ma_window: 100,
            slope_lag: 10,
            vol_window: 20,
            min_history: 120,
            min_vol_history: 60,
            high_vol_pct: 0.70,
            low_vol_pct: 0.35,
        }
    }
}

impl RegimeClassifier {
    /// Classify using `benchmark`, or the first column when it is absent.
    /// Never fails: short history and empty tables yield [`Regime::Chop`].
    pub fn classify(&self, prices: &PriceTable, benchmark: &str) -> Regime {
        let series = match prices
            .column(benchmark)
            .or_else(|| (!prices.symbols().is_empty()).then(|| prices.column_at(0)))
        {
            Some(s) => s,
            None => return Regime::Chop,
        };
        if series.len() < self.min_history {
            return Regime::Chop;
        }

        let slope = match self.ma_slope(series) {
            Some(s) => s,
            None => return Regime::Chop,
        };

        let returns = log_returns(series);
        let vol_hist: Vec<f64> = rolling_stdev(&returns, self.vol_window.max(2))
            .into_iter()
            .flatten()
            .map(|s| s * VOL_ANNUALIZATION_PERIODS.sqrt())
            .collect();
        if vol_hist.len() < self.min_vol_history {
            return Regime::Chop;
        }
        let current = match vol_hist.last() {
            Some(v) => *v,
            None => return Regime::Chop,
        };
        let vol_pct =
            vol_hist.iter().filter(|v| **v <= current).count() as f64 / vol_hist.len() as f64;

        let high_vol = vol_pct > self.high_vol_pct;
        let low_vol = vol_pct < self.low_vol_pct;

        // Bull unless volatility is in the top band; the low-vol clause is
        // subsumed by `!high_vol` and kept as a separate threshold.
        if slope > 0.0 && (low_vol || !high_vol) {
            Regime::Bull
        } else if slope < 0.0 && high_vol {
            Regime::Bear
        } else {
            Regime::Chop
        }
    }

    /// `(ma[t] - ma[t - lag]) / lag` at the last row.
    fn ma_slope(&self, series: &[f64]) -> Option<f64> {
        let ma = rolling_mean(series, self.ma_window.max(1));
        let lag = self.slope_lag.max(1);
        let last = ma.len().checked_sub(1)?;
        let prev = last.checked_sub(lag)?;
        Some((ma[last]? - ma[prev]?) / lag as f64)
    }
}

/// Risk knobs governing one decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RiskKnobs {
    pub cash_buffer: f64,
    pub max_positions: usize,
    pub risk_aversion: f64,
}

/// Per-regime knob table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RegimePresets {
    #[serde(default = "default_bull")]
    pub bull: RiskKnobs,
    #[serde(default = "default_chop")]
    pub chop: RiskKnobs,
    #[serde(default = "default_bear")]
    pub bear: RiskKnobs,
}

impl Default for RegimePresets {
    fn default() -> Self {
        Self {
            bull: default_bull(),
            chop: default_chop(),
            bear: default_bear(),
        }
    }
}

impl RegimePresets {
    pub fn for_regime(&self, regime: Regime) -> RiskKnobs {
        match regime {
            Regime::Bull => self.bull,
            Regime::Chop => self.chop,
            Regime::Bear => self.bear,
        }
    }
}

fn default_bull() -> RiskKnobs {
    RiskKnobs {
        cash_buffer: 0.15,
        max_positions: 3,
        risk_aversion: 0.4,
    }
}

fn default_chop() -> RiskKnobs {
    RiskKnobs {
        cash_buffer: 0.35,
        max_positions: 2,
        risk_aversion: 0.6,
    }
}

fn default_bear() -> RiskKnobs {
    RiskKnobs {
        cash_buffer: 0.55,
        max_positions: 1,
        risk_aversion: 0.8,
    }
}
