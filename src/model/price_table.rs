use std::collections::{BTreeMap, HashSet};

use crate::error::AppError;
use crate::model::candle::Candle;

const MS_PER_YEAR: f64 = 365.0 * 86_400_000.0;

/// Close prices for a fixed set of symbols on a shared, ascending time index.
///
/// Columns are complete: every symbol has a finite positive close on every row.
/// Rows where any symbol lacks a bar are dropped when the table is assembled
/// from candles, so "missing data" surfaces as a shorter table.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    timestamps: Vec<u64>,
    symbols: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl PriceTable {
    pub fn new(
        timestamps: Vec<u64>,
        symbols: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, AppError> {
        if symbols.len() != columns.len() {
            return Err(AppError::MalformedPrices(format!(
                "{} symbols but {} columns",
                symbols.len(),
                columns.len()
            )));
        }
        let mut seen = HashSet::new();
        for sym in &symbols {
            if sym.trim().is_empty() {
                return Err(AppError::MalformedPrices("empty symbol".to_string()));
            }
            if !seen.insert(sym.as_str()) {
                return Err(AppError::MalformedPrices(format!(
                    "duplicate symbol {}",
                    sym
                )));
            }
        }
        if timestamps.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AppError::MalformedPrices(
                "timestamps must be strictly ascending".to_string(),
            ));
        }
        for (sym, col) in symbols.iter().zip(&columns) {
            if col.len() != timestamps.len() {
                return Err(AppError::MalformedPrices(format!(
                    "{} has {} rows, expected {}",
                    sym,
                    col.len(),
                    timestamps.len()
                )));
            }
            if let Some(bad) = col.iter().find(|p| !p.is_finite() || **p <= 0.0) {
                return Err(AppError::MalformedPrices(format!(
                    "{} has non-positive or non-finite close {}",
                    sym, bad
                )));
            }
        }
        Ok(Self {
            timestamps,
            symbols,
            columns,
        })
    }

    /// Inner-join per-symbol candle series on open time.
    ///
    /// Within one series a repeated open time keeps the last bar.
    pub fn from_candles(series: &[(String, Vec<Candle>)]) -> Result<Self, AppError> {
        let mut per_symbol: Vec<BTreeMap<u64, f64>> = Vec::with_capacity(series.len());
        for (symbol, candles) in series {
            if candles.is_empty() {
                return Err(AppError::MalformedPrices(format!(
                    "no candles for {}",
                    symbol
                )));
            }
            let mut by_time = BTreeMap::new();
            for c in candles {
                by_time.insert(c.open_time, c.close);
            }
            per_symbol.push(by_time);
        }

        let timestamps: Vec<u64> = match per_symbol.first() {
            Some(first) => first
                .keys()
                .copied()
                .filter(|ts| per_symbol.iter().all(|m| m.contains_key(ts)))
                .collect(),
            None => Vec::new(),
        };

        let columns = per_symbol
            .iter()
            .map(|m| timestamps.iter().map(|ts| m[ts]).collect())
            .collect();
        let symbols = series.iter().map(|(s, _)| s.clone()).collect();
        Self::new(timestamps, symbols, columns)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty() || self.symbols.is_empty()
    }

    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.index_of(symbol).map(|i| self.columns[i].as_slice())
    }

    pub fn column_at(&self, idx: usize) -> &[f64] {
        &self.columns[idx]
    }

    /// Annualization factor implied by the median bar spacing (daily bars give 365).
    /// Falls back to 365 when the table has fewer than two rows.
    pub fn periods_per_year(&self) -> f64 {
        let mut gaps: Vec<u64> = self.timestamps.windows(2).map(|w| w[1] - w[0]).collect();
        if gaps.is_empty() {
            return 365.0;
        }
        gaps.sort_unstable();
        let median = gaps[gaps.len() / 2] as f64;
        MS_PER_YEAR / median
    }
}
