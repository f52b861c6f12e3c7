use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::plan::{Plan, WeightVector};
use crate::model::price_table::PriceTable;

/// Persistence for the previous cycle's plan.
pub trait StateStore {
    fn load_plan(&self) -> Result<Option<Plan>>;
    fn save_plan(&mut self, plan: &Plan) -> Result<()>;
}

/// On-disk layout: `{"equity_history": [[ts, equity], ...], "last_plan": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub equity_history: Vec<(i64, f64)>,
    #[serde(default)]
    pub last_plan: Option<Plan>,
}

impl PersistedState {
    pub fn last_equity(&self) -> Option<f64> {
        self.equity_history.last().map(|(_, eq)| *eq)
    }
}

pub fn load_state_from_path(path: &Path) -> Result<PersistedState> {
    if !path.exists() {
        return Ok(PersistedState::default());
    }
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&payload)
        .with_context(|| format!("failed to parse state json {}", path.display()))
}

pub fn persist_state_to_path(path: &Path, state: &PersistedState) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(state).context("failed to serialize state json")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// JSON file store. Every mutation, including [`StateStore::save_plan`], stays
/// in memory until [`JsonStateStore::save`] writes the file once.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    state: PersistedState,
}

impl JsonStateStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = load_state_from_path(&path)?;
        Ok(Self { path, state })
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    /// Seed an empty history with `initial_equity` at `ts`.
    pub fn ensure_equity_seed(&mut self, ts: i64, initial_equity: f64) {
        if self.state.equity_history.is_empty() {
            self.state.equity_history.push((ts, initial_equity));
        }
    }

    pub fn record_equity(&mut self, ts: i64, equity: f64) {
        self.state.equity_history.push((ts, equity));
    }

    /// Mark paper equity forward by the last bar's weighted simple return.
    /// Carries the last value when the table has fewer than two rows.
    pub fn record_paper_equity(
        &mut self,
        prices: &PriceTable,
        weights: &WeightVector,
        ts: i64,
        initial_equity: f64,
    ) -> f64 {
        let last = self.state.last_equity().unwrap_or(initial_equity);
        let port_ret = last_bar_return(prices, weights);
        let equity = last * (1.0 + port_ret);
        tracing::debug!(last, port_ret, equity, "Paper equity marked");
        self.record_equity(ts, equity);
        equity
    }

    pub fn save(&self) -> Result<()> {
        persist_state_to_path(&self.path, &self.state)?;
        tracing::info!(
            path = %self.path.display(),
            points = self.state.equity_history.len(),
            "State saved"
        );
        Ok(())
    }
}

impl StateStore for JsonStateStore {
    fn load_plan(&self) -> Result<Option<Plan>> {
        Ok(self.state.last_plan.clone())
    }

    fn save_plan(&mut self, plan: &Plan) -> Result<()> {
        self.state.last_plan = Some(plan.clone());
        Ok(())
    }
}

/// Weighted simple return of the final bar; zero with fewer than two rows.
pub fn last_bar_return(prices: &PriceTable, weights: &WeightVector) -> f64 {
    let n = prices.len();
    if n < 2 {
        return 0.0;
    }
    weights
        .iter()
        .filter(|(_, w)| **w > 0.0)
        .filter_map(|(sym, w)| {
            let col = prices.column(sym)?;
            let (prev, curr) = (col[n - 2], col[n - 1]);
            Some(w * (curr - prev) / prev)
        })
        .sum()
}
