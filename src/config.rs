use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::estimator::{EstimatorConfig, ScoreKind, SelectionMode};
use crate::regime::{RegimePresets, RiskKnobs};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub binance: BinanceConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub regime: RegimeConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    pub rest_base_url: String,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
    pub kline_interval: String,
    #[serde(skip)]
    pub api_key: String,
    #[serde(skip)]
    pub api_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    #[default]
    Paper,
    Live,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default)]
    pub mode: TradeMode,
    pub base_ccy: String,
    pub symbols: Vec<String>,
    pub lookback: usize,
    pub min_weight: f64,
    pub max_weight: f64,
    pub cash_buffer: f64,
    pub max_positions: usize,
    pub risk_aversion: f64,
    #[serde(default)]
    pub turnover_cap: Option<f64>,
    #[serde(default = "default_min_notional")]
    pub min_notional: f64,
    #[serde(default = "default_initial_equity")]
    pub initial_equity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Annealer,
    Greedy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub mode: SelectionMode,
    pub optimizer: OptimizerKind,
    pub num_reads: usize,
    pub num_sweeps: usize,
    pub seed: Option<u64>,
    pub penalty: f64,
    pub ewma_decay: f64,
    pub estimator: ScoreKind,
    pub estimator_window: usize,
    pub vol_penalty: f64,
    pub vol_window: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::RiskAdjusted,
            optimizer: OptimizerKind::Annealer,
            num_reads: 600,
            num_sweeps: 1000,
            seed: None,
            penalty: 2.0,
            ewma_decay: 0.94,
            estimator: ScoreKind::Ema,
            estimator_window: 20,
            vol_penalty: 0.0,
            vol_window: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegimeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_benchmark")]
    pub benchmark: String,
    #[serde(flatten)]
    pub presets: RegimePresets,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            benchmark: default_benchmark(),
            presets: RegimePresets::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_recv_window() -> u64 {
    5000
}

fn default_min_notional() -> f64 {
    1.0
}

fn default_initial_equity() -> f64 {
    1000.0
}

fn default_true() -> bool {
    true
}

fn default_benchmark() -> String {
    "BTCUSDT".to_string()
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state/state.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a Binance kline interval string (e.g. "1s", "1m", "1h", "1d", "1w", "1M")
/// into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '1d'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 7 * 86_400_000,
        "M" => 30 * 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w/M",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl TradingConfig {
    /// Upper-cased, de-duplicated symbol list in configured order.
    pub fn universe(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }

    /// Knobs used when regime switching is disabled.
    pub fn static_knobs(&self) -> RiskKnobs {
        RiskKnobs {
            cash_buffer: self.cash_buffer,
            max_positions: self.max_positions,
            risk_aversion: self.risk_aversion,
        }
    }
}

impl SelectionConfig {
    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            mode: self.mode,
            ewma_decay: self.ewma_decay,
            score_kind: self.estimator,
            window: self.estimator_window,
            vol_penalty: self.vol_penalty,
        }
    }
}

fn check_fraction(name: &str, v: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&v) {
        bail!("{} must be within [0, 1], got {}", name, v);
    }
    Ok(())
}

fn check_knobs(name: &str, k: &RiskKnobs) -> Result<()> {
    if !(0.0..1.0).contains(&k.cash_buffer) {
        bail!("{}.cash_buffer must be within [0, 1), got {}", name, k.cash_buffer);
    }
    if k.max_positions == 0 {
        bail!("{}.max_positions must be > 0", name);
    }
    if !k.risk_aversion.is_finite() || k.risk_aversion < 0.0 {
        bail!("{}.risk_aversion must be >= 0, got {}", name, k.risk_aversion);
    }
    Ok(())
}

impl Config {
    /// `RQ_CONFIG_PATH` if set, else `config/default.toml`.
    pub fn resolve_path() -> PathBuf {
        std::env::var("RQ_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Config for read-only tools: no exchange secrets are read or required.
    pub fn load_without_secrets() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_path(&Self::resolve_path())
    }

    pub fn load() -> Result<Self> {
        let mut config = Self::load_without_secrets()?;

        config.binance.api_key = std::env::var("BINANCE_API_KEY").unwrap_or_default();
        config.binance.api_secret = std::env::var("BINANCE_API_SECRET").unwrap_or_default();
        if config.trading.mode == TradeMode::Live
            && (config.binance.api_key.is_empty() || config.binance.api_secret.is_empty())
        {
            bail!("live mode requires BINANCE_API_KEY and BINANCE_API_SECRET in .env or environment");
        }

        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse config toml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        parse_interval_ms(&self.binance.kline_interval)
            .context("binance.kline_interval is invalid")?;

        let t = &self.trading;
        if t.universe().is_empty() {
            bail!("trading.symbols must contain at least one symbol");
        }
        if t.base_ccy.trim().is_empty() {
            bail!("trading.base_ccy must not be empty");
        }
        if t.lookback < 2 {
            bail!("trading.lookback must be >= 2, got {}", t.lookback);
        }
        check_fraction("trading.min_weight", t.min_weight)?;
        check_fraction("trading.max_weight", t.max_weight)?;
        if t.min_weight > t.max_weight {
            bail!(
                "trading.min_weight ({}) must not exceed trading.max_weight ({})",
                t.min_weight,
                t.max_weight
            );
        }
        check_knobs("trading", &t.static_knobs())?;
        if let Some(cap) = t.turnover_cap {
            check_fraction("trading.turnover_cap", cap)?;
        }
        if t.min_notional < 0.0 || t.initial_equity <= 0.0 {
            bail!("trading.min_notional must be >= 0 and trading.initial_equity > 0");
        }

        let s = &self.selection;
        if !(s.ewma_decay > 0.0 && s.ewma_decay <= 1.0) {
            bail!("selection.ewma_decay must be within (0, 1], got {}", s.ewma_decay);
        }
        if s.estimator_window == 0 || s.vol_window < 2 {
            bail!("selection.estimator_window must be > 0 and selection.vol_window >= 2");
        }
        if s.num_reads == 0 || s.num_sweeps == 0 {
            bail!("selection.num_reads and selection.num_sweeps must be > 0");
        }
        if !s.penalty.is_finite() || s.penalty < 0.0 || s.vol_penalty < 0.0 {
            bail!("selection.penalty and selection.vol_penalty must be >= 0");
        }

        let p = &self.regime.presets;
        check_knobs("regime.bull", &p.bull)?;
        check_knobs("regime.chop", &p.chop)?;
        check_knobs("regime.bear", &p.bear)?;
        Ok(())
    }
}
