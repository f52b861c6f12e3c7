//! Return and risk estimation over a [`PriceTable`].
//!
//! Two outputs depending on the selection mode:
//! - risk-adjusted: mean log return per asset plus an exponentially weighted
//!   covariance matrix (RiskMetrics-style decay, default 0.94);
//! - expected-return: one momentum score per asset, optionally penalized by
//!   annualized volatility.

use serde::Deserialize;

use crate::error::AppError;
use crate::indicator::ema::last_ema;
use crate::indicator::sma::trailing_mean;
use crate::indicator::stdev::trailing_stdev;
use crate::model::price_table::PriceTable;

const MIN_WEIGHT_SUM: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    RiskAdjusted,
    ExpectedReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    Ema,
    Sma,
}

#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    pub mode: SelectionMode,
    pub ewma_decay: f64,
    pub score_kind: ScoreKind,
    pub window: usize,
    pub vol_penalty: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::RiskAdjusted,
            ewma_decay: 0.94,
            score_kind: ScoreKind::Ema,
            window: 20,
            vol_penalty: 0.0,
        }
    }
}

/// Expected log return vector and covariance matrix in table column order.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanVariance {
    pub mu: Vec<f64>,
    pub sigma: Vec<Vec<f64>>,
}

impl MeanVariance {
    pub fn variance(&self, i: usize) -> f64 {
        self.sigma[i][i]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Estimate {
    MeanVariance(MeanVariance),
    Scores(Vec<f64>),
}

pub fn estimate(prices: &PriceTable, cfg: &EstimatorConfig) -> Result<Estimate, AppError> {
    match cfg.mode {
        SelectionMode::RiskAdjusted => {
            mean_variance(prices, cfg.ewma_decay).map(Estimate::MeanVariance)
        }
        SelectionMode::ExpectedReturn => {
            momentum_scores(prices, cfg.score_kind, cfg.window, cfg.vol_penalty)
                .map(Estimate::Scores)
        }
    }
}

/// `ln(p_t) - ln(p_{t-1})` for consecutive prices.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1].ln() - w[0].ln()).collect()
}

pub fn mean_variance(prices: &PriceTable, decay: f64) -> Result<MeanVariance, AppError> {
    if prices.is_empty() {
        return Err(AppError::MalformedPrices("price table is empty".to_string()));
    }
    if prices.len() < 2 {
        return Err(AppError::InsufficientData(format!(
            "need at least 2 rows to compute returns, got {}",
            prices.len()
        )));
    }

    let returns: Vec<Vec<f64>> = (0..prices.symbols().len())
        .map(|i| log_returns(prices.column_at(i)))
        .collect();
    let mu = returns
        .iter()
        .map(|r| r.iter().sum::<f64>() / r.len() as f64)
        .collect();
    let sigma = ewma_covariance(&returns, decay);
    Ok(MeanVariance { mu, sigma })
}

/// Exponentially weighted covariance of per-asset return series.
///
/// `returns[i]` is the return series of asset `i`, all of equal length T.
/// Observation `t` gets weight `decay^(T-1-t)`; deviations are taken from the
/// plain arithmetic mean and the sum is normalized by the total weight.
pub fn ewma_covariance(returns: &[Vec<f64>], decay: f64) -> Vec<Vec<f64>> {
    let n = returns.len();
    let t_len = returns.first().map(|r| r.len()).unwrap_or(0);
    let mut cov = vec![vec![0.0; n]; n];
    if t_len == 0 {
        return cov;
    }

    let centered: Vec<Vec<f64>> = returns
        .iter()
        .map(|r| {
            let mean = r.iter().sum::<f64>() / t_len as f64;
            r.iter().map(|x| x - mean).collect()
        })
        .collect();

    let mut weight = 1.0;
    let mut denom = 0.0;
    for t in (0..t_len).rev() {
        for i in 0..n {
            let xi = centered[i][t];
            for j in i..n {
                cov[i][j] += weight * xi * centered[j][t];
            }
        }
        denom += weight;
        weight *= decay;
    }

    let denom = denom.max(MIN_WEIGHT_SUM);
    for i in 0..n {
        for j in i..n {
            cov[i][j] /= denom;
            cov[j][i] = cov[i][j];
        }
    }
    cov
}

/// Momentum score per asset: EMA (span `window`) or trailing SMA of log returns,
/// minus `vol_penalty * annualized stdev` when the penalty is positive.
///
/// Assets without enough history get the worst valid score (or 0 when no
/// asset has a valid score) so they rank last.
pub fn momentum_scores(
    prices: &PriceTable,
    kind: ScoreKind,
    window: usize,
    vol_penalty: f64,
) -> Result<Vec<f64>, AppError> {
    if prices.is_empty() {
        return Err(AppError::MalformedPrices("price table is empty".to_string()));
    }
    let window = window.max(1);
    let annualization = prices.periods_per_year().sqrt();

    let raw: Vec<Option<f64>> = (0..prices.symbols().len())
        .map(|i| {
            let rets = log_returns(prices.column_at(i));
            let base = match kind {
                ScoreKind::Ema => last_ema(&rets, window),
                ScoreKind::Sma => trailing_mean(&rets, window),
            }?;
            if vol_penalty > 0.0 {
                let vol = trailing_stdev(&rets, window)? * annualization;
                Some(base - vol_penalty * vol)
            } else {
                Some(base)
            }
        })
        .map(|s| s.filter(|v| v.is_finite()))
        .collect();

    let fill = raw
        .iter()
        .flatten()
        .copied()
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        .unwrap_or(0.0);

    Ok(raw.into_iter().map(|s| s.unwrap_or(fill)).collect())
}
