//! Asset selection: pick at most `max_positions` symbols from the universe.
//!
//! Risk-adjusted mode builds a [`QuboObjective`] and hands it to an
//! [`Optimizer`]. Any optimizer error downgrades to the deterministic greedy
//! ranking, and an all-zero assignment is replaced by the single asset with
//! the highest expected return. Momentum mode is a plain top-k ranking.

pub mod annealer;
pub mod qubo;

use std::cmp::Ordering;

use crate::error::AppError;
use crate::estimator::{Estimate, MeanVariance};

pub use annealer::StochasticAnnealer;
pub use qubo::QuboObjective;

/// Solver capability for a binary quadratic objective.
pub trait Optimizer {
    fn name(&self) -> &'static str;
    fn solve(&self, objective: &QuboObjective) -> Result<Vec<bool>, AppError>;
}

/// Always-available solver: switches on the `target_count` variables with the
/// lowest linear coefficient. Since the cardinality term shifts every linear
/// coefficient by the same constant, this is the greedy
/// `mu - lam * variance` ranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deterministic;

impl Optimizer for Deterministic {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn solve(&self, objective: &QuboObjective) -> Result<Vec<bool>, AppError> {
        let scores: Vec<f64> = (0..objective.len()).map(|i| -objective.linear(i)).collect();
        let mut x = vec![false; objective.len()];
        for i in rank_descending(&scores)
            .into_iter()
            .take(objective.target_count())
        {
            x[i] = true;
        }
        Ok(x)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionParams {
    pub max_positions: usize,
    pub risk_aversion: f64,
    pub penalty: f64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            max_positions: 3,
            risk_aversion: 0.5,
            penalty: 2.0,
        }
    }
}

pub fn select(
    symbols: &[String],
    estimate: &Estimate,
    params: &SelectionParams,
    optimizer: &dyn Optimizer,
) -> Result<Vec<String>, AppError> {
    if symbols.is_empty() {
        return Err(AppError::MalformedPrices(
            "cannot select from an empty universe".to_string(),
        ));
    }
    let k = params.max_positions.max(1);

    let idx = match estimate {
        Estimate::Scores(scores) => {
            check_len(symbols, scores.len())?;
            rank_descending(scores).into_iter().take(k).collect()
        }
        Estimate::MeanVariance(mv) => {
            check_len(symbols, mv.mu.len())?;
            select_mean_variance(mv, k, params, optimizer)
        }
    };

    Ok(idx.into_iter().map(|i| symbols[i].clone()).collect())
}

/// Top-k indices by `mu - lam * variance`.
pub fn greedy_select(mv: &MeanVariance, k: usize, lam: f64) -> Vec<usize> {
    let scores: Vec<f64> = (0..mv.mu.len())
        .map(|i| mv.mu[i] - lam * mv.variance(i))
        .collect();
    rank_descending(&scores).into_iter().take(k.max(1)).collect()
}

fn select_mean_variance(
    mv: &MeanVariance,
    k: usize,
    params: &SelectionParams,
    optimizer: &dyn Optimizer,
) -> Vec<usize> {
    let objective =
        QuboObjective::from_mean_variance(mv, params.risk_aversion, k, params.penalty);

    let mut x = match optimizer.solve(&objective) {
        Ok(x) if x.len() == mv.mu.len() => x,
        Ok(x) => {
            tracing::warn!(
                optimizer = optimizer.name(),
                got = x.len(),
                expected = mv.mu.len(),
                "Optimizer returned wrong assignment length, using greedy selection"
            );
            return greedy_select(mv, k, params.risk_aversion);
        }
        Err(e) => {
            tracing::warn!(
                optimizer = optimizer.name(),
                error = %e,
                "Optimizer failed, using greedy selection"
            );
            return greedy_select(mv, k, params.risk_aversion);
        }
    };

    if !x.iter().any(|b| *b) {
        if let Some(best) = rank_descending(&mv.mu).first() {
            tracing::warn!(
                optimizer = optimizer.name(),
                forced = *best,
                "Optimizer selected nothing, forcing top expected return"
            );
            x[*best] = true;
        }
    }

    let mut chosen: Vec<usize> = (0..x.len()).filter(|i| x[*i]).collect();
    if chosen.len() > k {
        // Soft penalty overshoot: keep the best k by greedy score.
        let keep: Vec<usize> = {
            let scores: Vec<f64> = chosen
                .iter()
                .map(|i| mv.mu[*i] - params.risk_aversion * mv.variance(*i))
                .collect();
            rank_descending(&scores)
                .into_iter()
                .take(k)
                .map(|pos| chosen[pos])
                .collect()
        };
        tracing::debug!(
            selected = chosen.len(),
            max_positions = k,
            "Trimming optimizer selection to max positions"
        );
        chosen.retain(|i| keep.contains(i));
    }
    chosen
}

fn check_len(symbols: &[String], got: usize) -> Result<(), AppError> {
    if symbols.len() != got {
        return Err(AppError::MalformedPrices(format!(
            "estimate has {} entries for {} symbols",
            got,
            symbols.len()
        )));
    }
    Ok(())
}

/// Indices sorted by score, highest first. NaN sorts last; ties keep index order.
fn rank_descending(scores: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..scores.len()).collect();
    idx.sort_by(|a, b| match (scores[*a].is_nan(), scores[*b].is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => scores[*b]
            .partial_cmp(&scores[*a])
            .unwrap_or(Ordering::Equal),
    });
    idx
}
