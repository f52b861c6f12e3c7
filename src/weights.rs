//! Weight shaping: turn a selection into a full-universe weight vector.
//!
//! Stages run in order:
//! 1. inverse-volatility base weights over the selection (equal weights when
//!    history is short);
//! 2. clip to `[0, max_weight]` and scale the selection to `1 - cash_buffer`;
//! 3. lift non-zero weights below `min_weight` and rescale once;
//! 4. with a previous plan, clamp per-asset moves to `turnover_cap` and rescale
//!    proportionally back to the stage 3 total.

use std::collections::BTreeMap;

use crate::error::AppError;
use crate::estimator::log_returns;
use crate::indicator::stdev::trailing_stdev;
use crate::model::plan::WeightVector;
use crate::model::price_table::PriceTable;

const VOL_FLOOR: f64 = 1e-9;
const VOL_ANNUALIZATION_PERIODS: f64 = 365.0;

#[derive(Debug, Clone)]
pub struct ShapeParams {
    pub min_weight: f64,
    pub max_weight: f64,
    pub cash_buffer: f64,
    pub turnover_cap: Option<f64>,
    pub vol_window: usize,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            min_weight: 0.05,
            max_weight: 0.6,
            cash_buffer: 0.15,
            turnover_cap: Some(0.10),
            vol_window: 20,
        }
    }
}

pub fn shape(
    prices: &PriceTable,
    selected: &[String],
    universe: &[String],
    params: &ShapeParams,
    prev_weights: Option<&WeightVector>,
) -> Result<WeightVector, AppError> {
    let mut in_universe: Vec<String> = Vec::with_capacity(selected.len());
    for sym in selected {
        if !universe.contains(sym) {
            tracing::warn!(symbol = %sym, "Selected symbol is outside the universe, ignoring");
            continue;
        }
        if !in_universe.contains(sym) {
            in_universe.push(sym.clone());
        }
    }

    let base = inverse_vol_weights(prices, &in_universe, params.vol_window)?;
    let bounded = apply_bounds_and_cash(
        &base,
        universe,
        params.min_weight,
        params.max_weight,
        params.cash_buffer,
    );

    let shaped = match (params.turnover_cap, prev_weights) {
        (Some(cap), Some(prev)) if !prev.is_empty() => cap_turnover(&bounded, prev, cap),
        _ => bounded,
    };

    Ok(universe
        .iter()
        .map(|s| (s.clone(), shaped.get(s).copied().unwrap_or(0.0)))
        .collect())
}

/// Inverse annualized volatility over the trailing `window` returns, normalized
/// to sum to one. Falls back to equal weights with fewer than `window + 2` rows.
pub fn inverse_vol_weights(
    prices: &PriceTable,
    selected: &[String],
    window: usize,
) -> Result<BTreeMap<String, f64>, AppError> {
    if selected.is_empty() {
        return Ok(BTreeMap::new());
    }
    let mut columns = Vec::with_capacity(selected.len());
    for sym in selected {
        let col = prices.column(sym).ok_or_else(|| {
            AppError::MalformedPrices(format!("selected symbol {} has no price column", sym))
        })?;
        columns.push(col);
    }

    let equal = || -> BTreeMap<String, f64> {
        let w = 1.0 / selected.len() as f64;
        selected.iter().map(|s| (s.clone(), w)).collect()
    };
    if prices.len() < window + 2 {
        return Ok(equal());
    }

    let raw: Vec<Option<f64>> = columns
        .iter()
        .map(|col| {
            trailing_stdev(&log_returns(col), window)
                .map(|s| s * VOL_ANNUALIZATION_PERIODS.sqrt())
                .filter(|v| v.is_finite())
        })
        .collect();

    let missing_fill = match median(raw.iter().flatten().copied().collect()) {
        Some(m) if m > 0.0 => m,
        _ => 1.0,
    };
    let vols: Vec<f64> = raw
        .into_iter()
        .map(|v| match v {
            Some(x) if x == 0.0 => VOL_FLOOR,
            Some(x) => x,
            None => missing_fill,
        })
        .collect();

    let inv: Vec<f64> = vols.iter().map(|v| 1.0 / v).collect();
    let total: f64 = inv.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return Ok(equal());
    }
    Ok(selected
        .iter()
        .zip(inv)
        .map(|(s, w)| (s.clone(), w / total))
        .collect())
}

/// Zero-fill the universe, clip base weights to `[0, max_w]`, scale to
/// `1 - cash_buffer`, then lift small non-zero weights to `min_w` with a single
/// rescale pass (a small residual shortfall below `min_w` can remain).
pub fn apply_bounds_and_cash(
    base: &BTreeMap<String, f64>,
    universe: &[String],
    min_w: f64,
    max_w: f64,
    cash_buffer: f64,
) -> WeightVector {
    let investable = 1.0 - cash_buffer;
    let mut w: WeightVector = universe.iter().map(|s| (s.clone(), 0.0)).collect();
    for (sym, val) in base {
        if let Some(slot) = w.get_mut(sym) {
            *slot = val.max(0.0).min(max_w);
        }
    }

    rescale_to(&mut w, investable);

    let mut bumped = false;
    for val in w.values_mut() {
        if *val > 0.0 && *val < min_w {
            *val = min_w;
            bumped = true;
        }
    }
    if bumped {
        rescale_to(&mut w, investable);
    }
    w
}

/// Clamp each weight to within `cap` of its previous value (missing = 0).
pub fn clamp_turnover(target: &WeightVector, prev: &WeightVector, cap: f64) -> WeightVector {
    target
        .iter()
        .map(|(sym, new)| {
            let old = prev.get(sym).copied().unwrap_or(0.0);
            let delta = new - old;
            let capped = if delta > cap {
                old + cap
            } else if delta < -cap {
                old - cap
            } else {
                *new
            };
            (sym.clone(), capped)
        })
        .collect()
}

/// [`clamp_turnover`], then scale the clamped vector so its total matches the
/// target's total. Only a `max(0, .)` floor is applied afterwards.
pub fn cap_turnover(target: &WeightVector, prev: &WeightVector, cap: f64) -> WeightVector {
    if prev.is_empty() {
        return target.clone();
    }
    let mut capped = clamp_turnover(target, prev, cap);
    let total: f64 = capped.values().map(|v| v.max(0.0)).sum();
    if total > 0.0 {
        let scale = target.values().sum::<f64>() / total;
        for v in capped.values_mut() {
            *v = v.max(0.0) * scale;
        }
    }
    capped
}

fn rescale_to(w: &mut WeightVector, target_sum: f64) {
    let total: f64 = w.values().sum();
    if total > 0.0 {
        for v in w.values_mut() {
            *v = *v / total * target_sum;
        }
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wv(pairs: &[(&str, f64)]) -> WeightVector {
        pairs.iter().map(|(s, w)| (s.to_string(), *w)).collect()
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn min_weight_bump_rescales_once() {
        let base: BTreeMap<String, f64> =
            [("A".to_string(), 0.97), ("B".to_string(), 0.03)].into_iter().collect();
        let universe = vec!["A".to_string(), "B".to_string()];
        let w = apply_bounds_and_cash(&base, &universe, 0.1, 1.0, 0.0);
        // 0.03 -> 0.1, total 1.07, rescaled back to 1.0
        assert!((w["B"] - 0.1 / 1.07).abs() < 1e-12);
        assert!((w["A"] - 0.97 / 1.07).abs() < 1e-12);
        assert!(w["B"] < 0.1);
    }

    #[test]
    fn cap_turnover_rescales_to_target_total() {
        let target = wv(&[("A", 0.8), ("B", 0.05)]);
        let prev = wv(&[("A", 0.5), ("B", 0.05)]);
        let out = cap_turnover(&target, &prev, 0.1);
        let total: f64 = out.values().sum();
        assert!((total - 0.85).abs() < 1e-12);
    }

    #[test]
    fn empty_prev_disables_cap() {
        let target = wv(&[("A", 0.8)]);
        assert_eq!(cap_turnover(&target, &WeightVector::new(), 0.1), target);
    }
}
