use rotation_quant::model::plan::WeightVector;
use rotation_quant::model::price_table::PriceTable;
use rotation_quant::weights::{clamp_turnover, inverse_vol_weights, shape, ShapeParams};

const DAY_MS: u64 = 86_400_000;

fn wv(pairs: &[(&str, f64)]) -> WeightVector {
    pairs.iter().map(|(s, w)| (s.to_string(), *w)).collect()
}

fn universe() -> Vec<String> {
    vec!["A".to_string(), "B".to_string(), "C".to_string()]
}

/// Alternating log-returns of `+-amp` around a flat level.
fn zigzag(rows: usize, amp: f64) -> Vec<f64> {
    (0..rows)
        .map(|i| 100.0 * if i % 2 == 0 { 1.0 } else { amp.exp() })
        .collect()
}

fn noisy_table(rows: usize) -> PriceTable {
    PriceTable::new(
        (0..rows as u64).map(|i| i * DAY_MS).collect(),
        universe(),
        vec![zigzag(rows, 0.01), zigzag(rows, 0.02), zigzag(rows, 0.04)],
    )
    .unwrap()
}

fn params(turnover_cap: Option<f64>) -> ShapeParams {
    ShapeParams {
        min_weight: 0.05,
        max_weight: 0.6,
        cash_buffer: 0.15,
        turnover_cap,
        vol_window: 20,
    }
}

#[test]
/// Verifies single-asset shaping:
/// a lone selection is clipped to max_weight and then rescaled back to the full
/// non-cash allocation, while unselected symbols stay at zero.
fn single_selection_gets_full_non_cash_allocation() {
    let prices = noisy_table(30);
    let w = shape(&prices, &["A".to_string()], &universe(), &params(None), None).unwrap();
    assert!((w["A"] - 0.85).abs() < 1e-12);
    assert_eq!(w["B"], 0.0);
    assert_eq!(w["C"], 0.0);
}

#[test]
/// Verifies the pre-rescale turnover clamp:
/// prev 0.5 with target 0.8 and cap 0.1 clamps to exactly 0.6.
fn turnover_clamp_limits_per_asset_move() {
    let capped = clamp_turnover(&wv(&[("A", 0.8)]), &wv(&[("A", 0.5)]), 0.1);
    assert!((capped["A"] - 0.6).abs() < 1e-12);

    let target = wv(&[("A", 0.05), ("B", 0.45), ("C", 0.35)]);
    let prev = wv(&[("A", 0.40), ("B", 0.40), ("C", 0.05)]);
    let capped = clamp_turnover(&target, &prev, 0.1);
    for (sym, w) in &capped {
        assert!((w - prev[sym]).abs() <= 0.1 + 1e-12, "{} moved too far", sym);
    }
}

#[test]
/// Verifies inverse-volatility weighting favors the calmer asset.
fn inverse_vol_prefers_low_volatility() {
    let prices = noisy_table(40);
    let base = inverse_vol_weights(&prices, &universe(), 20).unwrap();
    assert!(base["A"] > base["B"] && base["B"] > base["C"]);
    assert!((base.values().sum::<f64>() - 1.0).abs() < 1e-12);
}

#[test]
/// Verifies short history falls back to equal weights.
fn short_history_uses_equal_weights() {
    let prices = noisy_table(10);
    let base = inverse_vol_weights(&prices, &universe(), 20).unwrap();
    for w in base.values() {
        assert!((w - 1.0 / 3.0).abs() < 1e-12);
    }
}

#[test]
/// Verifies weight invariants without a previous plan:
/// total never exceeds one and unselected symbols are exactly zero.
fn weights_sum_at_most_one_and_unselected_are_zero() {
    let prices = noisy_table(40);
    let selected = vec!["A".to_string(), "C".to_string()];
    for cash in [0.0, 0.15, 0.55] {
        let p = ShapeParams {
            cash_buffer: cash,
            ..params(None)
        };
        let w = shape(&prices, &selected, &universe(), &p, None).unwrap();
        assert!(w.values().sum::<f64>() <= 1.0 + 1e-12);
        assert!((w.values().sum::<f64>() - (1.0 - cash)).abs() < 1e-9);
        assert_eq!(w["B"], 0.0);
    }
}

#[test]
/// Verifies shaping is idempotent for identical inputs, including prev weights.
fn shaping_is_idempotent() {
    let prices = noisy_table(40);
    let selected = vec!["B".to_string(), "C".to_string()];
    let prev = wv(&[("A", 0.5), ("B", 0.2), ("C", 0.1)]);
    let first = shape(&prices, &selected, &universe(), &params(Some(0.1)), Some(&prev)).unwrap();
    let second = shape(&prices, &selected, &universe(), &params(Some(0.1)), Some(&prev)).unwrap();
    assert_eq!(first, second);
    assert!(first.values().sum::<f64>() <= 1.0 + 1e-12);
}

#[test]
/// Verifies symbols outside the universe are ignored rather than weighted.
fn selection_outside_universe_is_ignored() {
    let prices = noisy_table(30);
    let selected = vec!["A".to_string(), "ZZZ".to_string()];
    let w = shape(&prices, &selected, &universe(), &params(None), None).unwrap();
    assert_eq!(w.len(), 3);
    assert!(!w.contains_key("ZZZ"));
    assert!((w["A"] - 0.85).abs() < 1e-12);
}

/// A = flat price, B and C = zigzag noise.
fn flat_and_noisy_table(rows: usize) -> PriceTable {
    PriceTable::new(
        (0..rows as u64).map(|i| i * DAY_MS).collect(),
        universe(),
        vec![vec![100.0; rows], zigzag(rows, 0.02), zigzag(rows, 0.04)],
    )
    .unwrap()
}

#[test]
/// Verifies zero volatility is floored rather than dividing by zero:
/// the flat asset takes almost all of the base weight, then max_weight clipping
/// and the single min_weight bump still land the total on 1 - cash_buffer.
fn zero_volatility_is_floored_and_bounds_still_apply() {
    let prices = flat_and_noisy_table(40);
    let selected = vec!["A".to_string(), "B".to_string()];

    let base = inverse_vol_weights(&prices, &selected, 20).unwrap();
    assert!(base["A"] > 0.999_999);
    assert!(base["B"] > 0.0 && base["B"] < 1e-6);
    assert!(base.values().all(|w| w.is_finite()));

    let w = shape(&prices, &selected, &universe(), &params(None), None).unwrap();
    assert!((w.values().sum::<f64>() - 0.85).abs() < 1e-9);
    // A clipped to 0.6 and scaled to 0.85; B lifted to 0.05; one rescale by 0.85 / 0.9
    assert!((w["A"] - 0.85 * 0.85 / 0.9).abs() < 1e-6);
    assert!((w["B"] - 0.05 * 0.85 / 0.9).abs() < 1e-6);
    assert_eq!(w["C"], 0.0);
}

#[test]
/// Verifies a volatility window below two leaves every volatility missing,
/// which fills with 1.0 and yields equal weights.
fn missing_volatility_everywhere_falls_back_to_equal_weights() {
    let prices = flat_and_noisy_table(40);
    let base = inverse_vol_weights(&prices, &universe(), 1).unwrap();
    assert_eq!(base.len(), 3);
    for w in base.values() {
        assert!((w - 1.0 / 3.0).abs() < 1e-12);
    }
}
