use anyhow::Result;

use rotation_quant::config::Config;
use rotation_quant::engine::{KnobSource, RotationEngine};
use rotation_quant::estimator::EstimatorConfig;
use rotation_quant::model::plan::{Plan, Regime, WeightVector};
use rotation_quant::model::price_table::PriceTable;
use rotation_quant::regime::RiskKnobs;
use rotation_quant::selector::Deterministic;
use rotation_quant::state::StateStore;
use rotation_quant::weights::ShapeParams;

const DAY_MS: u64 = 86_400_000;

const CONFIG: &str = r#"
[binance]
rest_base_url = "https://testnet.binance.vision"
kline_interval = "1d"

[trading]
base_ccy = "USDT"
symbols = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT"]
lookback = 200
min_weight = 0.05
max_weight = 0.6
cash_buffer = 0.15
max_positions = 3
risk_aversion = 0.5
turnover_cap = 0.1

[selection]
optimizer = "annealer"
num_reads = 40
num_sweeps = 200
seed = 3
"#;

/// Four assets with distinct drifts and shock sizes over `rows` daily bars.
fn market(rows: usize) -> PriceTable {
    let specs = [
        ("BTCUSDT", 0.004, 0.01),
        ("ETHUSDT", 0.002, 0.02),
        ("SOLUSDT", -0.003, 0.03),
        ("XRPUSDT", 0.001, 0.005),
    ];
    let columns = specs
        .iter()
        .map(|(_, drift, amp)| {
            let mut lp = 50f64.ln();
            (0..rows)
                .map(|i| {
                    if i > 0 {
                        let sign = if i % 3 == 0 { 1.0 } else { -0.5 };
                        lp += drift + sign * amp;
                    }
                    lp.exp()
                })
                .collect()
        })
        .collect();
    PriceTable::new(
        (0..rows as u64).map(|i| i * DAY_MS).collect(),
        specs.iter().map(|(s, _, _)| s.to_string()).collect(),
        columns,
    )
    .unwrap()
}

#[derive(Default)]
struct MemoryStore {
    plan: Option<Plan>,
    saves: usize,
}

impl StateStore for MemoryStore {
    fn load_plan(&self) -> Result<Option<Plan>> {
        Ok(self.plan.clone())
    }

    fn save_plan(&mut self, plan: &Plan) -> Result<()> {
        self.saves += 1;
        self.plan = Some(plan.clone());
        Ok(())
    }
}

#[test]
/// Verifies one configured cycle end to end:
/// the plan respects the resolved regime's position count, keeps weights within
/// [0, 1] in total, zeroes unselected symbols, and carries the cycle timestamp.
fn configured_cycle_produces_consistent_plan() {
    let cfg = Config::from_toml_str(CONFIG).unwrap();
    let engine = RotationEngine::from_config(&cfg);
    assert_eq!(engine.optimizer_name(), "annealer");

    let prices = market(200);
    let plan = engine.run_cycle(&prices, None, 1_700_000_000).unwrap();

    let knobs = cfg.regime.presets.for_regime(plan.regime);
    assert!(!plan.chosen.is_empty() && plan.chosen.len() <= knobs.max_positions);
    assert_eq!(plan.weights.len(), 4);
    assert!(plan.allocated() <= 1.0 + 1e-12);
    assert!((plan.allocated() - (1.0 - knobs.cash_buffer)).abs() < 1e-9);
    for (sym, w) in &plan.weights {
        if !plan.chosen.contains(sym) {
            assert_eq!(*w, 0.0, "{} should be unallocated", sym);
        }
    }
    assert_eq!(plan.ts, 1_700_000_000);
}

#[test]
/// Verifies static knobs when regime switching is off:
/// the plan is tagged chop and uses the trading section's knobs.
fn static_knobs_tag_plan_as_chop() {
    let engine = RotationEngine::new(
        KnobSource::Static(RiskKnobs {
            cash_buffer: 0.2,
            max_positions: 2,
            risk_aversion: 0.5,
        }),
        EstimatorConfig::default(),
        2.0,
        ShapeParams {
            turnover_cap: None,
            ..ShapeParams::default()
        },
        Box::new(Deterministic),
    );
    let plan = engine.run_cycle(&market(200), None, 1).unwrap();
    assert_eq!(plan.regime, Regime::Chop);
    assert_eq!(plan.chosen.len(), 2);
    assert!((plan.allocated() - 0.8).abs() < 1e-9);
}

#[test]
/// Verifies the store-backed cycle reads once, writes once, and feeds the
/// previous weights into the turnover cap.
fn store_cycle_uses_previous_plan_for_turnover() {
    let cfg = Config::from_toml_str(CONFIG).unwrap();
    let engine = RotationEngine::from_config(&cfg);
    let prev = Plan {
        chosen: vec!["SOLUSDT".to_string()],
        weights: WeightVector::from([
            ("BTCUSDT".to_string(), 0.0),
            ("ETHUSDT".to_string(), 0.0),
            ("SOLUSDT".to_string(), 0.85),
            ("XRPUSDT".to_string(), 0.0),
        ]),
        regime: Regime::Bull,
        ts: 0,
    };
    let mut store = MemoryStore {
        plan: Some(prev),
        ..MemoryStore::default()
    };

    let plan = engine.run_with_store(&mut store, &market(200), 10).unwrap();
    assert_eq!(store.saves, 1);
    assert_eq!(store.plan.as_ref(), Some(&plan));
    // SOL is steadily falling; the cap keeps part of its old allocation.
    assert!(plan.weights["SOLUSDT"] > 0.0);
    assert!(plan.allocated() <= 1.0 + 1e-12);
}

#[test]
/// Verifies an empty price table fails the cycle instead of producing a plan.
fn empty_price_table_is_fatal() {
    let cfg = Config::from_toml_str(CONFIG).unwrap();
    let engine = RotationEngine::from_config(&cfg);
    let empty = PriceTable::new(
        Vec::new(),
        vec!["BTCUSDT".to_string()],
        vec![Vec::new()],
    )
    .unwrap();
    assert!(engine.run_cycle(&empty, None, 0).is_err());
}
