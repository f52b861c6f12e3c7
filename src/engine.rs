//! One decision cycle: regime -> estimate -> select -> shape -> [`Plan`].

use anyhow::{Context, Result};

use crate::config::{Config, OptimizerKind};
use crate::error::AppError;
use crate::estimator::{self, EstimatorConfig};
use crate::model::plan::{Plan, Regime, WeightVector};
use crate::model::price_table::PriceTable;
use crate::regime::{RegimeClassifier, RegimePresets, RiskKnobs};
use crate::selector::{self, Deterministic, Optimizer, SelectionParams, StochasticAnnealer};
use crate::state::StateStore;
use crate::weights::{self, ShapeParams};

/// Where the cycle's risk knobs come from.
#[derive(Debug, Clone)]
pub enum KnobSource {
    /// Classify the benchmark and look the knobs up per regime.
    Regime {
        classifier: RegimeClassifier,
        benchmark: String,
        presets: RegimePresets,
    },
    /// Fixed knobs; the plan is tagged `chop`.
    Static(RiskKnobs),
}

pub struct RotationEngine {
    knobs: KnobSource,
    estimator: EstimatorConfig,
    penalty: f64,
    shape: ShapeParams,
    optimizer: Box<dyn Optimizer + Send + Sync>,
}

impl RotationEngine {
    pub fn new(
        knobs: KnobSource,
        estimator: EstimatorConfig,
        penalty: f64,
        shape: ShapeParams,
        optimizer: Box<dyn Optimizer + Send + Sync>,
    ) -> Self {
        Self {
            knobs,
            estimator,
            penalty,
            shape,
            optimizer,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let sel = &config.selection;
        let optimizer: Box<dyn Optimizer + Send + Sync> = match sel.optimizer {
            OptimizerKind::Annealer => Box::new(StochasticAnnealer::new(
                sel.num_reads,
                sel.num_sweeps,
                sel.seed,
            )),
            OptimizerKind::Greedy => Box::new(Deterministic),
        };
        let knobs = if config.regime.enabled {
            KnobSource::Regime {
                classifier: RegimeClassifier::default(),
                benchmark: config.regime.benchmark.to_ascii_uppercase(),
                presets: config.regime.presets,
            }
        } else {
            KnobSource::Static(config.trading.static_knobs())
        };
        let t = &config.trading;
        let shape = ShapeParams {
            min_weight: t.min_weight,
            max_weight: t.max_weight,
            cash_buffer: t.cash_buffer,
            turnover_cap: t.turnover_cap,
            vol_window: sel.vol_window,
        };
        Self::new(knobs, sel.estimator_config(), sel.penalty, shape, optimizer)
    }

    pub fn optimizer_name(&self) -> &'static str {
        self.optimizer.name()
    }

    fn resolve_knobs(&self, prices: &PriceTable) -> (Regime, RiskKnobs) {
        match &self.knobs {
            KnobSource::Regime {
                classifier,
                benchmark,
                presets,
            } => {
                let regime = classifier.classify(prices, benchmark);
                (regime, presets.for_regime(regime))
            }
            KnobSource::Static(knobs) => (Regime::Chop, *knobs),
        }
    }

    /// Run the full pipeline over `prices`. The table's columns are the universe.
    pub fn run_cycle(
        &self,
        prices: &PriceTable,
        prev_weights: Option<&WeightVector>,
        now_ts: i64,
    ) -> Result<Plan, AppError> {
        if prices.is_empty() {
            return Err(AppError::MalformedPrices("price table has no rows".to_string()));
        }
        let universe = prices.symbols();

        let (regime, knobs) = self.resolve_knobs(prices);
        tracing::info!(
            regime = %regime,
            cash_buffer = knobs.cash_buffer,
            max_positions = knobs.max_positions,
            risk_aversion = knobs.risk_aversion,
            "Regime resolved"
        );

        let estimate = estimator::estimate(prices, &self.estimator)?;
        tracing::debug!(mode = ?self.estimator.mode, rows = prices.len(), "Estimates computed");

        let params = SelectionParams {
            max_positions: knobs.max_positions,
            risk_aversion: knobs.risk_aversion,
            penalty: self.penalty,
        };
        let chosen = selector::select(universe, &estimate, &params, self.optimizer.as_ref())?;
        tracing::info!(optimizer = self.optimizer.name(), chosen = ?chosen, "Assets selected");

        let shape = ShapeParams {
            cash_buffer: knobs.cash_buffer,
            ..self.shape.clone()
        };
        let weights = weights::shape(prices, &chosen, universe, &shape, prev_weights)?;
        tracing::info!(weights = ?weights, cash_buffer = knobs.cash_buffer, "Target weights");

        Ok(Plan {
            chosen,
            weights,
            regime,
            ts: now_ts,
        })
    }

    /// Read the previous plan, run one cycle against it, and hand the result
    /// back to the store.
    pub fn run_with_store(
        &self,
        store: &mut dyn StateStore,
        prices: &PriceTable,
        now_ts: i64,
    ) -> Result<Plan> {
        let prev = store.load_plan().context("failed to load previous plan")?;
        let plan = self.run_cycle(prices, prev.as_ref().map(|p| &p.weights), now_ts)?;
        store.save_plan(&plan).context("failed to save plan")?;
        Ok(plan)
    }
}
