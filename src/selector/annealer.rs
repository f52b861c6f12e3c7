use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::AppError;

use super::qubo::QuboObjective;
use super::Optimizer;

const HOT_ACCEPT: f64 = 2.0;
const COLD_ACCEPT: f64 = 100.0;

/// Simulated-annealing sampler over binary assignments.
///
/// Each read starts from a random assignment and runs `num_sweeps` Metropolis
/// sweeps on a geometric inverse-temperature schedule. The schedule endpoints
/// are derived from the objective: at the hottest point the largest possible
/// uphill flip is accepted with probability 1/2, at the coldest point the
/// smallest coefficient-sized uphill flip is accepted with probability 1/100.
/// The lowest-energy final state across reads wins.
#[derive(Debug, Clone)]
pub struct StochasticAnnealer {
    num_reads: usize,
    num_sweeps: usize,
    seed: Option<u64>,
}

impl Default for StochasticAnnealer {
    fn default() -> Self {
        Self::new(600, 1000, None)
    }
}

impl StochasticAnnealer {
    pub fn new(num_reads: usize, num_sweeps: usize, seed: Option<u64>) -> Self {
        Self {
            num_reads: num_reads.max(1),
            num_sweeps: num_sweeps.max(1),
            seed,
        }
    }

    fn beta_schedule(&self, objective: &QuboObjective) -> Vec<f64> {
        let max_delta = objective.max_flip_magnitude();
        let min_delta = objective.min_coefficient_magnitude().unwrap_or(max_delta);
        if max_delta <= 0.0 || min_delta <= 0.0 {
            return vec![1.0; self.num_sweeps];
        }
        let beta_hot = HOT_ACCEPT.ln() / max_delta;
        let beta_cold = (COLD_ACCEPT.ln() / min_delta).max(beta_hot);
        if self.num_sweeps == 1 {
            return vec![beta_cold];
        }
        let ratio = (beta_cold / beta_hot).powf(1.0 / (self.num_sweeps - 1) as f64);
        let mut beta = beta_hot;
        let mut out = Vec::with_capacity(self.num_sweeps);
        for _ in 0..self.num_sweeps {
            out.push(beta);
            beta *= ratio;
        }
        out
    }

    fn anneal_once(
        objective: &QuboObjective,
        schedule: &[f64],
        rng: &mut StdRng,
    ) -> (Vec<bool>, f64) {
        let n = objective.len();
        let mut x: Vec<bool> = (0..n).map(|_| rng.gen::<bool>()).collect();
        let mut energy = objective.energy(&x);
        for &beta in schedule {
            for i in 0..n {
                let delta = objective.flip_delta(&x, i);
                if delta <= 0.0 || rng.gen::<f64>() < (-beta * delta).exp() {
                    x[i] = !x[i];
                    energy += delta;
                }
            }
        }
        (x, energy)
    }
}

impl Optimizer for StochasticAnnealer {
    fn name(&self) -> &'static str {
        "annealer"
    }

    fn solve(&self, objective: &QuboObjective) -> Result<Vec<bool>, AppError> {
        if !objective.is_finite() {
            return Err(AppError::Optimizer(
                "objective has non-finite coefficients".to_string(),
            ));
        }
        if objective.is_empty() {
            return Ok(Vec::new());
        }

        let schedule = self.beta_schedule(objective);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut best: Option<(Vec<bool>, f64)> = None;
        for _ in 0..self.num_reads {
            let (x, energy) = Self::anneal_once(objective, &schedule, &mut rng);
            if best.as_ref().map_or(true, |(_, e)| energy < *e) {
                best = Some((x, energy));
            }
        }

        best.map(|(x, _)| x)
            .ok_or_else(|| AppError::Optimizer("annealer produced no samples".to_string()))
    }
}
