use crate::estimator::MeanVariance;

/// Quadratic objective over binary inclusion variables:
/// `E(x) = sum_i linear[i] x_i + sum_{i<j} q[i][j] x_i x_j`.
///
/// Built from a mean-variance estimate with a soft cardinality penalty
/// `penalty * (sum(x) - k)^2` folded into the linear and pairwise terms
/// (the constant `k^2` is dropped).
#[derive(Debug, Clone, PartialEq)]
pub struct QuboObjective {
    linear: Vec<f64>,
    // Symmetric storage; the diagonal is unused.
    pairwise: Vec<Vec<f64>>,
    target_count: usize,
}

impl QuboObjective {
    pub fn from_mean_variance(mv: &MeanVariance, lam: f64, k: usize, penalty: f64) -> Self {
        let n = mv.mu.len();
        let k = k.max(1);
        let card_linear = penalty * (1.0 - 2.0 * k as f64);
        let linear = (0..n)
            .map(|i| -mv.mu[i] + lam * mv.sigma[i][i] + card_linear)
            .collect();
        let mut pairwise = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let q = lam * mv.sigma[i][j] + 2.0 * penalty;
                pairwise[i][j] = q;
                pairwise[j][i] = q;
            }
        }
        Self {
            linear,
            pairwise,
            target_count: k,
        }
    }

    pub fn len(&self) -> usize {
        self.linear.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linear.is_empty()
    }

    /// Cardinality the penalty pulls toward.
    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn linear(&self, i: usize) -> f64 {
        self.linear[i]
    }

    pub fn pairwise(&self, i: usize, j: usize) -> f64 {
        if i == j {
            0.0
        } else {
            self.pairwise[i][j]
        }
    }

    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|v| v.is_finite())
            && self.pairwise.iter().flatten().all(|v| v.is_finite())
    }

    pub fn energy(&self, x: &[bool]) -> f64 {
        let n = self.len();
        let mut e = 0.0;
        for i in 0..n {
            if !x[i] {
                continue;
            }
            e += self.linear[i];
            for j in (i + 1)..n {
                if x[j] {
                    e += self.pairwise[i][j];
                }
            }
        }
        e
    }

    /// Energy change from flipping variable `i` in assignment `x`.
    pub fn flip_delta(&self, x: &[bool], i: usize) -> f64 {
        let field = self.linear[i]
            + x.iter()
                .enumerate()
                .filter(|(j, on)| **on && *j != i)
                .map(|(j, _)| self.pairwise[i][j])
                .sum::<f64>();
        if x[i] {
            -field
        } else {
            field
        }
    }

    /// Largest possible single-flip energy change.
    pub fn max_flip_magnitude(&self) -> f64 {
        (0..self.len())
            .map(|i| {
                self.linear[i].abs() + self.pairwise[i].iter().map(|q| q.abs()).sum::<f64>()
            })
            .fold(0.0, f64::max)
    }

    /// Smallest non-zero coefficient magnitude.
    pub fn min_coefficient_magnitude(&self) -> Option<f64> {
        self.linear
            .iter()
            .chain(self.pairwise.iter().flatten())
            .map(|v| v.abs())
            .filter(|v| *v > 0.0)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_estimate(n: usize) -> MeanVariance {
        MeanVariance {
            mu: vec![0.0; n],
            sigma: vec![vec![0.0; n]; n],
        }
    }

    #[test]
    fn coefficients_follow_mean_variance_with_cardinality_penalty() {
        let mv = MeanVariance {
            mu: vec![0.01, 0.02],
            sigma: vec![vec![0.04, 0.01], vec![0.01, 0.09]],
        };
        let q = QuboObjective::from_mean_variance(&mv, 0.5, 1, 2.0);
        // -mu + lam*var + penalty*(1 - 2k)
        assert!((q.linear(0) - (-0.01 + 0.02 - 2.0)).abs() < 1e-12);
        assert!((q.linear(1) - (-0.02 + 0.045 - 2.0)).abs() < 1e-12);
        // lam*cov + 2*penalty
        assert!((q.pairwise(0, 1) - (0.005 + 4.0)).abs() < 1e-12);
        assert_eq!(q.pairwise(1, 1), 0.0);
    }

    #[test]
    fn penalty_makes_target_count_the_energy_minimum() {
        let q = QuboObjective::from_mean_variance(&flat_estimate(3), 0.5, 2, 2.0);
        let e = |bits: [bool; 3]| q.energy(&bits);
        assert!((e([false, false, false]) - 0.0).abs() < 1e-12);
        assert!((e([true, false, false]) + 6.0).abs() < 1e-12);
        assert!((e([true, true, false]) + 8.0).abs() < 1e-12);
        assert!((e([true, true, true]) + 6.0).abs() < 1e-12);
    }

    #[test]
    fn flip_delta_matches_energy_difference() {
        let mv = MeanVariance {
            mu: vec![0.03, -0.01, 0.02, 0.0],
            sigma: vec![
                vec![0.05, 0.01, 0.00, 0.02],
                vec![0.01, 0.03, 0.01, 0.00],
                vec![0.00, 0.01, 0.04, 0.01],
                vec![0.02, 0.00, 0.01, 0.06],
            ],
        };
        let q = QuboObjective::from_mean_variance(&mv, 0.7, 2, 2.0);
        let x = vec![true, false, true, false];
        for i in 0..4 {
            let mut y = x.clone();
            y[i] = !y[i];
            let expected = q.energy(&y) - q.energy(&x);
            assert!((q.flip_delta(&x, i) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn non_finite_estimate_is_detected() {
        let mut mv = flat_estimate(2);
        mv.mu[1] = f64::NAN;
        let q = QuboObjective::from_mean_variance(&mv, 0.5, 1, 2.0);
        assert!(!q.is_finite());
    }
}
