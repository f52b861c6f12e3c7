use std::collections::VecDeque;

/// Sample standard deviation (n - 1 denominator). `None` for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>();
    Some((ss / (n - 1.0)).sqrt())
}

/// Rolling sample stdev over a fixed window.
#[derive(Debug, Clone)]
pub struct RollingStdev {
    period: usize,
    window: VecDeque<f64>,
}

impl RollingStdev {
    pub fn new(period: usize) -> Self {
        assert!(period > 1, "stdev period must be > 1");
        Self {
            period,
            window: VecDeque::with_capacity(period),
        }
    }

    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(value);
        if self.window.len() < self.period {
            return None;
        }
        let (head, tail) = self.window.as_slices();
        if tail.is_empty() {
            sample_stdev(head)
        } else {
            let joined: Vec<f64> = head.iter().chain(tail).copied().collect();
            sample_stdev(&joined)
        }
    }
}

/// Rolling stdev aligned to `values`; `None` until `period` values are seen.
pub fn rolling_stdev(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut roll = RollingStdev::new(period);
    values.iter().map(|v| roll.push(*v)).collect()
}

/// Stdev of the trailing `period` values.
pub fn trailing_stdev(values: &[f64], period: usize) -> Option<f64> {
    if period < 2 || values.len() < period {
        return None;
    }
    sample_stdev(&values[values.len() - period..])
}
