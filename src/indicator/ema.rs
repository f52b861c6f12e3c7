use super::sma::Sma;

/// Exponential Moving Average with span `period` (alpha = 2 / (period + 1)).
/// The first value is the SMA of the first `period` inputs.
#[derive(Debug, Clone)]
pub struct Ema {
    multiplier: f64,
    ema: Option<f64>,
    seed: Sma,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "EMA period must be > 0");
        Self {
            multiplier: 2.0 / (period as f64 + 1.0),
            ema: None,
            seed: Sma::new(period),
        }
    }

    /// Push a new value, return the current EMA if enough data.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.ema = match self.ema {
            Some(prev) => Some((value - prev) * self.multiplier + prev),
            None => self.seed.push(value),
        };
        self.ema
    }

    pub fn value(&self) -> Option<f64> {
        self.ema
    }

    pub fn is_ready(&self) -> bool {
        self.ema.is_some()
    }
}

/// EMA after consuming the whole series, `None` if it never warmed up.
pub fn last_ema(values: &[f64], period: usize) -> Option<f64> {
    let mut ema = Ema::new(period);
    for v in values {
        ema.push(*v);
    }
    ema.value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_with_sma_then_smooths() {
        let mut ema = Ema::new(3);
        assert_eq!(ema.push(1.0), None);
        assert_eq!(ema.push(2.0), None);
        assert!(!ema.is_ready());
        assert!((ema.push(3.0).unwrap() - 2.0).abs() < 1e-12);
        // alpha = 0.5
        assert!((ema.push(4.0).unwrap() - 3.0).abs() < 1e-12);
        assert!((ema.push(8.0).unwrap() - 5.5).abs() < 1e-12);
    }

    #[test]
    fn last_ema_of_short_series_is_none() {
        assert_eq!(last_ema(&[1.0, 2.0], 5), None);
        assert!((last_ema(&[2.0; 10], 5).unwrap() - 2.0).abs() < 1e-12);
    }
}
