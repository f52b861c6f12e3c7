use anyhow::{bail, Context, Result};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub open_time: u64,
    pub close_time: u64,
}

impl Candle {
    /// Parse one row of the Binance kline array format:
    /// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
    pub fn from_kline_row(row: &Value) -> Result<Self> {
        let fields = row
            .as_array()
            .context("kline row is not an array")?;
        if fields.len() < 7 {
            bail!("kline row has {} fields, expected at least 7", fields.len());
        }
        Ok(Self {
            open_time: as_u64(&fields[0]).context("kline open time")?,
            open: as_f64(&fields[1]).context("kline open")?,
            high: as_f64(&fields[2]).context("kline high")?,
            low: as_f64(&fields[3]).context("kline low")?,
            close: as_f64(&fields[4]).context("kline close")?,
            volume: as_f64(&fields[5]).context("kline volume")?,
            close_time: as_u64(&fields[6]).context("kline close time")?,
        })
    }
}

fn as_f64(v: &Value) -> Result<f64> {
    match v {
        Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("invalid number '{}'", s)),
        Value::Number(n) => n.as_f64().context("invalid number"),
        _ => bail!("expected string or number, got {}", v),
    }
}

fn as_u64(v: &Value) -> Result<u64> {
    match v {
        Value::Number(n) => n.as_u64().context("expected unsigned integer"),
        Value::String(s) => s
            .parse::<u64>()
            .with_context(|| format!("invalid integer '{}'", s)),
        _ => bail!("expected integer, got {}", v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binance_kline_row() {
        let row = serde_json::json!([
            1499040000000u64,
            "0.01634790",
            "0.80000000",
            "0.01575800",
            "0.01577100",
            "148976.11427815",
            1499644799999u64,
            "2434.19055334",
            308,
            "1756.87402397",
            "28.46694368",
            "0"
        ]);
        let candle = Candle::from_kline_row(&row).unwrap();
        assert_eq!(candle.open_time, 1_499_040_000_000);
        assert_eq!(candle.close_time, 1_499_644_799_999);
        assert!((candle.close - 0.015771).abs() < 1e-12);
    }

    #[test]
    fn rejects_short_rows() {
        let row = serde_json::json!([1, "1.0", "1.0"]);
        assert!(Candle::from_kline_row(&row).is_err());
    }

    #[test]
    fn rejects_non_numeric_close() {
        let row = serde_json::json!([1, "1.0", "1.0", "1.0", "abc", "1.0", 2]);
        assert!(Candle::from_kline_row(&row).is_err());
    }
}
