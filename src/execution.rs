//! Live rebalance sizing: turn target weights into exchange-sized market orders.

use std::collections::HashMap;

use crate::binance::types::TradeFilters;
use crate::model::order::OrderSide;
use crate::model::plan::WeightVector;

/// Stable taxonomy for per-symbol skips in the rebalance path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPrice,
    BelowMinNotional,
    RoundedToZero,
    OrderRejected,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoPrice => "exec.no_price",
            Self::BelowMinNotional => "exec.below_min_notional",
            Self::RoundedToZero => "exec.rounded_to_zero",
            Self::OrderRejected => "broker.order_rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    /// Trading symbol (e.g. `BTCUSDT`).
    pub symbol: String,
    pub side: OrderSide,
    /// Base-asset quantity, already rounded to the lot step.
    pub qty: f64,
    /// Estimated quote notional at the sizing price.
    pub notional: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RebalanceDecision {
    Order(OrderIntent),
    Skip { symbol: String, reason: SkipReason },
}

impl RebalanceDecision {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Order(o) => &o.symbol,
            Self::Skip { symbol, .. } => symbol,
        }
    }
}

/// Base-asset part of a spot pair (`ETHUSDT` with quote `USDT` -> `ETH`).
pub fn base_asset<'a>(symbol: &'a str, quote: &str) -> &'a str {
    symbol.strip_suffix(quote).unwrap_or(symbol)
}

/// Quote balance plus every priced holding marked to market.
pub fn portfolio_equity(
    quote_balance: f64,
    holdings: &HashMap<String, f64>,
    prices: &HashMap<String, f64>,
) -> f64 {
    quote_balance
        + holdings
            .iter()
            .filter(|(_, qty)| **qty > 0.0)
            .filter_map(|(sym, qty)| prices.get(sym).map(|px| qty * px))
            .sum::<f64>()
}

/// Floor `qty` to a multiple of `step`. A non-positive step leaves `qty` as is.
pub fn round_down_to_step(qty: f64, step: f64) -> f64 {
    if step <= 0.0 || !step.is_finite() {
        return qty;
    }
    // Tolerate representation error so 0.3 / 0.1 floors to 3, not 2.
    let units = (qty / step + 1e-9).floor();
    (units * step).max(0.0)
}

/// Size one market order per universe symbol. `holdings` and `prices` are
/// keyed by trading symbol. Sells are ordered before buys so freed quote
/// balance is available to the buys.
pub fn plan_rebalance(
    weights: &WeightVector,
    equity: f64,
    prices: &HashMap<String, f64>,
    holdings: &HashMap<String, f64>,
    filters: &HashMap<String, TradeFilters>,
    user_min_notional: f64,
) -> Vec<RebalanceDecision> {
    let mut sells = Vec::new();
    let mut buys = Vec::new();
    let mut skips = Vec::new();

    for (symbol, weight) in weights {
        let skip = |reason| RebalanceDecision::Skip {
            symbol: symbol.clone(),
            reason,
        };
        let Some(&price) = prices.get(symbol).filter(|p| **p > 0.0) else {
            skips.push(skip(SkipReason::NoPrice));
            continue;
        };
        let f = filters.get(symbol).copied().unwrap_or_default();
        let min_notional = user_min_notional.max(f.min_notional);

        let target_qty = equity * weight / price;
        let held = holdings.get(symbol).copied().unwrap_or(0.0);
        let diff = target_qty - held;
        if diff.abs() * price < min_notional {
            skips.push(skip(SkipReason::BelowMinNotional));
            continue;
        }

        let mut qty = diff.abs();
        if f.min_qty > 0.0 && qty < f.min_qty {
            qty = f.min_qty;
        }
        if let Some(max) = f.max_qty {
            qty = qty.min(max);
        }
        let qty = round_down_to_step(qty, f.step_size);
        if qty <= 0.0 {
            skips.push(skip(SkipReason::RoundedToZero));
            continue;
        }

        let side = if diff > 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let intent = OrderIntent {
            symbol: symbol.clone(),
            side,
            qty,
            notional: qty * price,
        };
        match side {
            OrderSide::Sell => sells.push(RebalanceDecision::Order(intent)),
            OrderSide::Buy => buys.push(RebalanceDecision::Order(intent)),
        }
    }

    skips.into_iter().chain(sells).chain(buys).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_rounding_floors() {
        assert!((round_down_to_step(0.12345, 0.001) - 0.123).abs() < 1e-12);
        assert!((round_down_to_step(0.3, 0.1) - 0.3).abs() < 1e-12);
        assert_eq!(round_down_to_step(0.5, 0.0), 0.5);
    }

    #[test]
    fn base_asset_strips_quote() {
        assert_eq!(base_asset("ETHUSDT", "USDT"), "ETH");
        assert_eq!(base_asset("ETHBTC", "USDT"), "ETHBTC");
    }

    #[test]
    fn equity_marks_priced_holdings() {
        let holdings = HashMap::from([
            ("BTCUSDT".to_string(), 0.01),
            ("ETHUSDT".to_string(), 1.0),
        ]);
        let prices = HashMap::from([("BTCUSDT".to_string(), 50_000.0)]);
        assert!((portfolio_equity(100.0, &holdings, &prices) - 600.0).abs() < 1e-9);
    }
}
