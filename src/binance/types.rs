use serde::Deserialize;

/// Deserialize Binance string-encoded numbers to f64.
pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

/// Binance order response (newOrderRespType=FULL).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrderResponse {
    pub symbol: String,
    pub order_id: u64,
    pub client_order_id: String,
    #[serde(deserialize_with = "string_to_f64")]
    pub orig_qty: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub executed_qty: f64,
    #[serde(default, deserialize_with = "string_to_f64")]
    pub cummulative_quote_qty: f64,
    pub status: String,
    pub side: String,
    #[serde(default)]
    pub fills: Vec<BinanceFill>,
}

impl BinanceOrderResponse {
    /// Volume-weighted fill price, `None` when nothing filled.
    pub fn avg_fill_price(&self) -> Option<f64> {
        let qty: f64 = self.fills.iter().map(|f| f.qty).sum();
        if qty <= 0.0 {
            return None;
        }
        Some(self.fills.iter().map(|f| f.price * f.qty).sum::<f64>() / qty)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceFill {
    #[serde(deserialize_with = "string_to_f64")]
    pub price: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub qty: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub commission: f64,
    pub commission_asset: String,
}

/// Binance API error response.
#[derive(Debug, Deserialize)]
pub struct BinanceApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

/// Latest price (GET /api/v3/ticker/price).
#[derive(Debug, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    #[serde(deserialize_with = "string_to_f64")]
    pub price: f64,
}

/// Binance account info response (GET /api/v3/account).
#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    pub balances: Vec<AccountBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountBalance {
    pub asset: String,
    #[serde(deserialize_with = "string_to_f64")]
    pub free: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub locked: f64,
}

impl AccountBalance {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}

/// Exchange info response (GET /api/v3/exchangeInfo), reduced to symbol filters.
#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSymbol {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        #[serde(deserialize_with = "string_to_f64")]
        min_qty: f64,
        #[serde(deserialize_with = "string_to_f64")]
        max_qty: f64,
        #[serde(deserialize_with = "string_to_f64")]
        step_size: f64,
    },
    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional {
        #[serde(deserialize_with = "string_to_f64")]
        min_notional: f64,
    },
    #[serde(rename = "NOTIONAL", rename_all = "camelCase")]
    Notional {
        #[serde(deserialize_with = "string_to_f64")]
        min_notional: f64,
    },
    #[serde(other)]
    Other,
}

/// Trading constraints for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TradeFilters {
    pub min_qty: f64,
    pub max_qty: Option<f64>,
    pub step_size: f64,
    pub min_notional: f64,
}

impl ExchangeSymbol {
    pub fn trade_filters(&self) -> TradeFilters {
        let mut out = TradeFilters::default();
        for f in &self.filters {
            match f {
                SymbolFilter::LotSize {
                    min_qty,
                    max_qty,
                    step_size,
                } => {
                    out.min_qty = *min_qty;
                    out.max_qty = (*max_qty > 0.0).then_some(*max_qty);
                    out.step_size = *step_size;
                }
                SymbolFilter::MinNotional { min_notional }
                | SymbolFilter::Notional { min_notional } => {
                    out.min_notional = *min_notional;
                }
                SymbolFilter::Other => {}
            }
        }
        out
    }
}
