use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::order::OrderSide;
use crate::model::price_table::PriceTable;

use super::types::{
    AccountBalance, AccountInfo, BinanceApiErrorResponse, BinanceOrderResponse, ExchangeInfo,
    ExchangeSymbol, TickerPrice,
};

const MAX_KLINES_PER_REQUEST: usize = 1000;
const INVALID_SYMBOL_CODE: i64 = -1121;

pub struct BinanceRestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    recv_window: u64,
    // Simple rate limiter: request count in current minute window
    request_count: AtomicU64,
    window_start: std::sync::Mutex<Instant>,
}

impl BinanceRestClient {
    pub fn new(base_url: &str, api_key: &str, secret_key: &str, recv_window: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
            recv_window,
            request_count: AtomicU64::new(0),
            window_start: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn sign(&self, query: &str) -> Result<String> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let full_query = if query.is_empty() {
            format!("recvWindow={}&timestamp={}", self.recv_window, timestamp)
        } else {
            format!(
                "{}&recvWindow={}&timestamp={}",
                query, self.recv_window, timestamp
            )
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| AppError::Config(format!("invalid API secret: {}", e)))?;
        mac.update(full_query.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{}&signature={}", full_query, signature))
    }

    fn check_rate_limit(&self) {
        let Ok(mut start) = self.window_start.lock() else {
            return;
        };
        if start.elapsed().as_secs() >= 60 {
            *start = Instant::now();
            self.request_count.store(0, Ordering::Relaxed);
        }
        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 960 {
            tracing::warn!(count, "Approaching rate limit (80% of 1200/min)");
        }
    }

    async fn api_error(resp: reqwest::Response, what: &str) -> anyhow::Error {
        let body = resp.text().await.unwrap_or_default();
        if let Ok(err) = serde_json::from_str::<BinanceApiErrorResponse>(&body) {
            return AppError::BinanceApi {
                code: err.code,
                msg: err.msg,
            }
            .into();
        }
        anyhow::anyhow!("{} request failed: {}", what, body)
    }

    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.check_rate_limit();
        let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST).to_string();
        let url = format!("{}/api/v3/klines", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("symbol", symbol), ("interval", interval), ("limit", limit.as_str())])
            .send()
            .await
            .context("get_klines HTTP failed")?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp, "klines").await);
        }

        let rows: Vec<serde_json::Value> = resp
            .json()
            .await
            .context("get_klines JSON parse failed")?;
        let mut candles = rows
            .iter()
            .map(Candle::from_kline_row)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("malformed kline for {}", symbol))?;
        candles.sort_by_key(|c| c.open_time);
        Ok(candles)
    }

    /// Close-price table for `symbols`, inner-joined on bar open time.
    pub async fn get_price_table(
        &self,
        symbols: &[String],
        interval: &str,
        lookback: usize,
    ) -> Result<PriceTable> {
        let mut series = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let candles = self
                .get_klines(symbol, interval, lookback)
                .await
                .with_context(|| format!("failed to fetch klines for {}", symbol))?;
            tracing::debug!(symbol = %symbol, bars = candles.len(), "Fetched klines");
            series.push((symbol.clone(), candles));
        }
        Ok(PriceTable::from_candles(&series)?)
    }

    /// Latest trade price. `Ok(None)` when the exchange has no price for the symbol.
    pub async fn get_price(&self, symbol: &str) -> Result<Option<f64>> {
        self.check_rate_limit();
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context("get_price HTTP failed")?;
        if !resp.status().is_success() {
            let err = Self::api_error(resp, "ticker").await;
            if let Some(AppError::BinanceApi { code, .. }) = err.downcast_ref::<AppError>() {
                if *code == INVALID_SYMBOL_CODE {
                    return Ok(None);
                }
            }
            return Err(err);
        }
        let ticker: TickerPrice = resp.json().await.context("get_price JSON parse failed")?;
        Ok((ticker.price > 0.0).then_some(ticker.price))
    }

    /// Account balances keyed by asset.
    pub async fn get_balances(&self) -> Result<HashMap<String, AccountBalance>> {
        self.check_rate_limit();
        let signed = self.sign("")?;
        let url = format!("{}/api/v3/account?{}", self.base_url, signed);
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("get_balances HTTP failed")?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp, "account").await);
        }
        let info: AccountInfo = resp.json().await.context("account JSON parse failed")?;
        Ok(info
            .balances
            .into_iter()
            .map(|b| (b.asset.clone(), b))
            .collect())
    }

    /// Exchange metadata for `symbols`, keyed by symbol.
    pub async fn get_exchange_symbols(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, ExchangeSymbol>> {
        self.check_rate_limit();
        let list = serde_json::to_string(symbols)?;
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("symbols", list.as_str())])
            .send()
            .await
            .context("exchangeInfo HTTP failed")?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp, "exchangeInfo").await);
        }
        let info: ExchangeInfo = resp.json().await.context("exchangeInfo JSON parse failed")?;
        Ok(info
            .symbols
            .into_iter()
            .map(|s| (s.symbol.clone(), s))
            .collect())
    }

    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        client_order_id: &str,
    ) -> Result<BinanceOrderResponse> {
        self.check_rate_limit();

        let query = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}&newOrderRespType=FULL",
            symbol,
            side.as_binance_str(),
            format_quantity(quantity),
            client_order_id,
        );
        let signed = self.sign(&query)?;
        let url = format!("{}/api/v3/order?{}", self.base_url, signed);

        tracing::info!(
            symbol,
            side = %side,
            quantity,
            client_order_id,
            "Placing market order"
        );

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("place_market_order HTTP failed")?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp, "order").await);
        }

        let order: BinanceOrderResponse = resp.json().await?;
        tracing::info!(
            order_id = order.order_id,
            status = %order.status,
            client_order_id = %order.client_order_id,
            executed_qty = order.executed_qty,
            "Order response received"
        );
        Ok(order)
    }
}

/// Decimal rendering with at most 8 fractional digits and no trailing zeros.
pub fn format_quantity(q: f64) -> String {
    let s = format!("{:.8}", q);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_signing_produces_hex_signature() {
        let client = BinanceRestClient::new(
            "https://testnet.binance.vision",
            "test_key",
            "test_secret",
            5000,
        );
        let signed = client.sign("symbol=BTCUSDT&side=BUY").unwrap();
        assert!(signed.contains("symbol=BTCUSDT&side=BUY"));
        assert!(signed.contains("recvWindow=5000"));
        assert!(signed.contains("timestamp="));
        assert!(signed.contains("&signature="));

        // Signature should be 64-char hex (SHA256)
        let sig = signed.split("&signature=").nth(1).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signing_empty_query_has_no_leading_separator() {
        let client = BinanceRestClient::new("https://testnet.binance.vision/", "k", "s", 5000);
        let signed = client.sign("").unwrap();
        assert!(signed.starts_with("recvWindow=5000&timestamp="));
        assert_eq!(client.base_url, "https://testnet.binance.vision");
    }

    #[test]
    fn hmac_known_vector() {
        // Binance docs example: queryString with known secret should produce known signature
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(query.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn quantity_formatting_trims_zeros() {
        assert_eq!(format_quantity(0.0015), "0.0015");
        assert_eq!(format_quantity(2.0), "2");
        assert_eq!(format_quantity(0.0), "0");
        assert_eq!(format_quantity(0.123456789), "0.12345679");
    }
}
