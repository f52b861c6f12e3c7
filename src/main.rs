use std::collections::HashMap;

use anyhow::{Context, Result};

use rotation_quant::binance::rest::BinanceRestClient;
use rotation_quant::binance::types::TradeFilters;
use rotation_quant::config::{Config, TradeMode};
use rotation_quant::engine::RotationEngine;
use rotation_quant::execution::{
    base_asset, plan_rebalance, portfolio_equity, RebalanceDecision, SkipReason,
};
use rotation_quant::model::plan::Plan;
use rotation_quant::state::JsonStateStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set RQ_CONFIG_PATH or create config/default.toml");
            std::process::exit(1);
        }
    };
    rotation_quant::logging::init(&config.logging);

    let universe = config.trading.universe();
    tracing::info!(
        mode = ?config.trading.mode,
        rest_url = %config.binance.rest_base_url,
        symbols = ?universe,
        "Starting rotation-quant cycle"
    );

    let client = BinanceRestClient::new(
        &config.binance.rest_base_url,
        &config.binance.api_key,
        &config.binance.api_secret,
        config.binance.recv_window,
    );
    let prices = client
        .get_price_table(
            &universe,
            &config.binance.kline_interval,
            config.trading.lookback,
        )
        .await
        .context("failed to build price table")?;
    tracing::info!(rows = prices.len(), "Price table ready");

    let now = chrono::Utc::now().timestamp();
    let mut store = JsonStateStore::open(&config.state.path)?;
    store.ensure_equity_seed(now, config.trading.initial_equity);

    let engine = RotationEngine::from_config(&config);
    let plan = engine.run_with_store(&mut store, &prices, now)?;

    match config.trading.mode {
        TradeMode::Paper => {
            let equity = store.record_paper_equity(
                &prices,
                &plan.weights,
                now,
                config.trading.initial_equity,
            );
            tracing::info!(equity, "PAPER mode: no orders will be placed");
        }
        TradeMode::Live => rebalance_live(&client, &config, &plan, &mut store).await?,
    }

    store.save()
}

struct AccountSnapshot {
    quote_balance: f64,
    holdings: HashMap<String, f64>,
    prices: HashMap<String, f64>,
}

impl AccountSnapshot {
    fn equity(&self) -> f64 {
        portfolio_equity(self.quote_balance, &self.holdings, &self.prices)
    }
}

async fn snapshot(client: &BinanceRestClient, config: &Config) -> Result<AccountSnapshot> {
    let base = &config.trading.base_ccy;
    let balances = client.get_balances().await?;
    let quote_balance = balances.get(base).map(|b| b.total()).unwrap_or(0.0);

    let mut holdings = HashMap::new();
    let mut prices = HashMap::new();
    for symbol in config.trading.universe() {
        let held = balances
            .get(base_asset(&symbol, base))
            .map(|b| b.total())
            .unwrap_or(0.0);
        holdings.insert(symbol.clone(), held);
        match client.get_price(&symbol).await {
            Ok(Some(px)) => {
                prices.insert(symbol, px);
            }
            Ok(None) => tracing::warn!(symbol = %symbol, "No ticker price"),
            Err(e) => tracing::warn!(symbol = %symbol, error = %e, "Ticker fetch failed"),
        }
    }
    Ok(AccountSnapshot {
        quote_balance,
        holdings,
        prices,
    })
}

async fn rebalance_live(
    client: &BinanceRestClient,
    config: &Config,
    plan: &Plan,
    store: &mut JsonStateStore,
) -> Result<()> {
    let pre = snapshot(client, config).await?;
    let equity = pre.equity();
    store.record_equity(chrono::Utc::now().timestamp(), equity);
    tracing::info!(equity, base = %config.trading.base_ccy, "Pre-trade equity");

    let filters: HashMap<String, TradeFilters> = client
        .get_exchange_symbols(&config.trading.universe())
        .await
        .context("failed to load exchange filters")?
        .into_iter()
        .map(|(sym, info)| (sym, info.trade_filters()))
        .collect();

    let decisions = plan_rebalance(
        &plan.weights,
        equity,
        &pre.prices,
        &pre.holdings,
        &filters,
        config.trading.min_notional,
    );
    for decision in decisions {
        match decision {
            RebalanceDecision::Skip { symbol, reason } => {
                tracing::info!(symbol = %symbol, reason = reason.as_str(), "Skip");
            }
            RebalanceDecision::Order(intent) => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                let client_order_id = format!("rq-{}", &id[..12]);
                match client
                    .place_market_order(&intent.symbol, intent.side, intent.qty, &client_order_id)
                    .await
                {
                    Ok(resp) => tracing::info!(
                        symbol = %intent.symbol,
                        side = %intent.side,
                        executed_qty = resp.executed_qty,
                        avg_price = ?resp.avg_fill_price(),
                        "Order filled"
                    ),
                    Err(e) => tracing::warn!(
                        symbol = %intent.symbol,
                        side = %intent.side,
                        qty = intent.qty,
                        reason = SkipReason::OrderRejected.as_str(),
                        error = %e,
                        "Order rejected"
                    ),
                }
            }
        }
    }

    let post = snapshot(client, config).await?;
    let equity = post.equity();
    store.record_equity(chrono::Utc::now().timestamp(), equity);
    tracing::info!(equity, "Post-trade equity");
    Ok(())
}
