use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("malformed price table: {0}")]
    MalformedPrices(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("optimizer error: {0}")]
    Optimizer(String),

    #[error("binance API error (code {code}): {msg}")]
    BinanceApi { code: i64, msg: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("order error: {0}")]
    Order(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
