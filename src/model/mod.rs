pub mod candle;
pub mod order;
pub mod plan;
pub mod price_table;
