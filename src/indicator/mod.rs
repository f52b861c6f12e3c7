pub mod ema;
pub mod sma;
pub mod stdev;
