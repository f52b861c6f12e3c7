pub mod binance;
pub mod config;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod execution;
pub mod indicator;
pub mod logging;
pub mod model;
pub mod regime;
pub mod selector;
pub mod state;
pub mod summary;
pub mod weights;
