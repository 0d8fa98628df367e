// Core modules
pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod oracle;
pub mod runner;

// Re-export commonly used types
pub use error::BotError;
pub use models::*;
pub use runner::{CycleOutcome, TradingLoop};

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
