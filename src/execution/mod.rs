// Order execution module
pub mod executor;

pub use executor::{ExecutionOutcome, Executor};
