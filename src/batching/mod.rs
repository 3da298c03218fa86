//! Bounded, throttled batch execution of remote calls.

pub mod executor;

pub use executor::{BatchConfig, BatchExecutor, BatchOutcome};
