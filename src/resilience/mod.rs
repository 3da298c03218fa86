//! Resilience primitives for remote calls: bounded retry and request throttling.

pub mod retry;
pub mod throttle;

pub use retry::RetryPolicy;
pub use throttle::Throttle;
