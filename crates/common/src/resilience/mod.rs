//! Resilience patterns for transient failures
//!
//! Generic over the operation's error type: callers bring a [`RetryPolicy`]
//! that knows which of their errors are transient. The upload pipeline in
//! `medool-infra` is the main consumer.

pub mod retry;

pub use retry::{
    policies, BackoffStrategy, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryOutcome, RetryPolicy, RetryResult,
};
