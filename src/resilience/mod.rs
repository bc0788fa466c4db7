//! # Resilience Module
//!
//! Bounded retry with exponential backoff for the outbound calls a task
//! processor makes (score fetch, score publish).

pub mod retry;

pub use retry::RetryPolicy;
