//! HTTP client module
//!
//! Provides the HTTP client with retry, rate limiting, and backoff strategies.
//!
//! # Features
//!
//! - **Fixed Backoff Retries**: non-200 answers are retried after a fixed delay
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Authentication**: the two DEAR auth headers on every request

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, RequestConfig, RetryMode};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
