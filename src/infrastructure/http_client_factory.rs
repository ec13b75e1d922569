//! HTTP client construction for broker connector traffic.
//!
//! One retrying client is shared across all accounts' connector endpoints.
//! The broker call carries its own 10 s deadline at the call site, so only
//! connection setup is bounded here; retries cover transient transport
//! failures, never broker rejections (those reach the caller as structured
//! errors).

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

/// Transient transport failures retried before a broker call is failed
const MAX_TRANSIENT_RETRIES: u32 = 2;
/// Bound on TCP/TLS setup per connector endpoint
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Idle connections kept warm per connector endpoint; the fan-out reuses
/// one endpoint per account
const POOL_MAX_IDLE_PER_HOST: usize = 5;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Client for MT5 connector calls with the default retry budget
    pub fn broker_client() -> ClientWithMiddleware {
        Self::broker_client_with_retries(MAX_TRANSIENT_RETRIES)
    }

    /// Same client with an explicit retry budget, for callers that need a
    /// tighter or looser transport policy
    pub fn broker_client_with_retries(max_retries: u32) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        let client = Client::builder()
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}
