// src/session.rs
use crate::types::{AsmError, Config};
use governor::{Jitter, Quota};
use reqwest::Client;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type SourceLimiter = governor::DefaultDirectRateLimiter;

/// HTTP plumbing shared by certificate-transparency sources.
#[derive(Clone)]
pub struct Session {
    pub client: Client,
    rate_limiters: Arc<HashMap<String, Arc<SourceLimiter>>>,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self, AsmError> {
        let mut client_builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| AsmError::ConfigError(format!("Invalid proxy URL: {}", e)))?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder
            .build()
            .map_err(|e| AsmError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let mut rate_limiters = HashMap::new();
        for (source, rate_limit) in &config.rate_limits {
            if let Some(per_second) = rate_limit.and_then(NonZeroU32::new) {
                let quota = Quota::per_second(per_second).allow_burst(NonZeroU32::MIN);
                rate_limiters.insert(source.clone(), Arc::new(governor::RateLimiter::direct(quota)));
            }
        }

        Ok(Session {
            client,
            rate_limiters: Arc::new(rate_limiters),
        })
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response, AsmError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| AsmError::NetworkError(e.to_string()))
    }

    /// Waits until the named source is allowed another request.
    pub async fn wait_for_rate_limit(&self, source: &str) {
        if let Some(limiter) = self.rate_limiters.get(source) {
            limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;
        }
    }
}
