use crate::{
    config::{Config, OutputFormat, MAX_ATTEMPTS},
    errors::GatewayError,
    metrics,
};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    StatusCode,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

/// Source of raw whois payloads.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch(&self, domain: &str) -> Result<String, GatewayError>;
}

/// Waits out a backoff delay. Only the calling request is held up.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Delay before retry number `attempt + 1`: 1s, 2s, 4s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(2u64.saturating_pow(attempt).saturating_mul(1000))
}

/// HTTP client for the whois data provider.
///
/// The bearer credential and timeout are fixed when the client is built.
/// Only `429 Too Many Requests` is retried.
pub struct WhoisApiClient {
    http: reqwest::Client,
    endpoint: Url,
    output_format: Option<OutputFormat>,
    max_attempts: u32,
    sleeper: Arc<dyn Sleeper>,
}

impl WhoisApiClient {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.upstream_api_key))
            .map_err(|_| GatewayError::Internal("API key is not a valid header value".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.upstream_timeout())
            .user_agent(concat!("whois-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        info!("Whois upstream client targeting {}", config.upstream_base_url);

        Ok(Self {
            http,
            endpoint: config.upstream_base_url.clone(),
            output_format: config.upstream_output_format,
            max_attempts: MAX_ATTEMPTS,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn request_url(&self, domain: &str) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("domainName", domain);
            if let Some(format) = self.output_format {
                query.append_pair("outputFormat", format.as_query_value());
            }
        }
        url
    }
}

#[async_trait]
impl UpstreamClient for WhoisApiClient {
    async fn fetch(&self, domain: &str) -> Result<String, GatewayError> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Domain name cannot be null or empty.".to_string(),
            ));
        }

        let url = self.request_url(domain);
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1);
                warn!(
                    "Whois upstream rate limited {}, retry {}/{} in {:?}",
                    domain, attempt, self.max_attempts - 1, delay
                );
                metrics::increment_upstream_retries();
                self.sleeper.sleep(delay).await;
            }

            let response = self
                .http
                .get(url.clone())
                .send()
                .await
                .map_err(classify_transport_error)?;

            let status = response.status();
            if status.is_success() {
                debug!("Whois upstream answered {} for {}", status, domain);
                return response.text().await.map_err(classify_transport_error);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                continue;
            }

            warn!("Whois upstream returned {} for {}", status, domain);
            return Err(GatewayError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        Err(GatewayError::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }
}

fn classify_transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::UpstreamTimeout
    } else {
        GatewayError::UpstreamConnectivity(error.to_string())
    }
}
