//! # Whois Gateway Library
//!
//! Domain lookups against a metered whois data provider, with the provider's
//! responses normalized into a small set of typed records and cached so that
//! repeated lookups of the same domain and type stay off the upstream.
//!
//! ## Features
//!
//! - Upstream client with exponential backoff on rate limiting
//! - Provider error codes detected in JSON and XML payloads
//! - Domain and contact records parsed from either format
//! - Cache-aside layer with a fixed ten minute lifetime per entry
//! - Stable error codes with caller-safe messages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whois_gateway::{Config, WhoisGateway, WhoisRecord, WhoisRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let gateway = WhoisGateway::new(&config)?;
//!
//!     match gateway.lookup(&WhoisRequest::domain_info("example.com")).await? {
//!         WhoisRecord::DomainInfo(info) => println!("Registrar: {:?}", info.registrar),
//!         WhoisRecord::ErrorInfo(error) => println!("Not found: {}", error.message),
//!         other => println!("{:?}", other),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error_codes;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod upstream;

// Re-export main types for easy access
pub use cache::{cache_key, CacheService, CacheStore, MokaCacheStore};
pub use config::Config;
pub use errors::{ErrorCode, ErrorResponse, GatewayError};
pub use logging::{LogLevel, LogSink, TracingLogSink};
pub use models::{ContactInfo, DomainInfo, ErrorInfo, RequestType, WhoisRecord, WhoisRequest};
pub use upstream::{UpstreamClient, WhoisApiClient};

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lookup pipeline: validate, check the cache, fetch, normalize, store.
#[derive(Clone)]
pub struct WhoisGateway {
    upstream: Arc<dyn UpstreamClient>,
    cache: Arc<CacheService>,
    log: Arc<dyn LogSink>,
}

impl WhoisGateway {
    /// Wire the HTTP upstream client, an in-memory cache and `tracing` logging.
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let upstream = Arc::new(WhoisApiClient::new(config)?);
        let cache = Arc::new(CacheService::in_memory(config));
        Ok(Self::with_parts(upstream, cache, Arc::new(TracingLogSink)))
    }

    pub fn with_parts(
        upstream: Arc<dyn UpstreamClient>,
        cache: Arc<CacheService>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self { upstream, cache, log }
    }

    /// Look up `request`, serving from the cache when possible.
    ///
    /// Provider-reported errors come back as [`WhoisRecord::ErrorInfo`] and are
    /// cached like any other record. Transport and parsing failures are returned
    /// as errors and never cached.
    pub async fn lookup(&self, request: &WhoisRequest) -> Result<WhoisRecord, GatewayError> {
        let domain = Self::validate(request)?;
        let request_type = request.request_type;
        metrics::increment_lookups(request_type.as_str());

        let key = cache_key(domain, request_type);
        if let Some(record) = self.cached(&key, request_type).await {
            metrics::increment_cache_hits();
            return Ok(record);
        }
        metrics::increment_cache_misses();

        let payload = match self.upstream.fetch(domain).await {
            Ok(payload) => payload,
            Err(e) => {
                metrics::increment_errors(e.kind());
                self.log.log(
                    LogLevel::Error,
                    json!({
                        "message": format!("Error fetching Whois data for {}", domain),
                        "type": request_type.as_str(),
                        "error": e.to_string(),
                    }),
                );
                return Err(e);
            }
        };

        let mut record = match normalizer::normalize(&payload, request_type) {
            Ok(record) => record,
            Err(e) => {
                metrics::increment_errors(e.kind());
                let raw_payload = match &e {
                    GatewayError::Parsing { raw_payload, .. } => raw_payload.as_str(),
                    _ => payload.as_str(),
                };
                self.log.log(
                    LogLevel::Error,
                    json!({
                        "message": format!("Error parsing Whois data for {}", domain),
                        "type": request_type.as_str(),
                        "error": e.to_string(),
                        "rawResponse": raw_payload,
                    }),
                );
                return Err(e);
            }
        };
        record.stamp_domain(domain);

        if let Err(e) = self.cache.set(&key, &record, config::CACHE_TTL).await {
            warn!("Failed to cache result for {}: {}", key, e);
            self.log.log(
                LogLevel::Warning,
                json!({ "message": "Cache write failed", "cacheKey": key, "error": e.to_string() }),
            );
        }

        Ok(record)
    }

    fn validate(request: &WhoisRequest) -> Result<&str, GatewayError> {
        let domain = request.domain_name.trim();
        if domain.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Domain name is required. It cannot be null or empty.".to_string(),
            ));
        }
        Ok(domain)
    }

    async fn cached(&self, key: &str, request_type: RequestType) -> Option<WhoisRecord> {
        let record: WhoisRecord = self.cache.get(key).await?;
        if record.answers(request_type) {
            Some(record)
        } else {
            debug!("Cached record under {} does not answer {}, refetching", key, request_type);
            None
        }
    }
}
