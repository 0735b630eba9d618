use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::{Duration, Instant}};
use url::Url;

/// Lifetime of every cache entry. Not configurable.
pub const CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Upstream attempts per lookup when rate limited, the first one included.
pub const MAX_ATTEMPTS: u32 = 3;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;
const CONFIG_FILE_NAME: &str = "whois-gateway";

/// Serialization format requested from the upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    #[serde(rename = "JSON")]
    Json,
    #[serde(rename = "XML")]
    Xml,
}

impl OutputFormat {
    pub fn as_query_value(&self) -> &'static str {
        match self {
            OutputFormat::Json => "JSON",
            OutputFormat::Xml => "XML",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query_value())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JSON" => Ok(OutputFormat::Json),
            "XML" => Ok(OutputFormat::Xml),
            other => Err(format!("unsupported output format: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub upstream_base_url: Url,
    pub upstream_api_key: String,
    pub upstream_output_format: Option<OutputFormat>,
    pub upstream_timeout_seconds: u64,
    pub cache_max_entries: u64,
    pub start_time: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub port: u16,
    pub upstream_base_url: String,
    pub upstream_api_key: String,
    #[serde(default)]
    pub upstream_output_format: Option<String>,
    pub upstream_timeout_seconds: u64,
    pub cache_max_entries: u64,
}

impl Config {
    /// Build a configuration with defaults for everything but the upstream endpoint.
    pub fn new(upstream_base_url: Url, upstream_api_key: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            upstream_base_url,
            upstream_api_key: upstream_api_key.into(),
            upstream_output_format: None,
            upstream_timeout_seconds: DEFAULT_UPSTREAM_TIMEOUT_SECONDS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            start_time: Instant::now(),
        }
    }

    pub fn load() -> Result<Self, config::ConfigError> {
        let mut settings = config::Config::builder()
            .set_default("port", DEFAULT_PORT as i64)?
            .set_default("upstream_base_url", "")?
            .set_default("upstream_api_key", "")?
            .set_default("upstream_timeout_seconds", DEFAULT_UPSTREAM_TIMEOUT_SECONDS as i64)?
            .set_default("cache_max_entries", DEFAULT_CACHE_MAX_ENTRIES as i64)?
            .add_source(config::File::with_name(CONFIG_FILE_NAME).required(false));

        // Environment variables win over file and defaults
        settings = Self::apply_env_overrides(settings)?;

        let config_data: ConfigData = settings.build()?.try_deserialize()?;
        Self::from_data(config_data)
    }

    fn from_data(data: ConfigData) -> Result<Self, config::ConfigError> {
        let upstream_base_url = Url::parse(data.upstream_base_url.trim()).map_err(|e| {
            config::ConfigError::Message(format!(
                "upstream_base_url '{}' is not a valid URL: {}",
                data.upstream_base_url, e
            ))
        })?;

        if !matches!(upstream_base_url.scheme(), "http" | "https") {
            return Err(config::ConfigError::Message(format!(
                "upstream_base_url must use http or https, got '{}'",
                upstream_base_url.scheme()
            )));
        }

        if data.upstream_api_key.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "upstream_api_key must not be empty".to_string(),
            ));
        }

        let upstream_output_format = match data.upstream_output_format.as_deref() {
            Some(value) if !value.trim().is_empty() => {
                Some(value.parse::<OutputFormat>().map_err(config::ConfigError::Message)?)
            }
            _ => None,
        };

        Ok(Config {
            port: data.port,
            upstream_base_url,
            upstream_api_key: data.upstream_api_key.trim().to_string(),
            upstream_output_format,
            upstream_timeout_seconds: data.upstream_timeout_seconds,
            cache_max_entries: data.cache_max_entries,
            start_time: Instant::now(),
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }

    fn apply_env_overrides(mut settings: config::ConfigBuilder<config::builder::DefaultState>) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let env_mappings = [
            ("PORT", "port"),
            ("HTTP_PORT", "port"),
            ("WHOIS_API_BASE_URL", "upstream_base_url"),
            ("WHOIS_API_KEY", "upstream_api_key"),
            ("WHOIS_API_OUTPUT_FORMAT", "upstream_output_format"),
            ("WHOIS_API_TIMEOUT_SECONDS", "upstream_timeout_seconds"),
            ("WHOIS_API_TIMEOUT", "upstream_timeout_seconds"),
            ("CACHE_MAX_ENTRIES", "cache_max_entries"),
            ("CACHE_SIZE", "cache_max_entries"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override(config_key, value)?;
            }
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(base_url: &str, api_key: &str) -> ConfigData {
        ConfigData {
            port: 8080,
            upstream_base_url: base_url.to_string(),
            upstream_api_key: api_key.to_string(),
            upstream_output_format: None,
            upstream_timeout_seconds: 5,
            cache_max_entries: 100,
        }
    }

    #[test]
    fn test_valid_config_data() {
        let mut raw = data("https://whois.example.net/api/v1", " secret ");
        raw.upstream_output_format = Some("xml".to_string());

        let config = Config::from_data(raw).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream_api_key, "secret");
        assert_eq!(config.upstream_output_format, Some(OutputFormat::Xml));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(Config::from_data(data("not a url", "secret")).is_err());
        assert!(Config::from_data(data("ftp://whois.example.net", "secret")).is_err());
    }

    #[test]
    fn test_rejects_missing_api_key() {
        assert!(Config::from_data(data("https://whois.example.net", "   ")).is_err());
    }

    #[test]
    fn test_rejects_unknown_output_format() {
        let mut raw = data("https://whois.example.net", "secret");
        raw.upstream_output_format = Some("yaml".to_string());
        assert!(Config::from_data(raw).is_err());
    }

    #[test]
    fn test_fixed_limits() {
        assert_eq!(CACHE_TTL, Duration::from_secs(600));
        assert_eq!(MAX_ATTEMPTS, 3);
    }
}
