use crate::errors::GatewayError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Category of information requested for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    DomainInfo,
    ContactInfo,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::DomainInfo => "DomainInfo",
            RequestType::ContactInfo => "ContactInfo",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            t if t.eq_ignore_ascii_case("DomainInfo") => Ok(RequestType::DomainInfo),
            t if t.eq_ignore_ascii_case("ContactInfo") => Ok(RequestType::ContactInfo),
            _ => Err(GatewayError::UnsupportedRequestType(
                "Invalid request type. Supported types are: DomainInfo, ContactInfo.".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisRequest {
    pub domain_name: String,
    #[serde(rename = "type")]
    pub request_type: RequestType,
}

impl WhoisRequest {
    pub fn new(domain_name: impl Into<String>, request_type: RequestType) -> Self {
        Self {
            domain_name: domain_name.into(),
            request_type,
        }
    }

    pub fn domain_info(domain_name: impl Into<String>) -> Self {
        Self::new(domain_name, RequestType::DomainInfo)
    }

    pub fn contact_info(domain_name: impl Into<String>) -> Self {
        Self::new(domain_name, RequestType::ContactInfo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainInfo {
    pub domain_name: String,
    pub registrar: Option<String>,
    pub registration_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub estimated_age_in_days: Option<i64>,
    pub hostnames: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub registrant_name: Option<String>,
    pub technical_contact_name: Option<String>,
    pub administrative_contact_name: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub domain_name: String,
    pub message: String,
    #[serde(default = "default_domain_not_found")]
    pub is_domain_not_found: bool,
}

fn default_domain_not_found() -> bool {
    true
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            domain_name: String::new(),
            message: message.into(),
            is_domain_not_found: true,
        }
    }
}

/// Result of a lookup. The `type` tag survives serialization so cached
/// values come back as the same variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WhoisRecord {
    DomainInfo(DomainInfo),
    ContactInfo(ContactInfo),
    ErrorInfo(ErrorInfo),
}

impl WhoisRecord {
    /// Whether this record is an acceptable answer for `request_type`.
    /// Error records answer any type.
    pub fn answers(&self, request_type: RequestType) -> bool {
        match self {
            WhoisRecord::DomainInfo(_) => request_type == RequestType::DomainInfo,
            WhoisRecord::ContactInfo(_) => request_type == RequestType::ContactInfo,
            WhoisRecord::ErrorInfo(_) => true,
        }
    }

    /// Attach the queried domain: always for errors, for domain info only when
    /// the payload did not carry one.
    pub fn stamp_domain(&mut self, domain: &str) {
        match self {
            WhoisRecord::ErrorInfo(info) => info.domain_name = domain.to_string(),
            WhoisRecord::DomainInfo(info) if info.domain_name.trim().is_empty() => {
                info.domain_name = domain.to_string()
            }
            _ => {}
        }
    }
}
