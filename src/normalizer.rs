//! Turns raw provider payloads into [`WhoisRecord`]s.
//!
//! Provider error codes are checked first, anywhere in the payload text. Only a
//! payload free of known codes is parsed, from JSON (`{"WhoisRecord": {...}}`)
//! or XML (`<WhoisRecord>...</WhoisRecord>`), into the schema of the requested
//! record type. Fields outside that schema are ignored and missing optional
//! fields stay absent.

use crate::{
    error_codes,
    errors::GatewayError,
    models::{ContactInfo, DomainInfo, ErrorInfo, RequestType, WhoisRecord},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::{events::Event, Reader};
use regex::Regex;
use serde::{
    de::{self, DeserializeOwned, MapAccess, Visitor},
    Deserialize, Deserializer,
};
use std::fmt;
use tracing::debug;

const ENVELOPE: &str = "WhoisRecord";

const HOSTNAMES_MAX_LEN: usize = 25;
const HOSTNAMES_KEPT_LEN: usize = 23;
const HOSTNAMES_ELLIPSIS: &str = "...";
const HOSTNAMES_SEPARATOR: &str = ",";

// Zero offsets and a trailing "UTC" all mean the same thing as "Z"
static UTC_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[+-]00:?00|\s*UTC)$").expect("UTC suffix pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Xml,
}

impl PayloadFormat {
    pub fn detect(payload: &str) -> Self {
        if payload.trim_start().starts_with('<') {
            PayloadFormat::Xml
        } else {
            PayloadFormat::Json
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DomainInfoSchema {
    #[serde(rename = "domainName")]
    domain_name: Option<String>,
    #[serde(rename = "registrarName")]
    registrar_name: Option<String>,
    #[serde(rename = "createdDate")]
    created_date: Option<String>,
    #[serde(rename = "expiresDate")]
    expires_date: Option<String>,
    #[serde(rename = "estimatedDomainAge")]
    estimated_domain_age: LenientInt,
    #[serde(rename = "nameServers")]
    name_servers: Option<NameServersSchema>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameServersSchema {
    #[serde(rename = "rawText")]
    raw_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContactInfoSchema {
    #[serde(rename = "registrant")]
    registrant: Option<OrganizationSchema>,
    #[serde(rename = "technicalContact")]
    technical_contact: Option<OrganizationSchema>,
    #[serde(rename = "administrativeContact")]
    administrative_contact: Option<OrganizationSchema>,
    #[serde(rename = "contactEmail")]
    contact_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrganizationSchema {
    #[serde(rename = "organization")]
    organization: Option<String>,
}

/// Integer field that reads as absent when empty, blank or not a number.
///
/// XML carries every value as text and an empty element (`<estimatedDomainAge/>`)
/// arrives as an empty map or string; JSON may send a number, a numeric string
/// or `null`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LenientInt(Option<i64>);

impl<'de> Deserialize<'de> for LenientInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientIntVisitor)
    }
}

struct LenientIntVisitor;

impl<'de> Visitor<'de> for LenientIntVisitor {
    type Value = LenientInt;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer, a numeric string or nothing")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<LenientInt, E> {
        Ok(LenientInt(None))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<LenientInt, E> {
        Ok(LenientInt(Some(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<LenientInt, E> {
        Ok(LenientInt(i64::try_from(v).ok()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<LenientInt, E> {
        Ok(LenientInt(v.is_finite().then(|| v.trunc() as i64)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<LenientInt, E> {
        Ok(LenientInt(v.trim().parse().ok()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<LenientInt, E> {
        Ok(LenientInt(None))
    }

    fn visit_none<E: de::Error>(self) -> Result<LenientInt, E> {
        Ok(LenientInt(None))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<LenientInt, D::Error> {
        LenientInt::deserialize(deserializer)
    }

    // An XML element reaches here as a map whose text sits under `$text`
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<LenientInt, A::Error> {
        let mut value = LenientInt(None);
        while let Some((_, entry)) = map.next_entry::<de::IgnoredAny, LenientInt>()? {
            if entry.0.is_some() {
                value = entry;
            }
        }
        Ok(value)
    }
}

impl OrganizationSchema {
    fn name(contact: Option<Self>) -> Option<String> {
        contact.and_then(|c| non_empty(c.organization))
    }
}

impl From<DomainInfoSchema> for DomainInfo {
    fn from(schema: DomainInfoSchema) -> Self {
        DomainInfo {
            domain_name: non_empty(schema.domain_name).unwrap_or_default(),
            registrar: non_empty(schema.registrar_name),
            registration_date: schema.created_date.as_deref().and_then(parse_timestamp),
            expiration_date: schema.expires_date.as_deref().and_then(parse_timestamp),
            estimated_age_in_days: schema.estimated_domain_age.0,
            hostnames: schema
                .name_servers
                .and_then(|ns| ns.raw_text)
                .as_deref()
                .and_then(flatten_hostnames),
        }
    }
}

impl From<ContactInfoSchema> for ContactInfo {
    fn from(schema: ContactInfoSchema) -> Self {
        ContactInfo {
            registrant_name: OrganizationSchema::name(schema.registrant),
            technical_contact_name: OrganizationSchema::name(schema.technical_contact),
            administrative_contact_name: OrganizationSchema::name(schema.administrative_contact),
            contact_email: non_empty(schema.contact_email),
        }
    }
}

/// Classify `payload` and map it into the record for `request_type`.
///
/// A payload carrying a known provider error code yields
/// [`WhoisRecord::ErrorInfo`] whatever type was requested; its domain name is
/// left for the caller to fill in.
pub fn normalize(payload: &str, request_type: RequestType) -> Result<WhoisRecord, GatewayError> {
    if let Some(found) = error_codes::find_error(payload) {
        debug!("Provider error code {} found in payload", found.code);
        return Ok(WhoisRecord::ErrorInfo(ErrorInfo::new(found.message)));
    }

    if payload.trim().is_empty() {
        return Err(GatewayError::parsing("Whois API response is empty.", payload));
    }

    let format = PayloadFormat::detect(payload);
    let record = match request_type {
        RequestType::DomainInfo => {
            WhoisRecord::DomainInfo(parse_envelope::<DomainInfoSchema>(payload, format)?.into())
        }
        RequestType::ContactInfo => {
            WhoisRecord::ContactInfo(parse_envelope::<ContactInfoSchema>(payload, format)?.into())
        }
    };

    Ok(record)
}

fn parse_envelope<T: DeserializeOwned>(payload: &str, format: PayloadFormat) -> Result<T, GatewayError> {
    match format {
        PayloadFormat::Json => parse_json_envelope(payload),
        PayloadFormat::Xml => parse_xml_envelope(payload),
    }
}

fn parse_json_envelope<T: DeserializeOwned>(payload: &str) -> Result<T, GatewayError> {
    let mut root: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
        GatewayError::parsing(format!("Malformed JSON response: {}", e), payload)
    })?;

    let envelope = root
        .get_mut(ENVELOPE)
        .filter(|value| value.is_object())
        .map(serde_json::Value::take)
        .ok_or_else(|| {
            GatewayError::parsing(format!("Missing '{}' field.", ENVELOPE), payload)
        })?;

    serde_json::from_value(envelope).map_err(|e| {
        GatewayError::parsing(
            format!("Failed to deserialize '{}' into the expected format: {}", ENVELOPE, e),
            payload,
        )
    })
}

fn parse_xml_envelope<T: DeserializeOwned>(payload: &str) -> Result<T, GatewayError> {
    match xml_root_name(payload)? {
        Some(name) if name == ENVELOPE => {}
        Some(name) => {
            return Err(GatewayError::parsing(
                format!("Expected '{}' root element, found '{}'.", ENVELOPE, name),
                payload,
            ))
        }
        None => {
            return Err(GatewayError::parsing(
                format!("Missing '{}' root element.", ENVELOPE),
                payload,
            ))
        }
    }

    quick_xml::de::from_str(payload).map_err(|e| {
        GatewayError::parsing(format!("Malformed XML response: {}", e), payload)
    })
}

fn xml_root_name(payload: &str) -> Result<Option<String>, GatewayError> {
    let mut reader = Reader::from_str(payload);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                return Ok(Some(name));
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => continue,
            Err(e) => {
                return Err(GatewayError::parsing(
                    format!("Malformed XML response: {}", e),
                    payload,
                ))
            }
        }
    }
}

/// Flatten the provider's multi-line name server block into one line,
/// truncating long results to 23 characters plus an ellipsis.
///
/// Every line break becomes a separator, a trailing one included.
pub fn flatten_hostnames(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let flattened = raw
        .replace("\r\n", HOSTNAMES_SEPARATOR)
        .replace('\n', HOSTNAMES_SEPARATOR);

    if flattened.chars().count() > HOSTNAMES_MAX_LEN {
        let kept: String = flattened.chars().take(HOSTNAMES_KEPT_LEN).collect();
        Some(format!("{}{}", kept, HOSTNAMES_ELLIPSIS))
    } else {
        Some(flattened)
    }
}

/// Rewrite a zero UTC offset (`+0000`, `+00:00`, `-00:00`, ` UTC`) as `Z`.
pub fn normalize_utc_suffix(value: &str) -> String {
    UTC_SUFFIX.replace(value.trim(), "Z").into_owned()
}

/// Parse a provider timestamp into UTC. Non-zero offsets are converted.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = normalize_utc_suffix(value);
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
        return Some(dt.with_timezone(&Utc));
    }

    let offset_formats = [
        "%Y-%m-%dT%H:%M:%S%z",     // 2025-05-18T13:36:06+0200
        "%Y-%m-%dT%H:%M:%S%.f%z",  // 2025-05-18T13:36:06.5+0200
        "%Y-%m-%d %H:%M:%S%z",     // 2025-05-18 13:36:06+0200
    ];
    for format in &offset_formats {
        if let Ok(dt) = DateTime::parse_from_str(&value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = value.strip_suffix('Z').unwrap_or(&value).trim();
    let naive_formats = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    for format in &naive_formats {
        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc));
    }

    debug!("Failed to parse timestamp: {}", value);
    None
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const JSON_DOMAIN: &str = r#"{
        "WhoisRecord": {
            "domainName": "example.com",
            "registrarName": "Example Registrar, Inc.",
            "createdDate": "1995-08-14T04:00:00+00:00",
            "expiresDate": "2030-08-13T04:00:00Z",
            "estimatedDomainAge": 10978,
            "nameServers": {
                "rawText": "A.IANA-SERVERS.NET\nB.IANA-SERVERS.NET\n",
                "hostNames": ["A.IANA-SERVERS.NET", "B.IANA-SERVERS.NET"]
            },
            "registrant": { "organization": "Internet Assigned Numbers Authority", "country": "US" },
            "audit": { "createdDate": "2024-01-01 00:00:00 UTC" }
        }
    }"#;

    const XML_CONTACT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<WhoisRecord>
  <domainName>example.org</domainName>
  <registrant>
    <organization>Example Holdings</organization>
    <state>CA</state>
  </registrant>
  <technicalContact>
    <organization>Example Tech Ops</organization>
  </technicalContact>
  <administrativeContact>
    <organization>Example Admin Desk</organization>
  </administrativeContact>
  <contactEmail>hostmaster@example.org</contactEmail>
  <createdDate>2001-02-03T04:05:06+00:00</createdDate>
</WhoisRecord>"#;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(PayloadFormat::detect("  <WhoisRecord/>"), PayloadFormat::Xml);
        assert_eq!(PayloadFormat::detect("{\"WhoisRecord\":{}}"), PayloadFormat::Json);
    }

    #[test]
    fn test_json_domain_info() {
        let record = normalize(JSON_DOMAIN, RequestType::DomainInfo).unwrap();
        let WhoisRecord::DomainInfo(info) = record else {
            panic!("expected domain info");
        };

        assert_eq!(info.domain_name, "example.com");
        assert_eq!(info.registrar.as_deref(), Some("Example Registrar, Inc."));
        assert_eq!(info.registration_date, Some(utc(1995, 8, 14, 4, 0, 0)));
        assert_eq!(info.expiration_date, Some(utc(2030, 8, 13, 4, 0, 0)));
        assert_eq!(info.estimated_age_in_days, Some(10978));
        assert_eq!(info.hostnames.as_deref(), Some("A.IANA-SERVERS.NET,B.IA..."));
    }

    #[test]
    fn test_json_contact_info_ignores_domain_fields() {
        let record = normalize(JSON_DOMAIN, RequestType::ContactInfo).unwrap();
        assert_eq!(
            record,
            WhoisRecord::ContactInfo(ContactInfo {
                registrant_name: Some("Internet Assigned Numbers Authority".into()),
                technical_contact_name: None,
                administrative_contact_name: None,
                contact_email: None,
            })
        );
    }

    #[test]
    fn test_xml_contact_info() {
        let record = normalize(XML_CONTACT, RequestType::ContactInfo).unwrap();
        assert_eq!(
            record,
            WhoisRecord::ContactInfo(ContactInfo {
                registrant_name: Some("Example Holdings".into()),
                technical_contact_name: Some("Example Tech Ops".into()),
                administrative_contact_name: Some("Example Admin Desk".into()),
                contact_email: Some("hostmaster@example.org".into()),
            })
        );
    }

    #[test]
    fn test_xml_domain_info() {
        let xml = r#"<WhoisRecord>
  <domainName>example.net</domainName>
  <registrarName>Registrar Co</registrarName>
  <createdDate>2001-02-03T04:05:06+0000</createdDate>
  <expiresDate>2031-02-03T06:05:06+02:00</expiresDate>
  <estimatedDomainAge>8000</estimatedDomainAge>
  <nameServers>
    <rawText>ns1.example.net
ns2.example.net</rawText>
    <hostNames><Address>ns1.example.net</Address></hostNames>
  </nameServers>
</WhoisRecord>"#;

        let WhoisRecord::DomainInfo(info) = normalize(xml, RequestType::DomainInfo).unwrap() else {
            panic!("expected domain info");
        };
        assert_eq!(info.domain_name, "example.net");
        assert_eq!(info.registrar.as_deref(), Some("Registrar Co"));
        assert_eq!(info.registration_date, Some(utc(2001, 2, 3, 4, 5, 6)));
        assert_eq!(info.expiration_date, Some(utc(2031, 2, 3, 4, 5, 6)));
        assert_eq!(info.estimated_age_in_days, Some(8000));
        assert_eq!(info.hostnames.as_deref(), Some("ns1.example.net,ns2.exa..."));
    }

    #[test]
    fn test_missing_optional_fields_stay_absent() {
        let record = normalize(r#"{"WhoisRecord":{"domainName":"bare.io"}}"#, RequestType::DomainInfo)
            .unwrap();
        assert_eq!(
            record,
            WhoisRecord::DomainInfo(DomainInfo {
                domain_name: "bare.io".into(),
                registrar: None,
                registration_date: None,
                expiration_date: None,
                estimated_age_in_days: None,
                hostnames: None,
            })
        );
    }

    #[test]
    fn test_error_code_beats_success_envelope() {
        let payload = r#"{"WhoisRecord":{"domainName":"example.com"},"ErrorMessage":{"errorCode":"WHOIS_03"}}"#;
        for request_type in [RequestType::DomainInfo, RequestType::ContactInfo] {
            let record = normalize(payload, request_type).unwrap();
            assert_eq!(
                record,
                WhoisRecord::ErrorInfo(ErrorInfo {
                    domain_name: String::new(),
                    message: "Unable to retrieve whois record for the specified domain name."
                        .into(),
                    is_domain_not_found: true,
                })
            );
        }
    }

    #[test]
    fn test_xml_error_payload() {
        let xml = "<ErrorMessage><errorCode>API_KEY_05</errorCode><msg>denied</msg></ErrorMessage>";
        let record = normalize(xml, RequestType::DomainInfo).unwrap();
        assert!(matches!(
            record,
            WhoisRecord::ErrorInfo(ref info) if info.message == "API key authentication failed."
        ));
    }

    #[test]
    fn test_parse_failures_keep_raw_payload() {
        let cases = [
            "{not json",
            r#"{"SomethingElse":{}}"#,
            r#"{"WhoisRecord":"flat string"}"#,
            "<Other><domainName>x</domainName></Other>",
            "<WhoisRecord><domainName>x</registrarName></WhoisRecord>",
            "   ",
        ];

        for payload in cases {
            match normalize(payload, RequestType::DomainInfo) {
                Err(GatewayError::Parsing { raw_payload, .. }) => assert_eq!(raw_payload, payload),
                other => panic!("expected parsing error for {:?}, got {:?}", payload, other),
            }
        }
    }

    #[test]
    fn test_hostnames_truncation_boundaries() {
        let thirty = "abcdefghijklmnopqrstuvwxyz0123";
        assert_eq!(thirty.len(), 30);
        assert_eq!(
            flatten_hostnames(thirty).as_deref(),
            Some("abcdefghijklmnopqrstuvw...")
        );
        assert_eq!(flatten_hostnames(thirty).unwrap().chars().count(), 26);

        let twenty = "ns1.ab.io\nns2.b.io\nc";
        assert_eq!(twenty.len(), 20);
        assert_eq!(flatten_hostnames(twenty).as_deref(), Some("ns1.ab.io,ns2.b.io,c"));

        let exactly = "ns1.example.com,ns2.examp";
        assert_eq!(exactly.len(), 25);
        assert_eq!(flatten_hostnames(exactly).as_deref(), Some(exactly));

        assert_eq!(flatten_hostnames(" \n \n"), None);
    }

    #[test]
    fn test_hostnames_trailing_newline_counts_toward_length() {
        let block = "ns1.example.com\nns2.ex.io\n";
        assert_eq!(block.len(), 26);
        assert_eq!(flatten_hostnames(block).as_deref(), Some("ns1.example.com,ns2.ex...."));

        assert_eq!(
            flatten_hostnames("ns1.a.io\r\nns2.b.io\r\n").as_deref(),
            Some("ns1.a.io,ns2.b.io,")
        );
    }

    #[test]
    fn test_xml_empty_optional_elements_stay_absent() {
        let xml = "<WhoisRecord><domainName>a.io</domainName><estimatedDomainAge/>\
                   <registrarName/><createdDate></createdDate><nameServers/></WhoisRecord>";

        let record = normalize(xml, RequestType::DomainInfo).unwrap();
        assert_eq!(
            record,
            WhoisRecord::DomainInfo(DomainInfo {
                domain_name: "a.io".into(),
                registrar: None,
                registration_date: None,
                expiration_date: None,
                estimated_age_in_days: None,
                hostnames: None,
            })
        );
    }

    #[test]
    fn test_json_blank_optional_fields_stay_absent() {
        let payloads = [
            r#"{"WhoisRecord":{"domainName":"a.io","estimatedDomainAge":null,"registrarName":"","createdDate":" ","nameServers":{}}}"#,
            r#"{"WhoisRecord":{"domainName":"a.io","estimatedDomainAge":"","nameServers":{"rawText":""}}}"#,
        ];

        for payload in payloads {
            let WhoisRecord::DomainInfo(info) = normalize(payload, RequestType::DomainInfo).unwrap() else {
                panic!("expected domain info for {}", payload);
            };
            assert_eq!(info.domain_name, "a.io");
            assert_eq!(info.registrar, None);
            assert_eq!(info.registration_date, None);
            assert_eq!(info.estimated_age_in_days, None);
            assert_eq!(info.hostnames, None);
        }
    }

    #[test]
    fn test_numeric_text_age_is_read() {
        let json = r#"{"WhoisRecord":{"estimatedDomainAge":"42"}}"#;
        let WhoisRecord::DomainInfo(info) = normalize(json, RequestType::DomainInfo).unwrap() else {
            panic!("expected domain info");
        };
        assert_eq!(info.estimated_age_in_days, Some(42));
    }

    #[test]
    fn test_timestamp_normalization() {
        assert_eq!(normalize_utc_suffix("2020-01-01T00:00:00+0000"), "2020-01-01T00:00:00Z");
        assert_eq!(normalize_utc_suffix("2020-01-01T00:00:00-00:00"), "2020-01-01T00:00:00Z");
        assert_eq!(normalize_utc_suffix("2020-01-01 00:00:00 UTC"), "2020-01-01 00:00:00Z");
        assert_eq!(normalize_utc_suffix("2020-01-01T00:00:00+05:30"), "2020-01-01T00:00:00+05:30");

        let expected = utc(2020, 1, 1, 0, 0, 0);
        assert_eq!(parse_timestamp("2020-01-01T00:00:00+0000"), Some(expected));
        assert_eq!(parse_timestamp("2020-01-01 00:00:00 UTC"), Some(expected));
        assert_eq!(parse_timestamp("2020-01-01"), Some(expected));
        assert_eq!(parse_timestamp("2020-01-01T05:30:00+05:30"), Some(expected));
        assert_eq!(parse_timestamp("2020-01-01T02:00:00+0200"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
