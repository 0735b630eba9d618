//! Error codes the whois data provider embeds in otherwise successful responses.

/// Known provider error codes with the message reported for each, in match order.
pub static PROVIDER_ERRORS: &[(&str, &str)] = &[
    ("WHOIS_01", "An unspecified error occurred."),
    ("WHOIS_02", "User is not logged in."),
    ("WHOIS_03", "Unable to retrieve whois record for the specified domain name."),
    ("WHOIS_04", "An unspecified error occurred."),
    ("DB_01", "Authentication cannot complete due to a database error."),
    ("DB_02", "Exception occurred in getUser method."),
    ("DB_03", "API key is missing."),
    ("DB_04", "API key is not found."),
    ("DB_05", "Exception occurred in getApiKey() while retrieving entity."),
    ("DB_06", "API key is not found."),
    ("DB_07", "Exception occurred in getApiKey() while retrieving entity."),
    ("AUTHENTICATE_01", "Queries available for the user are limited; please refill."),
    ("AUTHENTICATE_02", "Queries available for the IP are limited; please refill."),
    ("AUTHENTICATE_03", "Username or password is missing."),
    ("AUTHENTICATE_04", "API key parameters are missing."),
    ("AUTHENTICATE_05", "Access restricted due to subscription limitation."),
    ("AUTHENTICATE_06", "You are limited to 30 queries per second. The request is rejected."),
    ("AUTHENTICATE_07", "Request timeout."),
    ("AUTHENTICATE_08", "Timestamp is in the future."),
    ("AUTHENTICATE_09", "Unknown error occurred."),
    ("AUTHENTICATE_10", "User account status issue."),
    ("AUTHENTICATE_11", "Token is missing."),
    ("AUTHENTICATE_12", "Decoding token failed."),
    ("AUTHENTICATE_13", "Token has expired."),
    ("AUTHENTICATE_14", "Captcha authentication failed."),
    ("AUTHENTICATE_15", "Cannot retrieve IP quota."),
    ("AUTHENTICATE_16", "Username is missing."),
    ("AUTHENTICATE_17", "Password is missing."),
    ("AUTHENTICATE_18", "Invalid username or password."),
    ("API_KEY_01", "API key is disabled."),
    ("API_KEY_02", "Timestamp is in the future."),
    ("API_KEY_03", "Request timeout."),
    ("API_KEY_04", "You are not authorized."),
    ("API_KEY_05", "API key authentication failed."),
    ("DNS_01", "Invalid DNS type specified."),
    ("DNS_02", "General DNS error occurred."),
    ("EMAIL_VERIFY_01", "Email verification error occurred."),
    ("HISTORIC_WHOIS_01", "Historic whois error occurred."),
];

/// A provider error code found in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderError {
    pub code: &'static str,
    pub message: &'static str,
}

/// Case-insensitive substring scan of `payload` against the catalog.
///
/// The first code in catalog order wins when several appear. This is a plain
/// text match, so a code that shows up inside unrelated data (a registrant
/// name, say) is reported as an error too.
pub fn find_error(payload: &str) -> Option<ProviderError> {
    if payload.trim().is_empty() {
        return None;
    }

    let haystack = payload.to_ascii_uppercase();
    PROVIDER_ERRORS
        .iter()
        .find(|(code, _)| haystack.contains(code))
        .map(|&(code, message)| ProviderError { code, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_size_and_uniqueness() {
        assert_eq!(PROVIDER_ERRORS.len(), 38);
        for (i, (code, _)) in PROVIDER_ERRORS.iter().enumerate() {
            assert!(
                PROVIDER_ERRORS[i + 1..].iter().all(|(other, _)| other != code),
                "duplicate code {}",
                code
            );
        }
    }

    #[test]
    fn test_finds_code_case_insensitively() {
        let payload = r#"{"ErrorMessage":{"errorCode":"whois_03","msg":"not found"}}"#;
        let found = find_error(payload).unwrap();
        assert_eq!(found.code, "WHOIS_03");
        assert_eq!(
            found.message,
            "Unable to retrieve whois record for the specified domain name."
        );
    }

    #[test]
    fn test_first_code_in_catalog_order_wins() {
        // DB_04 comes before API_KEY_01 in the catalog regardless of payload order
        let payload = "API_KEY_01 ... DB_04";
        assert_eq!(find_error(payload).unwrap().code, "DB_04");
    }

    #[test]
    fn test_incidental_match_is_reported() {
        let payload = r#"{"WhoisRecord":{"registrant":{"organization":"DNS_02 Holdings"}}}"#;
        assert_eq!(find_error(payload).unwrap().code, "DNS_02");
    }

    #[test]
    fn test_clean_payload() {
        assert!(find_error(r#"{"WhoisRecord":{"domainName":"example.com"}}"#).is_none());
        assert!(find_error("   ").is_none());
    }
}
