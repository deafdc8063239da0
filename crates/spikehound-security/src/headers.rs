//! Case-insensitive header lookup

use std::collections::HashMap;

/// Inbound request headers as delivered by the transport
pub type Headers = HashMap<String, String>;

/// Find a header value
///
/// An exact key match with a non-empty value wins; otherwise keys are
/// compared case-insensitively. Empty values count as absent.
#[must_use]
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    if let Some(value) = headers.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        return Some(value);
    }

    let lowered = name.to_ascii_lowercase();
    headers
        .iter()
        .filter(|(key, _)| key.to_ascii_lowercase() == lowered)
        .map(|(_, value)| value.trim())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_then_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("x-slack-signature".into(), "v0=abc".into());
        assert_eq!(header_value(&headers, "X-Slack-Signature"), Some("v0=abc"));

        headers.insert("X-Slack-Signature".into(), "v0=exact".into());
        assert_eq!(header_value(&headers, "X-Slack-Signature"), Some("v0=exact"));
    }

    #[test]
    fn empty_values_are_absent() {
        let mut headers = Headers::new();
        headers.insert("X-Signature-Timestamp".into(), "   ".into());
        assert_eq!(header_value(&headers, "X-Signature-Timestamp"), None);
    }
}
