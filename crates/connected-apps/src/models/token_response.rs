//! Token endpoint response as sent by providers.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// `scope` is a space-delimited string per RFC 6749, but some providers send a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeField {
    Delimited(String),
    List(Vec<String>),
}

impl ScopeField {
    /// Ordered, de-duplicated scope names.
    #[must_use]
    pub fn into_scopes(self) -> Vec<String> {
        match self {
            Self::Delimited(s) => normalize_scopes(s.split_whitespace().map(str::to_owned)),
            Self::List(list) => normalize_scopes(list),
        }
    }
}

/// Keep first occurrences in order, drop blanks and duplicates.
pub fn normalize_scopes<I>(scopes: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for scope in scopes {
        let scope = scope.trim();
        if !scope.is_empty() && !out.iter().any(|s| s == scope) {
            out.push(scope.to_owned());
        }
    }
    out
}

/// Successful token endpoint response.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<ScopeField>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Accept `3600` as well as `"3600"`; some providers quote it.
///
/// Lifetimes that do not fit a `chrono::TimeDelta` are rejected.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let seconds = match Option::<Raw>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Raw::Int(n)) => n,
        Some(Raw::Float(n)) => {
            #[allow(clippy::cast_precision_loss)]
            let in_range = n.is_finite() && n.abs() < MAX_EXPIRES_IN as f64;
            if !in_range {
                return Err(serde::de::Error::custom(format!("expires_in out of range: {n}")));
            }
            #[allow(clippy::cast_possible_truncation)]
            let n = n as i64;
            n
        }
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expires_in is not a number: {s:?}")))?,
    };

    if !(-MAX_EXPIRES_IN..=MAX_EXPIRES_IN).contains(&seconds) {
        return Err(serde::de::Error::custom(format!("expires_in out of range: {seconds}")));
    }
    Ok(Some(seconds))
}

/// Largest accepted lifetime, in seconds (`TimeDelta::seconds` bound).
pub const MAX_EXPIRES_IN: i64 = i64::MAX / 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_string_and_list_are_equivalent() {
        let from_string = ScopeField::Delimited("a b c".into()).into_scopes();
        let from_list = ScopeField::List(vec!["a".into(), "b".into(), "c".into()]).into_scopes();
        assert_eq!(from_string, from_list);
        assert_eq!(from_string, ["a", "b", "c"]);
    }

    #[test]
    fn test_scope_string_tolerates_extra_whitespace() {
        let scopes = ScopeField::Delimited("  read  write read ".into()).into_scopes();
        assert_eq!(scopes, ["read", "write"]);
    }

    #[test]
    fn test_parse_provider_response() {
        let json = r#"{
            "access_token": "ya29.a0",
            "refresh_token": "1//0g",
            "expires_in": 3599,
            "token_type": "Bearer",
            "scope": ["https://www.googleapis.com/auth/drive", "openid"]
        }"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.expires_in, Some(3599));
        assert_eq!(resp.scope.unwrap().into_scopes().len(), 2);
    }

    #[test]
    fn test_quoted_expires_in() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token": "t", "expires_in": "7200"}"#).unwrap();
        assert_eq!(resp.expires_in, Some(7200));
        assert!(resp.refresh_token.is_none());
    }

    #[test]
    fn test_out_of_range_expires_in_is_rejected() {
        for body in [
            r#"{"access_token": "t", "expires_in": 100000000000000000}"#,
            r#"{"access_token": "t", "expires_in": -9223372036854775808}"#,
            r#"{"access_token": "t", "expires_in": 1e30}"#,
            r#"{"access_token": "t", "expires_in": "100000000000000000"}"#,
        ] {
            assert!(serde_json::from_str::<TokenResponse>(body).is_err(), "{body}");
        }

        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token": "t", "expires_in": 3600.0}"#).unwrap();
        assert_eq!(resp.expires_in, Some(3600));
    }

    #[test]
    fn test_missing_access_token_is_an_error() {
        assert!(serde_json::from_str::<TokenResponse>(r#"{"token_type": "Bearer"}"#).is_err());
    }

    #[test]
    fn test_debug_hides_tokens() {
        let resp = TokenResponse {
            access_token: "very-secret-access".into(),
            refresh_token: Some("very-secret-refresh".into()),
            ..Default::default()
        };
        let debug = format!("{resp:?}");
        assert!(!debug.contains("very-secret"));
    }
}
