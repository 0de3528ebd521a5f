//! Cached OAuth2 token for one (app, subject) pair.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;

use super::ids::{AppId, Subject, TokenKey};
use super::token_response::TokenResponse;
use crate::error::{AuthFlowError, FlowResult};

/// One token record per (app, subject).
///
/// `state` and `success_uri` only carry values while an authorization-code
/// exchange is in flight. `expires_in` is a lifetime in seconds counted from
/// `modified`, which the repository stamps on every save.
#[derive(Clone)]
pub struct TokenCache {
    pub connected_app: AppId,
    pub subject: Subject,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scopes: Vec<String>,
    pub state: Option<String>,
    pub success_uri: Option<String>,
    pub modified: DateTime<Utc>,
    pub version: u64,
}

/// External representation of a token. Never carries `state` or bookkeeping.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct TokenJson {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenJson")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl TokenCache {
    /// New, empty row bound to an app and a subject.
    #[must_use]
    pub fn new(connected_app: AppId, subject: Subject) -> Self {
        Self {
            connected_app,
            subject,
            access_token: None,
            refresh_token: None,
            expires_in: None,
            token_type: None,
            scopes: Vec::new(),
            state: None,
            success_uri: None,
            modified: Utc::now(),
            version: 0,
        }
    }

    #[must_use]
    pub fn key(&self) -> TokenKey {
        TokenKey::new(self.connected_app.clone(), self.subject.clone())
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.key().name()
    }

    /// `Authorization: Bearer <access_token>`.
    pub fn get_auth_header(&self) -> FlowResult<HeaderMap> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| AuthFlowError::TokenNotFound(self.name()))?;

        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| AuthFlowError::MalformedToken(self.name()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Store a provider token response.
    ///
    /// Scopes are replaced, not merged, when the response carries any. The
    /// in-flight handshake fields are cleared. Persisting is the caller's job.
    pub fn update_data(&mut self, data: TokenResponse) -> &mut Self {
        self.access_token = Some(data.access_token);
        self.refresh_token = data.refresh_token;
        self.expires_in = data.expires_in;
        self.token_type = data.token_type;

        if let Some(scope) = data.scope {
            let scopes = scope.into_scopes();
            if !scopes.is_empty() {
                self.scopes = scopes;
            }
        }

        self.state = None;
        self.success_uri = None;
        self
    }

    /// Seconds left at `now`; negative once expired. `None` when the provider
    /// gave no lifetime. Deadlines past the representable range saturate.
    #[must_use]
    pub fn get_expires_in_at(&self, now: DateTime<Utc>) -> Option<i64> {
        let lifetime = self.expires_in?;
        let deadline = Duration::try_seconds(lifetime).and_then(|d| self.modified.checked_add_signed(d));

        Some(match deadline {
            Some(deadline) => (deadline - now).num_seconds(),
            None if lifetime < 0 => i64::MIN,
            None => i64::MAX,
        })
    }

    /// Seconds left right now.
    #[must_use]
    pub fn get_expires_in(&self) -> Option<i64> {
        self.get_expires_in_at(Utc::now())
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.get_expires_in_at(now).is_some_and(|left| left < 0)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    #[must_use]
    pub fn get_json_at(&self, now: DateTime<Utc>) -> TokenJson {
        TokenJson {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_in: self.get_expires_in_at(now),
            token_type: self.token_type.clone(),
        }
    }

    #[must_use]
    pub fn get_json(&self) -> TokenJson {
        self.get_json_at(Utc::now())
    }
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("name", &self.name())
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scopes", &self.scopes)
            .field("awaiting_callback", &self.state.is_some())
            .field("modified", &self.modified)
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScopeField;

    fn empty_row() -> TokenCache {
        TokenCache::new(AppId::new("github"), Subject::user("alice"))
    }

    fn response(scope: Option<ScopeField>) -> TokenResponse {
        TokenResponse {
            access_token: "gho_access".into(),
            refresh_token: Some("ghr_refresh".into()),
            expires_in: Some(3600),
            token_type: Some("Bearer".into()),
            scope,
        }
    }

    #[test]
    fn test_update_data_then_get_json_round_trips() {
        let mut token = empty_row();
        token.state = Some("nonce".into());
        token.success_uri = Some("/app/home".into());

        token.update_data(response(None));
        let json = token.get_json();

        assert_eq!(json.access_token.as_deref(), Some("gho_access"));
        assert_eq!(json.refresh_token.as_deref(), Some("ghr_refresh"));
        assert_eq!(json.token_type.as_deref(), Some("Bearer"));
        assert!(token.state.is_none());
        assert!(token.success_uri.is_none());
    }

    #[test]
    fn test_get_json_has_no_internal_fields() {
        let mut token = empty_row();
        token.state = Some("nonce".into());
        let value = serde_json::to_value(token.get_json()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        assert!(value.get("state").is_none());
        assert!(value.get("success_uri").is_none());
    }

    #[test]
    fn test_expiry_is_relative_to_modified() {
        let mut token = empty_row();
        token.update_data(response(None));
        let saved_at = Utc::now();
        token.modified = saved_at;

        let left = token.get_expires_in_at(saved_at).unwrap();
        assert_eq!(left, 3600);
        assert!(!token.is_expired_at(saved_at));

        let later = saved_at + Duration::seconds(3601);
        assert_eq!(token.get_expires_in_at(later), Some(-1));
        assert!(token.is_expired_at(later));
    }

    #[test]
    fn test_expires_in_immediately_after_update() {
        let mut token = empty_row();
        token.update_data(response(None));
        token.modified = Utc::now();
        let left = token.get_expires_in().unwrap();
        assert!((3598..=3600).contains(&left));
    }

    #[test]
    fn test_no_lifetime_never_expires() {
        let mut token = empty_row();
        let mut resp = response(None);
        resp.expires_in = None;
        token.update_data(resp);
        assert!(token.get_expires_in().is_none());
        assert!(!token.is_expired_at(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        let mut token = empty_row();
        token.update_data(response(None));

        token.expires_in = Some(i64::MAX);
        assert_eq!(token.get_expires_in(), Some(i64::MAX));
        assert!(!token.is_expired());
        assert_eq!(token.get_json().expires_in, Some(i64::MAX));

        token.expires_in = Some(i64::MIN);
        assert_eq!(token.get_expires_in(), Some(i64::MIN));
        assert!(token.is_expired());
    }

    #[test]
    fn test_scopes_replaced_not_merged() {
        let mut token = empty_row();
        token.scopes = vec!["old".into()];

        token.update_data(response(Some(ScopeField::Delimited("a b c".into()))));
        let from_string = token.scopes.clone();

        token.update_data(response(Some(ScopeField::List(vec!["a".into(), "b".into(), "c".into()]))));
        assert_eq!(token.scopes, from_string);
        assert_eq!(token.scopes, ["a", "b", "c"]);
    }

    #[test]
    fn test_absent_scope_keeps_previous_scopes() {
        let mut token = empty_row();
        token.scopes = vec!["repo".into()];
        token.update_data(response(None));
        assert_eq!(token.scopes, ["repo"]);
    }

    #[test]
    fn test_auth_header() {
        let token = empty_row();
        assert!(matches!(token.get_auth_header(), Err(AuthFlowError::TokenNotFound(_))));

        let mut token = empty_row();
        token.update_data(response(None));
        let headers = token.get_auth_header().unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer gho_access");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[test]
    fn test_debug_hides_tokens() {
        let mut token = empty_row();
        token.update_data(response(None));
        let debug = format!("{token:?}");
        assert!(!debug.contains("gho_access"));
        assert!(!debug.contains("ghr_refresh"));
        assert!(!format!("{:?}", token.get_json()).contains("gho_access"));
    }
}
