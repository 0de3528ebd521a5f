//! Authorization URL construction for the web application flow.

use url::Url;

use crate::error::ClientResult;

/// Generate a random state nonce using two UUIDs (256 bits).
#[must_use]
pub fn generate_state() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

/// Parameters of one authorization request.
#[derive(Debug, Clone)]
pub struct OAuthSession {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthSession {
    #[must_use]
    pub fn build_authorization_session(client_id: &str, redirect_uri: &str, scopes: &[String]) -> Self {
        Self {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scopes: scopes.to_vec(),
        }
    }

    /// Build the provider URL the user is sent to, with a fresh state nonce.
    ///
    /// Returns `(url, state)`. Existing query parameters on the endpoint are
    /// preserved.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a valid URL.
    pub fn authorization_url(&self, authorization_endpoint: &str) -> ClientResult<(String, String)> {
        let state = generate_state();
        let mut url = Url::parse(authorization_endpoint)?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri);
            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scopes.join(" "));
            }
            query.append_pair("state", &state);
        }

        Ok((url.into(), state))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_authorization_url_carries_parameters() {
        let session = OAuthSession::build_authorization_session(
            "client-1",
            "https://erp.example.com/api/method/connected_app.callback/github",
            &["repo".to_string(), "user".to_string()],
        );
        let (url, state) = session
            .authorization_url("https://github.com/login/oauth/authorize?allow_signup=false")
            .unwrap();

        let parsed = Url::parse(&url).unwrap();
        let params: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["scope"], "repo user");
        assert_eq!(params["state"], state);
        assert_eq!(params["allow_signup"], "false");
        assert_eq!(state.len(), 64);
    }

    #[test]
    fn test_states_are_unique() {
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn test_invalid_endpoint() {
        let session = OAuthSession::build_authorization_session("c", "r", &[]);
        assert!(session.authorization_url("not a url").is_err());
    }
}
