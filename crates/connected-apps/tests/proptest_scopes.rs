//! Property-based tests for callback slugs and scope parsing.

use proptest::prelude::*;

use connected_apps::models::{ScopeField, TokenCache, TokenResponse, AppId, Subject, derive_callback_slug};

proptest! {
    /// Slugs only contain lowercase ASCII alphanumerics and single inner underscores.
    #[test]
    fn slug_charset(name in "\\PC{0,40}") {
        let slug = derive_callback_slug(&name);
        prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        prop_assert!(!slug.starts_with('_'));
        prop_assert!(!slug.ends_with('_'));
        prop_assert!(!slug.contains("__"));
    }

    /// Deriving a slug from a slug changes nothing.
    #[test]
    fn slug_is_idempotent(name in "\\PC{0,40}") {
        let slug = derive_callback_slug(&name);
        prop_assert_eq!(derive_callback_slug(&slug), slug);
    }

    /// A space-delimited scope string and the equivalent list store the same scopes.
    #[test]
    fn string_and_list_scopes_agree(scopes in proptest::collection::vec("[a-z:./]{1,12}", 0..8)) {
        let store = |field: ScopeField| {
            let mut token = TokenCache::new(AppId::new("app"), Subject::user("u"));
            token.update_data(TokenResponse {
                access_token: "t".into(),
                scope: Some(field),
                ..Default::default()
            });
            token.scopes
        };

        let from_string = store(ScopeField::Delimited(scopes.join(" ")));
        let from_list = store(ScopeField::List(scopes.clone()));
        prop_assert_eq!(&from_string, &from_list);

        let mut deduped = scopes;
        let mut seen = std::collections::HashSet::new();
        deduped.retain(|s| seen.insert(s.clone()));
        prop_assert_eq!(from_list, deduped);
    }
}
