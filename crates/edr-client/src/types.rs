//! Wire types and credentials for the rules API.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque pagination cursor.
///
/// Sent empty to request the first page; received empty when no pages remain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    /// Token requesting the first page.
    #[must_use]
    pub fn first() -> Self {
        Self::default()
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bearer token returned by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value, for the `Authorization` header.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Username and password for the password grant.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One rule as listed by the provider.
///
/// Only `xmlDefinition` is interpreted; every other field is kept verbatim
/// so that a rule that fails to parse can be logged in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRuleEntry {
    /// The rule as an XML document.
    pub xml_definition: String,
    /// Identifier and other provider metadata.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl RawRuleEntry {
    pub fn new(xml_definition: impl Into<String>) -> Self {
        Self {
            xml_definition: xml_definition.into(),
            metadata: Map::new(),
        }
    }

    /// The provider's identifier for this rule, if it sent one.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.metadata.get("id")
    }
}

/// A page of the rules listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesPage {
    /// Cursor for the following page; empty on the last page.
    pub next_page_token: PageToken,
    pub rules: Vec<RawRuleEntry>,
}

impl RulesPage {
    /// Returns true if the provider reported no further pages.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_empty()
    }
}

/// Token endpoint response. Other fields are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secrets_are_redacted() {
        let token = AccessToken::new("eyJhbGciOi");
        assert!(!format!("{token:?}").contains("eyJ"));

        let credentials = Credentials::new("analyst", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("analyst"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_page_deserialization_keeps_metadata() {
        let page: RulesPage = serde_json::from_value(json!({
            "nextPageToken": "abc",
            "rules": [
                {"id": "r-1", "xmlDefinition": "<rule/>", "version": 3}
            ]
        }))
        .unwrap();

        assert!(!page.is_last());
        assert_eq!(page.next_page_token.as_str(), "abc");
        let rule = &page.rules[0];
        assert_eq!(rule.xml_definition, "<rule/>");
        assert_eq!(rule.id(), Some(&json!("r-1")));
        assert_eq!(rule.metadata.get("version"), Some(&json!(3)));
    }

    #[test]
    fn test_last_page() {
        let page: RulesPage =
            serde_json::from_value(json!({"nextPageToken": "", "rules": []})).unwrap();
        assert!(page.is_last());
    }

    #[test]
    fn test_malformed_pages_are_rejected() {
        for body in [
            json!({"rules": []}),
            json!({"nextPageToken": ""}),
            json!({"nextPageToken": "", "rules": [{"id": "no-xml"}]}),
        ] {
            assert!(serde_json::from_value::<RulesPage>(body).is_err());
        }
    }

    #[test]
    fn test_token_response_requires_access_token() {
        let ok: TokenResponse =
            serde_json::from_value(json!({"access_token": "t", "expires_in": 3600})).unwrap();
        assert_eq!(ok.access_token, "t");
        assert!(serde_json::from_value::<TokenResponse>(json!({"token_type": "bearer"})).is_err());
    }
}
