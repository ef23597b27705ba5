//! The on-disk OAuth credential record.
//!
//! The credentials file is written by the Gemini CLI as pretty-printed JSON
//! with exactly these five fields. The record round-trips unchanged through
//! serde; a refresh replaces `access_token` and `expiry_date` together and
//! leaves everything else alone.

use serde::{Deserialize, Serialize};

use super::OAuthError;

/// OAuth credential record as persisted on disk.
///
/// Invariants: `refresh_token` never changes after initial load;
/// `access_token` and `expiry_date` are only ever replaced together by
/// [`Credential::merge_refreshed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for API requests.
    pub access_token: String,
    /// Long-lived token used for the refresh grant.
    pub refresh_token: String,
    /// Access token expiry, epoch milliseconds.
    pub expiry_date: i64,
    /// Granted OAuth scopes.
    pub scope: String,
    /// Token type, typically "Bearer".
    pub token_type: String,
}

/// Ephemeral result of a refresh call, merged into a [`Credential`]
/// before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    /// The new bearer token.
    pub access_token: String,
    /// New expiry, epoch milliseconds.
    pub expiry_date: i64,
}

impl Credential {
    /// Whether the access token is still valid at `now_millis`.
    #[must_use]
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        self.expiry_date > now_millis
    }

    /// Whether the access token is still valid right now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp_millis())
    }

    /// Validate expiry against `now_millis`, returning the credential
    /// unchanged on success.
    pub fn validate_at(&self, now_millis: i64) -> Result<&Self, OAuthError> {
        if self.is_valid_at(now_millis) {
            Ok(self)
        } else {
            Err(OAuthError::TokenExpired {
                expiry: self.expiry_date,
            })
        }
    }

    /// Merge a refresh result into this credential.
    ///
    /// Replaces `access_token` and `expiry_date`; preserves `refresh_token`,
    /// `scope` and `token_type`.
    #[must_use]
    pub fn merge_refreshed(&self, refreshed: RefreshedToken) -> Credential {
        Credential {
            access_token: refreshed.access_token,
            expiry_date: refreshed.expiry_date,
            refresh_token: self.refresh_token.clone(),
            scope: self.scope.clone(),
            token_type: self.token_type.clone(),
        }
    }
}

/// Parse the content of a credentials file.
///
/// Distinguishes structurally broken JSON (`"Invalid JSON format"`) from
/// well-formed JSON that lacks one of the five required fields or carries a
/// wrong type (`"Missing required fields"`).
pub fn parse_credentials(content: &str) -> Result<Credential, OAuthError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|_| OAuthError::invalid("Invalid JSON format"))?;

    serde_json::from_value(value).map_err(|_| OAuthError::invalid("Missing required fields"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credential {
        Credential {
            access_token: "ya29.access".into(),
            refresh_token: "1//refresh".into(),
            expiry_date: 1700000000000,
            scope: "https://www.googleapis.com/auth/cloud-platform".into(),
            token_type: "Bearer".into(),
        }
    }

    #[test]
    fn test_validity_around_expiry() {
        let creds = sample();
        assert!(creds.is_valid_at(1699999999999));
        assert!(!creds.is_valid_at(1700000000000));
        assert!(!creds.is_valid_at(1700000000001));
    }

    #[test]
    fn test_validate_at_success_returns_unchanged() {
        let creds = sample();
        let validated = creds.validate_at(0).unwrap();
        assert_eq!(validated, &creds);
    }

    #[test]
    fn test_validate_at_expired_carries_expiry() {
        let creds = sample();
        let err = creds.validate_at(creds.expiry_date).unwrap_err();
        match err {
            OAuthError::TokenExpired { expiry } => assert_eq!(expiry, 1700000000000),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_round_trip_is_idempotent() {
        let creds = sample();
        let json = serde_json::to_string_pretty(&creds).unwrap();
        let parsed = parse_credentials(&json).unwrap();
        assert_eq!(parsed, creds);

        let json2 = serde_json::to_string_pretty(&parsed).unwrap();
        assert_eq!(parse_credentials(&json2).unwrap(), creds);
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_credentials("{not json").unwrap_err();
        match err {
            OAuthError::InvalidCredentials { reason } => {
                assert_eq!(reason, "Invalid JSON format");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_fields() {
        let err = parse_credentials(r#"{"access_token": "a"}"#).unwrap_err();
        match err {
            OAuthError::InvalidCredentials { reason } => {
                assert_eq!(reason, "Missing required fields");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_wrong_type_is_missing_fields() {
        // expiry_date as a string is as unusable as an absent field.
        let json = r#"{
            "access_token": "a",
            "refresh_token": "r",
            "expiry_date": "soon",
            "scope": "s",
            "token_type": "Bearer"
        }"#;
        let err = parse_credentials(json).unwrap_err();
        match err {
            OAuthError::InvalidCredentials { reason } => {
                assert_eq!(reason, "Missing required fields");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_merge_refreshed_preserves_identity_fields() {
        let creds = sample();
        let merged = creds.merge_refreshed(RefreshedToken {
            access_token: "ya29.new".into(),
            expiry_date: 1800000000000,
        });

        assert_eq!(merged.access_token, "ya29.new");
        assert_eq!(merged.expiry_date, 1800000000000);
        assert_eq!(merged.refresh_token, creds.refresh_token);
        assert_eq!(merged.scope, creds.scope);
        assert_eq!(merged.token_type, creds.token_type);
    }
}
