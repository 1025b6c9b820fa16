//! Normalized grant results

use serde::{Deserialize, Serialize};

use crate::error::{IdmError, Result};

/// Token type synthesized for system-user session tokens.
pub const SESSION_TOKEN_TYPE: &str = "HZN";

/// The normalized result of any grant.
///
/// # Examples
///
/// ```
/// use idmctl::auth::TokenBundle;
///
/// let bundle = TokenBundle {
///     token_type: "Bearer".to_string(),
///     access_token: "abc".to_string(),
///     refresh_token: None,
///     id_token: None,
///     scope: None,
///     expires_in: None,
/// };
/// assert_eq!(bundle.authorization(), "Bearer abc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    /// Token type, e.g. `Bearer` or `HZN`
    pub token_type: String,
    /// Access token
    pub access_token: String,
    /// Refresh token, when issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// OpenID Connect id token, when issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Granted scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenBundle {
    /// `Authorization` header value for this token.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Raw JSON response from an OAuth2 token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Body of a successful system-user login.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "sessionToken")]
    session_token: String,
}

/// Decodes a standard OAuth2 token response.
///
/// # Errors
///
/// Returns [`IdmError::InvalidResponse`] if the body is not JSON, lacks
/// `access_token` or `token_type`, or carries an empty access token.
pub fn parse_token_response(body: &str) -> Result<TokenBundle> {
    let raw: TokenResponse = serde_json::from_str(body)
        .map_err(|e| IdmError::InvalidResponse(format!("token response: {}", e)))?;

    if raw.access_token.is_empty() || raw.token_type.is_empty() {
        return Err(
            IdmError::InvalidResponse("token response has an empty token".to_string()).into(),
        );
    }

    Ok(TokenBundle {
        token_type: raw.token_type,
        access_token: raw.access_token,
        refresh_token: raw.refresh_token.filter(|t| !t.is_empty()),
        id_token: raw.id_token.filter(|t| !t.is_empty()),
        scope: raw.scope,
        expires_in: raw.expires_in,
    })
}

/// Decodes a system-user login response into a session token bundle.
///
/// # Errors
///
/// Returns [`IdmError::InvalidResponse`] if `sessionToken` is missing or
/// empty.
pub fn parse_login_response(body: &str) -> Result<TokenBundle> {
    let raw: LoginResponse = serde_json::from_str(body)
        .map_err(|e| IdmError::InvalidResponse(format!("login response: {}", e)))?;

    if raw.session_token.is_empty() {
        return Err(IdmError::InvalidResponse(
            "login response has an empty session token".to_string(),
        )
        .into());
    }

    Ok(TokenBundle {
        token_type: SESSION_TOKEN_TYPE.to_string(),
        access_token: raw.session_token,
        refresh_token: None,
        id_token: None,
        scope: None,
        expires_in: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_invalid_response(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<IdmError>(),
            Some(IdmError::InvalidResponse(_))
        )
    }

    #[test]
    fn test_parse_full_token_response() {
        let body = r#"{
            "token_type": "Bearer",
            "access_token": "A",
            "refresh_token": "R",
            "id_token": "I",
            "scope": "admin user",
            "expires_in": 3600
        }"#;
        let bundle = parse_token_response(body).unwrap();
        assert_eq!(bundle.token_type, "Bearer");
        assert_eq!(bundle.access_token, "A");
        assert_eq!(bundle.refresh_token.as_deref(), Some("R"));
        assert_eq!(bundle.id_token.as_deref(), Some("I"));
        assert_eq!(bundle.scope.as_deref(), Some("admin user"));
        assert_eq!(bundle.expires_in, Some(3600));
    }

    #[test]
    fn test_parse_minimal_token_response() {
        let bundle = parse_token_response(r#"{"token_type":"Bearer","access_token":"T"}"#).unwrap();
        assert_eq!(bundle.access_token, "T");
        assert!(bundle.refresh_token.is_none());
        assert!(bundle.expires_in.is_none());
    }

    #[test]
    fn test_parse_token_response_missing_access_token() {
        let err = parse_token_response(r#"{"token_type":"Bearer"}"#).unwrap_err();
        assert!(is_invalid_response(&err), "{err}");
    }

    #[test]
    fn test_parse_token_response_not_json() {
        let err = parse_token_response("<html>oops</html>").unwrap_err();
        assert!(is_invalid_response(&err), "{err}");
    }

    #[test]
    fn test_parse_login_response() {
        let bundle = parse_login_response(r#"{"sessionToken":"S","admin":true}"#).unwrap();
        assert_eq!(bundle.token_type, "HZN");
        assert_eq!(bundle.access_token, "S");
        assert_eq!(bundle.authorization(), "HZN S");
    }

    #[test]
    fn test_parse_login_response_empty_token() {
        let err = parse_login_response(r#"{"sessionToken":""}"#).unwrap_err();
        assert!(is_invalid_response(&err), "{err}");
    }
}
