//! Grant procedures
//!
//! Each grant takes the session context for the target plus its own
//! credentials and returns a fresh [`TokenBundle`]. None of them retries;
//! a failed grant surfaces the transport, status or invalid-response error
//! to the caller.

use base64::Engine as _;
use rand::RngCore as _;
use reqwest::Method;
use url::Url;

use super::catcher::CatcherSlot;
use super::service::TokenService;
use super::token::{parse_login_response, parse_token_response, TokenBundle};
use crate::error::{IdmError, Result};
use crate::session::{HttpContext, RequestBody};

const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// The credentials for one grant.
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    /// OAuth2 client-credentials grant
    ClientCredentials {
        /// OAuth2 client id
        client_id: String,
        /// OAuth2 client secret
        client_secret: String,
    },
    /// Vendor system-user session login
    SystemUser {
        /// Login name
        username: String,
        /// Password
        password: String,
    },
    /// OAuth2 authorization-code grant through the browser
    AuthorizationCode {
        /// OAuth2 client id
        client_id: String,
        /// OAuth2 client secret
        client_secret: String,
        /// Optional user name to pre-fill on the login page
        login_hint: Option<String>,
    },
}

impl Grant {
    /// Short name for logs and messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Grant::ClientCredentials { .. } => "client credentials",
            Grant::SystemUser { .. } => "system user",
            Grant::AuthorizationCode { .. } => "authorization code",
        }
    }
}

impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grant::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Grant::SystemUser { username, .. } => f
                .debug_struct("SystemUser")
                .field("username", username)
                .finish_non_exhaustive(),
            Grant::AuthorizationCode {
                client_id,
                login_hint,
                ..
            } => f
                .debug_struct("AuthorizationCode")
                .field("client_id", client_id)
                .field("login_hint", login_hint)
                .finish_non_exhaustive(),
        }
    }
}

impl TokenService {
    /// Runs whichever grant `grant` describes.
    ///
    /// `catcher` is only touched by the authorization-code grant.
    pub async fn acquire(
        &self,
        ctx: &HttpContext,
        grant: &Grant,
        catcher: &CatcherSlot,
    ) -> Result<TokenBundle> {
        tracing::info!("Requesting {} grant from {}", grant.kind(), ctx.host());
        match grant {
            Grant::ClientCredentials {
                client_id,
                client_secret,
            } => self.client_credentials(ctx, client_id, client_secret).await,
            Grant::SystemUser { username, password } => {
                self.system_user(ctx, username, password).await
            }
            Grant::AuthorizationCode {
                client_id,
                client_secret,
                login_hint,
            } => {
                self.authorization_code(
                    ctx,
                    client_id,
                    client_secret,
                    login_hint.as_deref(),
                    catcher,
                )
                .await
            }
        }
    }

    /// OAuth2 client-credentials grant.
    ///
    /// POSTs `grant_type=client_credentials` to the token endpoint with the
    /// client id and secret as HTTP Basic credentials.
    pub async fn client_credentials(
        &self,
        ctx: &HttpContext,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenBundle> {
        let body = ctx
            .clone()
            .accept("json")
            .content_type(FORM_MEDIA_TYPE)
            .authorization(&basic_auth(client_id, client_secret))
            .request_text(
                Method::POST,
                self.paths.token,
                RequestBody::form([("grant_type", "client_credentials")]),
            )
            .await?;
        parse_token_response(&body)
    }

    /// System-user session login.
    ///
    /// The returned bundle carries the session token with token type `HZN`.
    pub async fn system_user(
        &self,
        ctx: &HttpContext,
        username: &str,
        password: &str,
    ) -> Result<TokenBundle> {
        let payload = RequestBody::json(&serde_json::json!({
            "username": username,
            "password": password,
            "issueToken": true,
        }))?;
        let body = ctx
            .clone()
            .accept("json")
            .content_type("json")
            .authorization("")
            .request_text(Method::POST, self.paths.login, payload)
            .await?;
        parse_login_response(&body)
    }

    /// OAuth2 authorization-code grant.
    ///
    /// 1. Starts the redirect catcher if this scope has not yet.
    /// 2. Registers a fresh random `state` as the pending authorization.
    /// 3. Prints the authorization URL and opens it in the browser.
    /// 4. Waits for the redirect to deliver a code.
    /// 5. Exchanges the code at the token endpoint.
    pub async fn authorization_code(
        &self,
        ctx: &HttpContext,
        client_id: &str,
        client_secret: &str,
        login_hint: Option<&str>,
        slot: &CatcherSlot,
    ) -> Result<TokenBundle> {
        let catcher = slot.catcher().await?;
        let redirect_uri = catcher.redirect_uri();
        let state = generate_state();

        let pending = catcher.begin(&state).await?;
        let auth_url = self.authorization_url(ctx, client_id, &state, &redirect_uri, login_hint)?;

        eprintln!(
            "Open the following URL in your browser to log in:\n{}",
            auth_url
        );
        slot.open(&auth_url);

        let code = pending.wait(slot.timeout()).await?;
        tracing::debug!("authorization code received, exchanging for tokens");

        let body = ctx
            .clone()
            .accept("json")
            .content_type(FORM_MEDIA_TYPE)
            .authorization(&basic_auth(client_id, client_secret))
            .request_text(
                Method::POST,
                self.paths.token,
                RequestBody::form([
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("client_id", client_id),
                ]),
            )
            .await?;
        parse_token_response(&body)
    }

    /// Builds the browser URL for the authorization endpoint.
    pub fn authorization_url(
        &self,
        ctx: &HttpContext,
        client_id: &str,
        state: &str,
        redirect_uri: &str,
        login_hint: Option<&str>,
    ) -> Result<String> {
        let mut url = Url::parse(&ctx.url_for(self.paths.authorize))
            .map_err(|e| IdmError::Config(format!("invalid authorization URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", client_id);
            query.append_pair("state", state);
            query.append_pair("redirect_uri", redirect_uri);
            if let Some(hint) = login_hint.filter(|h| !h.is_empty()) {
                query.append_pair("login_hint", hint);
            }
        }

        Ok(url.to_string())
    }
}

/// `Authorization` value for HTTP Basic credentials.
pub fn basic_auth(user: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
    format!("Basic {}", encoded)
}

/// Random URL-safe state nonce: 16 bytes, base64url without padding.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
