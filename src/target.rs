//! Targets and tenant addressing
//!
//! A target is one server endpoint the user can select. Multi-tenant servers
//! identify the tenant either in the hostname (`https://tenant.example.com`)
//! or in the path (`https://example.com/SAAS/t/tenant`). The addressing mode
//! is decided once, when the target is created, and selects the endpoint
//! paths used for every later call against it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::token::TokenBundle;

/// Path segment marking per-tenant path routing.
pub const TENANT_PATH_MARKER: &str = "/SAAS/t/";

/// Stored targets keyed by name.
pub type Targets = BTreeMap<String, Target>;

/// How a multi-tenant server identifies the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressingMode {
    /// Tenant is part of the hostname.
    #[default]
    TenantInHost,
    /// Tenant is a path segment after [`TENANT_PATH_MARKER`].
    TenantInPath,
}

impl AddressingMode {
    /// Classifies a target URL by looking for the tenant path marker.
    ///
    /// # Examples
    ///
    /// ```
    /// use idmctl::target::AddressingMode;
    ///
    /// assert_eq!(
    ///     AddressingMode::classify("https://host/SAAS/t/tenant1"),
    ///     AddressingMode::TenantInPath
    /// );
    /// assert_eq!(
    ///     AddressingMode::classify("https://tenant1.host"),
    ///     AddressingMode::TenantInHost
    /// );
    /// ```
    pub fn classify(url: &str) -> Self {
        let path = match url.find("://") {
            Some(idx) => {
                let rest = &url[idx + 3..];
                rest.find('/').map(|p| &rest[p..]).unwrap_or("")
            }
            None => url.find('/').map(|p| &url[p..]).unwrap_or(""),
        };
        // the marker may also close the URL, as in `.../SAAS/t/`
        if format!("{}/", path).contains(TENANT_PATH_MARKER) {
            AddressingMode::TenantInPath
        } else {
            AddressingMode::TenantInHost
        }
    }

    /// Short label used in listings.
    pub fn label(&self) -> &'static str {
        match self {
            AddressingMode::TenantInHost => "tenant-in-host",
            AddressingMode::TenantInPath => "tenant-in-path",
        }
    }
}

/// A free-form value in a target's option bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean flag
    Bool(bool),
    /// Integer setting
    Int(i64),
    /// Anything else
    Str(String),
}

/// One selectable server endpoint and its persisted credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Normalized host URL, including any tenant path.
    pub host: String,

    /// Tenant addressing mode, fixed at creation.
    #[serde(default)]
    pub mode: AddressingMode,

    /// Skip TLS certificate verification for this target.
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,

    /// Token type of the stored access token, e.g. `Bearer` or `HZN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Stored access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Stored refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Stored OpenID Connect id token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Absolute expiry of the access token, when the server reported one.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// Any other per-target settings.
    #[serde(flatten)]
    pub options: BTreeMap<String, OptionValue>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Target {
    /// Creates a target for `url`, normalizing the host and classifying the
    /// addressing mode.
    pub fn new(url: &str, insecure: bool) -> Self {
        let host = normalize_host(url);
        let mode = AddressingMode::classify(&host);
        Self {
            host,
            mode,
            insecure,
            ..Default::default()
        }
    }

    /// Persists the values of a freshly acquired token bundle.
    pub fn store_tokens(&mut self, bundle: &TokenBundle) {
        self.token_type = Some(bundle.token_type.clone());
        self.access_token = Some(bundle.access_token.clone());
        self.refresh_token = bundle.refresh_token.clone();
        self.id_token = bundle.id_token.clone();
        // an expiry beyond chrono's range is kept as unknown
        self.expires_at = bundle
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
    }

    /// Forgets all stored tokens.
    pub fn clear_tokens(&mut self) {
        self.token_type = None;
        self.access_token = None;
        self.refresh_token = None;
        self.id_token = None;
        self.expires_at = None;
    }

    /// `Authorization` header value for the stored token, if any.
    pub fn authorization(&self) -> Option<String> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        let token_type = self.token_type.as_deref().unwrap_or("Bearer");
        Some(format!("{} {}", token_type, token))
    }
}

/// Prefixes `https://` when no scheme is present and drops trailing slashes.
pub fn normalize_host(url: &str) -> String {
    let url = url.trim();
    let with_scheme = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Finds the stored target a user-supplied `(url, name)` pair refers to.
///
/// With an empty `name`, `url` is first tried as a target name. Otherwise the
/// normalized `url` is compared against stored hosts, restricted to the target
/// called `name` when one is given. Scheme and host compare case-insensitively;
/// the path, which carries the tenant in tenant-in-path mode, must match
/// exactly. Returns `None` when nothing matches; the caller decides whether to
/// create a new target.
pub fn resolve(url: &str, name: &str, targets: &Targets) -> Option<String> {
    if name.is_empty() && targets.contains_key(url) {
        return Some(url.to_string());
    }

    let wanted = normalize_host(url);
    targets
        .iter()
        .filter(|(key, _)| name.is_empty() || key.as_str() == name)
        .find(|(_, target)| same_host(&normalize_host(&target.host), &wanted))
        .map(|(key, _)| key.clone())
}

/// Splits a normalized URL into `scheme://authority` and the path after it.
fn split_origin(url: &str) -> (&str, &str) {
    let authority_start = url.find("://").map(|idx| idx + 3).unwrap_or(0);
    match url[authority_start..].find('/') {
        Some(idx) => url.split_at(authority_start + idx),
        None => (url, ""),
    }
}

fn same_host(stored: &str, wanted: &str) -> bool {
    let (stored_origin, stored_path) = split_origin(stored);
    let (wanted_origin, wanted_path) = split_origin(wanted);
    stored_origin.eq_ignore_ascii_case(wanted_origin) && stored_path == wanted_path
}

/// Lowest non-negative integer, as a string, not already used as a name.
pub fn next_target_name(targets: &Targets) -> String {
    (0u64..)
        .map(|i| i.to_string())
        .find(|candidate| !targets.contains_key(candidate))
        .unwrap_or_default()
}
