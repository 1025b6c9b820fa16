//! Chainable request configurator and uniform HTTP executor
//!
//! [`HttpContext`] carries the host, API base path and header set used for
//! calls against one target. Header setters consume and return the context,
//! so a grant or command that needs extra headers clones the shared context
//! first and its headers never leak into unrelated calls.
//!
//! Every call goes through [`HttpContext::send`], which classifies the
//! response: only `200`, `201` and `204` are success. Any other status becomes
//! [`IdmError::Status`] carrying the status line and the rendered body.

use std::collections::BTreeMap;
use std::path::Path;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use super::upload::{sniff_content_type, MultipartForm};
use super::{expand_media_type, DisplayStyle, RequestBody, DEFAULT_MEDIA_PREFIX};
use crate::error::{IdmError, Result};

/// Tracing target for request/response dumps.
const HTTP_TRACE_TARGET: &str = "idmctl::http";

/// Request configuration and transport for one target.
///
/// # Examples
///
/// ```
/// use idmctl::session::HttpContext;
///
/// let ctx = HttpContext::new("https://tenant.example.com", "/SAAS/jersey/manager/api/", false)
///     .unwrap()
///     .accept("user")
///     .content_type("json");
///
/// assert_eq!(
///     ctx.header_value("accept"),
///     Some("application/vnd.vmware.horizon.manager.user+json")
/// );
/// assert_eq!(ctx.header_value("content-type"), Some("application/json"));
/// assert_eq!(
///     ctx.url_for("users"),
///     "https://tenant.example.com/SAAS/jersey/manager/api/users"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct HttpContext {
    client: reqwest::Client,
    host: String,
    base_path: String,
    media_prefix: String,
    headers: BTreeMap<String, String>,
    display: DisplayStyle,
    trace: bool,
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct Reply {
    /// One of the success statuses
    pub status: StatusCode,
    /// Response `Content-Type`, when present
    pub content_type: Option<String>,
    /// Raw body
    pub body: Bytes,
}

impl HttpContext {
    /// Creates a context for `host` with API calls rooted at `base_path`.
    ///
    /// When `insecure` is set the transport skips TLS certificate
    /// verification entirely.
    ///
    /// # Errors
    ///
    /// Returns [`IdmError::Transport`] if the HTTP client cannot be built.
    pub fn new(host: &str, base_path: &str, insecure: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(IdmError::Transport)?;

        if insecure {
            tracing::warn!(host, "TLS certificate verification is disabled");
        }

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            base_path: base_path.to_string(),
            media_prefix: DEFAULT_MEDIA_PREFIX.to_string(),
            headers: BTreeMap::new(),
            display: DisplayStyle::default(),
            trace: false,
        })
    }

    /// Replaces the vendor media-type prefix.
    pub fn with_media_prefix(mut self, prefix: &str) -> Self {
        self.media_prefix = prefix.to_string();
        self
    }

    /// Sets the style used to render JSON error bodies.
    pub fn with_display(mut self, display: DisplayStyle) -> Self {
        self.display = display;
        self
    }

    /// Enables or disables request/response tracing.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Sets a header; an empty value removes it.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let key = name.to_ascii_lowercase();
        if value.is_empty() {
            self.headers.remove(&key);
        } else {
            self.headers.insert(key, value.to_string());
        }
        self
    }

    /// Sets `Accept` from a media-type shorthand.
    pub fn accept(self, media_type: &str) -> Self {
        let value = self.media_type(media_type);
        self.header("accept", &value)
    }

    /// Sets `Content-Type` from a media-type shorthand.
    pub fn content_type(self, media_type: &str) -> Self {
        let value = self.media_type(media_type);
        self.header("content-type", &value)
    }

    /// Sets `Authorization` verbatim.
    pub fn authorization(self, value: &str) -> Self {
        self.header("authorization", value)
    }

    /// Current value of a header, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Expands a shorthand with this context's vendor prefix.
    pub fn media_type(&self, short: &str) -> String {
        expand_media_type(short, &self.media_prefix)
    }

    /// Host URL, without trailing slash.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// API base path prefix.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Display style used for rendered bodies.
    pub fn display(&self) -> DisplayStyle {
        self.display
    }

    /// Absolute URL for `path`.
    ///
    /// A path starting with `/` is appended to the host as-is; anything else
    /// is appended to the host plus the API base path.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.host, path)
        } else {
            format!("{}{}{}", self.host, self.base_path, path)
        }
    }

    /// Sends one request and classifies the response status.
    ///
    /// # Errors
    ///
    /// - [`IdmError::Transport`] when no response was received.
    /// - [`IdmError::Status`] for any status other than 200, 201 or 204.
    pub async fn send(&self, method: Method, path: &str, body: RequestBody) -> Result<Reply> {
        let url = self.url_for(path);
        let is_json = matches!(body, RequestBody::Json(_));
        let payload = body.into_bytes()?;

        let mut request = self.client.request(method.clone(), &url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if is_json && self.header_value("content-type").is_none() {
            request = request.header(CONTENT_TYPE, "application/json");
        }
        if let Some(bytes) = &payload {
            request = request.body(bytes.clone());
        }

        if self.trace {
            let headers = self
                .headers
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>();
            trace_exchange(
                &format!("{} {}", method, url),
                &headers,
                payload.as_deref().unwrap_or_default(),
            );
        }
        tracing::debug!(%method, %url, "sending request");

        let response = self
            .client
            .execute(request.build().map_err(IdmError::Transport)?)
            .await
            .map_err(IdmError::Transport)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let response_headers = response
            .headers()
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v.to_str().unwrap_or("<binary>")))
            .collect::<Vec<_>>();
        let body = response.bytes().await.map_err(IdmError::Transport)?;

        if self.trace {
            trace_exchange(&status_line(status), &response_headers, &body);
        }

        if !is_success(status) {
            tracing::debug!(%status, %url, "request failed");
            return Err(IdmError::Status {
                status: status_line(status),
                body: render_body(self.display, content_type.as_deref(), &body),
            }
            .into());
        }

        Ok(Reply {
            status,
            content_type,
            body,
        })
    }

    /// Sends a request and deserializes the JSON response body.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<T>` work for
    /// `204 No Content`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<T> {
        let reply = self.send(method, path, body).await?;
        let bytes: &[u8] = if reply.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &reply.body
        };
        Ok(serde_json::from_slice(bytes).map_err(IdmError::Serialization)?)
    }

    /// Sends a request and returns the response body as text.
    pub async fn request_text(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<String> {
        let reply = self.send(method, path, body).await?;
        Ok(String::from_utf8_lossy(&reply.body).into_owned())
    }

    /// Uploads a file together with a JSON document as `multipart/form-data`.
    ///
    /// The file goes under the field `file` with a content type sniffed from
    /// its first 512 bytes; `json_content` goes under `field_name` tagged with
    /// the expanded `media_type`.
    ///
    /// # Errors
    ///
    /// Returns [`IdmError::FileUpload`] if the file cannot be read, plus any
    /// error [`HttpContext::send`] returns.
    pub async fn file_upload_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        field_name: &str,
        media_type: &str,
        json_content: &str,
        file_path: &Path,
    ) -> Result<T> {
        let file_bytes = tokio::fs::read(file_path).await.map_err(|e| {
            IdmError::FileUpload(format!("cannot read {}: {}", file_path.display(), e))
        })?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let form = MultipartForm::new()
            .part(
                "file",
                Some(&file_name),
                sniff_content_type(&file_bytes),
                &file_bytes,
            )
            .part(
                field_name,
                None,
                &self.media_type(media_type),
                json_content.as_bytes(),
            );
        let multipart_type = form.content_type();

        self.clone()
            .content_type(&multipart_type)
            .request(method, path, RequestBody::Raw(form.finish()))
            .await
    }
}

/// Whether `status` counts as success.
pub fn is_success(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 201 | 204)
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Renders a response body for display.
///
/// JSON bodies (by content type) are re-rendered in `style`; anything else,
/// including JSON that fails to parse, is returned as raw text.
pub fn render_body(style: DisplayStyle, content_type: Option<&str>, body: &[u8]) -> String {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);
    if is_json {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
            return style.render(&value);
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

fn trace_exchange(first_line: &str, headers: &[String], body: &[u8]) {
    tracing::info!(
        target: HTTP_TRACE_TARGET,
        "{}\n{}\n\n{}",
        first_line,
        headers.join("\n"),
        String::from_utf8_lossy(body)
    );
}
