//! Local redirect catcher for the authorization-code grant
//!
//! A [`RedirectCatcher`] is a small HTTP listener on `127.0.0.1` that the
//! browser is redirected to after the user logs in. It is started at most
//! once per command scope (see [`CatcherSlot`]) and then serves for the rest
//! of the process.
//!
//! Two single-slot channels connect it to the waiting grant:
//!
//! 1. the grant pushes the expected `state` nonce to the handler;
//! 2. the handler pushes the outcome of the redirect back to the grant.
//!
//! Every redirect that arrives while an authorization is pending consumes the
//! pending state and always delivers an outcome, so a malformed or forged
//! redirect fails the grant instead of leaving it blocked. A redirect with
//! nothing pending is answered with `400` and delivers nothing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex, OnceCell, OwnedMutexGuard};

use crate::error::{IdmError, Result};

/// Port the catcher listens on unless configured otherwise.
pub const DEFAULT_CALLBACK_PORT: u16 = 8089;

/// Path the browser is redirected to.
pub const CALLBACK_PATH: &str = "/authcode/callback";

/// Opens an authorization URL for the user.
pub type BrowserLauncher = Arc<dyn Fn(&str) + Send + Sync>;

/// What a redirect request amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// State matched and a code was issued.
    Code(String),
    /// State matched and the server reported an error.
    Denied {
        /// OAuth2 error code
        error: String,
        /// Optional human-readable detail
        description: Option<String>,
    },
    /// The redirect cannot be trusted or understood.
    Invalid(String),
}

/// Query parameters of a redirect request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectParams {
    /// Authorization code
    pub code: Option<String>,
    /// Echoed state nonce
    pub state: Option<String>,
    /// OAuth2 error code
    pub error: Option<String>,
    /// OAuth2 error detail
    pub error_description: Option<String>,
}

/// Classifies a redirect against the state that was sent.
///
/// The state must match exactly, and exactly one of `code` and `error` must
/// be present.
///
/// # Examples
///
/// ```
/// use idmctl::auth::catcher::{validate_redirect, RedirectOutcome, RedirectParams};
///
/// let params = RedirectParams {
///     code: Some("c0de".to_string()),
///     state: Some("nonce".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(
///     validate_redirect("nonce", &params),
///     RedirectOutcome::Code("c0de".to_string())
/// );
/// assert!(matches!(
///     validate_redirect("other", &params),
///     RedirectOutcome::Invalid(_)
/// ));
/// ```
pub fn validate_redirect(expected_state: &str, params: &RedirectParams) -> RedirectOutcome {
    if params.state.as_deref() != Some(expected_state) {
        return RedirectOutcome::Invalid(
            "state does not match the pending authorization".to_string(),
        );
    }

    let code = params.code.as_deref().filter(|c| !c.is_empty());
    let error = params.error.as_deref().filter(|e| !e.is_empty());
    match (code, error) {
        (Some(code), None) => RedirectOutcome::Code(code.to_string()),
        (None, Some(error)) => RedirectOutcome::Denied {
            error: error.to_string(),
            description: params.error_description.clone(),
        },
        (Some(_), Some(_)) => {
            RedirectOutcome::Invalid("redirect carries both a code and an error".to_string())
        }
        (None, None) => {
            RedirectOutcome::Invalid("redirect carries neither a code nor an error".to_string())
        }
    }
}

/// Handler side of the two handoff channels.
#[derive(Debug)]
struct Handoff {
    states: Mutex<mpsc::Receiver<String>>,
    outcomes: mpsc::Sender<(String, RedirectOutcome)>,
}

/// A running redirect listener.
#[derive(Debug)]
pub struct RedirectCatcher {
    addr: SocketAddr,
    states: mpsc::Sender<String>,
    outcomes: Arc<Mutex<mpsc::Receiver<(String, RedirectOutcome)>>>,
    handoff: Arc<Handoff>,
}

impl RedirectCatcher {
    /// Binds `127.0.0.1:<port>` and starts serving in the background.
    ///
    /// Port `0` lets the OS choose. The listener is never shut down.
    ///
    /// # Errors
    ///
    /// Returns [`IdmError::Authorization`] if the port cannot be bound.
    pub async fn start(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(|e| {
            IdmError::Authorization(format!(
                "cannot listen for the login redirect on port {}: {}",
                port, e
            ))
        })?;
        let addr = listener.local_addr()?;

        let (state_tx, state_rx) = mpsc::channel(1);
        let (outcome_tx, outcome_rx) = mpsc::channel(1);
        let handoff = Arc::new(Handoff {
            states: Mutex::new(state_rx),
            outcomes: outcome_tx,
        });

        let app = Router::new()
            .route(CALLBACK_PATH, get(handle_redirect))
            .with_state(Arc::clone(&handoff));

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("redirect catcher stopped: {}", e);
            }
        });
        tracing::debug!(%addr, "redirect catcher listening");

        Ok(Self {
            addr,
            states: state_tx,
            outcomes: Arc::new(Mutex::new(outcome_rx)),
            handoff,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Redirect URI to register with the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.addr.port(), CALLBACK_PATH)
    }

    /// Registers `state` as the one pending authorization.
    ///
    /// # Errors
    ///
    /// Returns [`IdmError::AuthorizationInProgress`] while another
    /// [`PendingAuthorization`] from this catcher is alive.
    pub async fn begin(&self, state: &str) -> Result<PendingAuthorization> {
        let mut outcomes = Arc::clone(&self.outcomes)
            .try_lock_owned()
            .map_err(|_| IdmError::AuthorizationInProgress)?;

        // leftovers from an attempt that gave up early
        while outcomes.try_recv().is_ok() {}
        {
            let mut states = self.handoff.states.lock().await;
            while states.try_recv().is_ok() {}
        }

        self.states
            .try_send(state.to_string())
            .map_err(|_| IdmError::AuthorizationInProgress)?;

        Ok(PendingAuthorization {
            state: state.to_string(),
            outcomes,
            handoff: Arc::clone(&self.handoff),
        })
    }
}

/// One authorization waiting for its redirect.
///
/// Dropping it withdraws the state, so a late redirect is rejected.
#[derive(Debug)]
pub struct PendingAuthorization {
    state: String,
    outcomes: OwnedMutexGuard<mpsc::Receiver<(String, RedirectOutcome)>>,
    handoff: Arc<Handoff>,
}

impl PendingAuthorization {
    /// The state nonce this authorization expects.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Blocks until the redirect arrives, or until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - [`IdmError::Authorization`] if the redirect was denied or invalid.
    /// - [`IdmError::AuthorizationTimeout`] if `timeout` elapsed first.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<String> {
        let received = match timeout {
            None => self.next_outcome().await,
            Some(limit) => tokio::time::timeout(limit, self.next_outcome())
                .await
                .map_err(|_| IdmError::AuthorizationTimeout(limit.as_secs()))?,
        };

        match received {
            Some(RedirectOutcome::Code(code)) => Ok(code),
            Some(RedirectOutcome::Denied { error, description }) => {
                let detail = match description {
                    Some(description) => format!("{}: {}", error, description),
                    None => error,
                };
                Err(IdmError::Authorization(detail).into())
            }
            Some(RedirectOutcome::Invalid(reason)) => Err(IdmError::Authorization(reason).into()),
            None => Err(IdmError::Authorization("redirect catcher stopped".to_string()).into()),
        }
    }

    async fn next_outcome(&mut self) -> Option<RedirectOutcome> {
        loop {
            let (state, outcome) = self.outcomes.recv().await?;
            if state == self.state {
                return Some(outcome);
            }
            tracing::debug!("discarding redirect outcome of an earlier authorization");
        }
    }
}

impl Drop for PendingAuthorization {
    fn drop(&mut self) {
        if let Ok(mut states) = self.handoff.states.try_lock() {
            while states.try_recv().is_ok() {}
        }
    }
}

/// Lazily started catcher plus the settings of the authorization-code grant.
///
/// Owned by the command scope and passed by reference to every
/// authorization-code attempt; the listener starts on first use.
pub struct CatcherSlot {
    port: u16,
    timeout: Option<Duration>,
    browser: BrowserLauncher,
    cell: OnceCell<RedirectCatcher>,
}

impl CatcherSlot {
    /// A slot that will listen on `port` and open the system browser.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            timeout: None,
            browser: Arc::new(open_system_browser),
            cell: OnceCell::new(),
        }
    }

    /// Bounds how long a grant waits for the redirect. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the browser launcher.
    pub fn with_browser(mut self, browser: BrowserLauncher) -> Self {
        self.browser = browser;
        self
    }

    /// Configured redirect wait.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Opens `url` with the configured launcher.
    pub fn open(&self, url: &str) {
        (self.browser)(url)
    }

    /// The catcher, started on first call.
    pub async fn catcher(&self) -> Result<&RedirectCatcher> {
        self.cell
            .get_or_try_init(|| RedirectCatcher::start(self.port))
            .await
    }
}

impl std::fmt::Debug for CatcherSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatcherSlot")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("started", &self.cell.initialized())
            .finish()
    }
}

/// Attempts to open `url` in the user's default browser.
///
/// Failures are ignored; the URL is also printed for manual use.
pub fn open_system_browser(url: &str) {
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open").arg(url).spawn();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("xdg-open").arg(url).spawn();
    }
    #[cfg(target_os = "windows")]
    {
        let _ = std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn();
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = url;
    }
}

async fn handle_redirect(
    State(handoff): State<Arc<Handoff>>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, Html<String>) {
    let expected = handoff.states.lock().await.try_recv().ok();
    let Some(expected) = expected else {
        tracing::warn!("login redirect received with no authorization pending");
        return (
            StatusCode::BAD_REQUEST,
            page(
                "No login in progress",
                "Start the login again from the command line.",
            ),
        );
    };

    let outcome = validate_redirect(&expected, &params);
    let response = match &outcome {
        RedirectOutcome::Code(_) => (
            StatusCode::OK,
            page(
                "Login complete",
                "You may close this window and return to the command line.",
            ),
        ),
        RedirectOutcome::Denied { error, description } => (
            StatusCode::OK,
            page(
                "Login denied",
                &format!("{} {}", error, description.as_deref().unwrap_or_default()),
            ),
        ),
        RedirectOutcome::Invalid(reason) => (
            StatusCode::BAD_REQUEST,
            page("Invalid login response", reason),
        ),
    };

    if handoff.outcomes.try_send((expected, outcome)).is_err() {
        tracing::warn!("no login is waiting for the redirect outcome");
    }
    response
}

fn page(title: &str, message: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head>\
         <body><h2>{title}</h2><p>{message}</p></body></html>\n",
        title = escape_html(title),
        message = escape_html(message.trim())
    ))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> RedirectParams {
        RedirectParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: error.map(str::to_string),
            error_description: None,
        }
    }

    #[test]
    fn test_validate_matching_code() {
        let outcome = validate_redirect("s1", &params(Some("c"), Some("s1"), None));
        assert_eq!(outcome, RedirectOutcome::Code("c".to_string()));
    }

    #[test]
    fn test_validate_state_mismatch() {
        let outcome = validate_redirect("s1", &params(Some("c"), Some("s2"), None));
        assert!(matches!(outcome, RedirectOutcome::Invalid(_)));
    }

    #[test]
    fn test_validate_missing_state() {
        let outcome = validate_redirect("s1", &params(Some("c"), None, None));
        assert!(matches!(outcome, RedirectOutcome::Invalid(_)));
    }

    #[test]
    fn test_validate_both_code_and_error() {
        let outcome =
            validate_redirect("s1", &params(Some("c"), Some("s1"), Some("access_denied")));
        assert!(matches!(outcome, RedirectOutcome::Invalid(_)));
    }

    #[test]
    fn test_validate_neither_code_nor_error() {
        let outcome = validate_redirect("s1", &params(None, Some("s1"), None));
        assert!(matches!(outcome, RedirectOutcome::Invalid(_)));
    }

    #[test]
    fn test_validate_error() {
        let mut p = params(None, Some("s1"), Some("access_denied"));
        p.error_description = Some("user cancelled".to_string());
        assert_eq!(
            validate_redirect("s1", &p),
            RedirectOutcome::Denied {
                error: "access_denied".to_string(),
                description: Some("user cancelled".to_string()),
            }
        );
    }

    #[test]
    fn test_page_escapes_markup() {
        let Html(body) = page("t", "<script>x</script>");
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
    }

    #[tokio::test]
    async fn test_slot_starts_catcher_once() {
        let slot = CatcherSlot::new(0).with_browser(Arc::new(|_: &str| {}));
        let first = slot.catcher().await.unwrap().local_addr();
        let second = slot.catcher().await.unwrap().local_addr();
        assert_eq!(first, second);
        assert!(slot.catcher().await.unwrap().redirect_uri().ends_with(CALLBACK_PATH));
    }

    #[tokio::test]
    async fn test_second_begin_while_pending_is_rejected() {
        let catcher = RedirectCatcher::start(0).await.unwrap();
        let _pending = catcher.begin("first").await.unwrap();
        let err = catcher.begin("second").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IdmError>(),
            Some(IdmError::AuthorizationInProgress)
        ));
    }

    #[tokio::test]
    async fn test_wait_times_out_and_releases() {
        let catcher = RedirectCatcher::start(0).await.unwrap();
        let pending = catcher.begin("s").await.unwrap();
        let err = pending
            .wait(Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IdmError>(),
            Some(IdmError::AuthorizationTimeout(_))
        ));
        assert!(catcher.begin("again").await.is_ok());
    }
}
