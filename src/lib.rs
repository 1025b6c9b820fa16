//! idmctl - command-line client library for a multi-tenant identity manager
//!
//! This library provides the authenticated HTTP session and the OAuth2
//! credential layer behind the `idmctl` binary.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `target`: Stored targets, tenant addressing modes and target resolution
//! - `session`: HTTP session context, status classification and uploads
//! - `auth`: Grant strategies, token service factory and redirect catcher
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers behind each CLI command
//!
//! # Example
//!
//! ```no_run
//! use idmctl::auth::{token_service, CatcherSlot, Grant};
//! use idmctl::session::HttpContext;
//! use idmctl::target::AddressingMode;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = HttpContext::new("https://host/SAAS/t/acme", "/jersey/manager/api/", false)?;
//!     let grant = Grant::ClientCredentials {
//!         client_id: "cli".to_string(),
//!         client_secret: "secret".to_string(),
//!     };
//!     let bundle = token_service(AddressingMode::TenantInPath)
//!         .acquire(&ctx, &grant, &CatcherSlot::new(8089))
//!         .await?;
//!     println!("{}", bundle.authorization());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod session;
pub mod target;

// Re-export commonly used types
pub use config::Config;
pub use error::{IdmError, Result};
pub use session::{HttpContext, Reply};
pub use target::{AddressingMode, Target};

#[cfg(test)]
pub mod test_utils;
