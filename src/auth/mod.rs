//! Credential acquisition against a target
//!
//! # Module Layout
//!
//! - [`token`]   -- [`TokenBundle`] and decoding of token endpoint responses
//! - [`grant`]   -- the three grant procedures and the [`Grant`] dispatch
//! - [`catcher`] -- local redirect listener for the authorization-code grant
//! - [`service`] -- endpoint path sets per tenant addressing mode

pub mod catcher;
pub mod grant;
pub mod service;
pub mod token;

pub use catcher::{CatcherSlot, RedirectCatcher};
pub use grant::Grant;
pub use service::{token_service, EndpointPaths, TokenService};
pub use token::TokenBundle;
