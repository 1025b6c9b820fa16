//! Command-line interface definition for idmctl
//!
//! This module defines the CLI structure using clap's derive API: target
//! management, login and logout, and authenticated API calls.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::session::DisplayStyle;

/// idmctl - command-line client for a multi-tenant identity manager
///
/// Stores named targets, acquires OAuth2 tokens for them and issues
/// authenticated API requests.
#[derive(Parser, Debug, Clone)]
#[command(name = "idmctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to $IDMCTL_CONFIG or the user config dir)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log every HTTP request and response
    #[arg(short, long)]
    pub trace: bool,

    /// Output style for structured responses (yaml, json)
    #[arg(short, long)]
    pub output: Option<DisplayStyle>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for idmctl
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show, select, or create the current target
    Target {
        /// Target URL or name; omit to show the current target
        url: Option<String>,

        /// Name for the target
        name: Option<String>,

        /// Create the target without probing the server health resource
        #[arg(short, long)]
        force: bool,

        /// Skip TLS certificate verification for this target
        #[arg(long)]
        insecure: bool,
    },

    /// List stored targets
    Targets,

    /// Acquire and store a token for the current target
    Login(LoginArgs),

    /// Forget the stored tokens for the current target
    Logout,

    /// Authenticated GET against the API base path
    Get {
        /// Path relative to the API base, or absolute from the host
        path: String,

        /// Accept media type (shorthand or full)
        #[arg(short, long, default_value = "json")]
        accept: String,
    },

    /// Authenticated multipart POST of a file plus JSON metadata
    Upload {
        /// Path relative to the API base, or absolute from the host
        path: String,

        /// File to upload
        file: PathBuf,

        /// Form field name for the JSON metadata part
        #[arg(long)]
        field: String,

        /// Media type of the JSON metadata part (shorthand or full)
        #[arg(long)]
        media_type: String,

        /// JSON metadata content
        #[arg(long, default_value = "{}")]
        json: String,
    },
}

/// Arguments for `login`
#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Use the browser-based authorization-code grant
    #[arg(long, conflicts_with = "user")]
    pub authcode: bool,

    /// Log in as a system user instead of an OAuth2 client
    #[arg(long)]
    pub user: bool,

    /// Client id, or user name with --user
    pub id: String,

    /// Client secret, or password with --user
    pub secret: String,

    /// User name to pre-fill on the login page (authorization code only)
    #[arg(long, requires = "authcode")]
    pub login_hint: Option<String>,
}
