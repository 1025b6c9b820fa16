/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `target`  - show, select, create and list targets
- `login`   - acquire tokens for the current target, or forget them
- `api`     - authenticated requests against the current target

Every handler takes the loaded configuration plus the path it came from, so
handlers that change state can write it back.
*/

use std::path::Path;

use crate::auth::EndpointPaths;
use crate::config::Settings;
use crate::error::Result;
use crate::session::HttpContext;
use crate::target::Target;

/// Builds the session context for `target`.
///
/// API calls are rooted at the addressing mode's API base, and the stored
/// token (if any) is sent as the `Authorization` header.
pub fn session_for(settings: &Settings, target: &Target) -> Result<HttpContext> {
    let paths = EndpointPaths::for_mode(target.mode);
    let ctx = HttpContext::new(&target.host, paths.api_base, target.insecure)?
        .with_media_prefix(&settings.media_prefix)
        .with_display(settings.output)
        .with_trace(settings.trace);

    Ok(match target.authorization() {
        Some(value) => ctx.authorization(&value),
        None => ctx,
    })
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

// Target selection and listing
pub mod target {
    //! Target selection and listing.

    use super::*;
    use crate::config::Config;
    use crate::target::{next_target_name, resolve};
    use anyhow::Context as _;
    use prettytable::{format, row, Table};
    use reqwest::Method;

    /// Handles `idmctl target [URL [NAME]]`
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration, updated in place
    /// * `config_path` - Where the configuration is saved
    /// * `url` - Target URL or name; `None` shows the current target
    /// * `name` - Optional name for the target
    /// * `force` - Skip the health probe before creating a target
    /// * `insecure` - Disable TLS verification for a new target
    ///
    /// # Errors
    ///
    /// Returns error if the health probe fails or the config cannot be saved
    pub async fn select_target(
        config: &mut Config,
        config_path: &Path,
        url: Option<String>,
        name: Option<String>,
        force: bool,
        insecure: bool,
    ) -> Result<()> {
        let Some(url) = url else {
            return show_current(config);
        };
        let name = name.unwrap_or_default();

        if let Some(existing) = resolve(&url, &name, &config.targets) {
            tracing::debug!(target_name = %existing, "Selected existing target");
            config.current_target = Some(existing.clone());
            config.save(config_path)?;
            println!("Current target is now '{}'", existing);
            return Ok(());
        }

        let target = Target::new(&url, insecure);
        if !force {
            probe_health(config, &target)
                .await
                .with_context(|| {
                    format!(
                        "Server at {} did not answer its health check (use --force to add it anyway)",
                        target.host
                    )
                })?;
        }

        let name = if name.is_empty() {
            next_target_name(&config.targets)
        } else {
            name
        };
        if config.targets.contains_key(&name) {
            tracing::warn!("Replacing stored target '{}'", name);
        }

        tracing::info!(
            target_name = %name,
            host = %target.host,
            mode = target.mode.label(),
            "Adding target"
        );
        println!(
            "Added target '{}' for {} ({})",
            name,
            target.host,
            target.mode.label()
        );
        config.targets.insert(name.clone(), target);
        config.current_target = Some(name);
        config.save(config_path)
    }

    fn show_current(config: &Config) -> Result<()> {
        let (name, target) = config.current()?;
        let summary = serde_json::json!({
            "name": name,
            "host": target.host,
            "mode": target.mode.label(),
            "insecure": target.insecure,
            "logged_in": target.authorization().is_some(),
        });
        print!("{}", ensure_newline(config.settings.output.render(&summary)));
        Ok(())
    }

    async fn probe_health(config: &Config, target: &Target) -> Result<()> {
        let ctx = session_for(&config.settings, target)?.accept("json");
        ctx.request_text(Method::GET, "health", Default::default())
            .await
            .map(|_| ())
    }

    /// Handles `idmctl targets`
    pub fn list_targets(config: &Config) -> Result<()> {
        if config.targets.is_empty() {
            println!("No targets stored. Add one with `idmctl target <URL>`.");
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
        table.add_row(row!["", "Name", "Host", "Mode", "Logged In"]);

        for (name, target) in &config.targets {
            let marker = if config.current_target.as_deref() == Some(name.as_str()) {
                "*"
            } else {
                ""
            };
            let logged_in = if target.authorization().is_some() {
                "Yes"
            } else {
                "No"
            };
            table.add_row(row![marker, name, target.host, target.mode.label(), logged_in]);
        }

        table.printstd();
        Ok(())
    }

}

// Token acquisition for the current target
pub mod login {
    //! Token acquisition for the current target.

    use super::*;
    use crate::auth::{token_service, CatcherSlot, Grant};
    use crate::cli::LoginArgs;
    use crate::config::Config;

    /// Builds the grant `args` describe.
    pub fn grant_from_args(args: &LoginArgs) -> Grant {
        if args.user {
            Grant::SystemUser {
                username: args.id.clone(),
                password: args.secret.clone(),
            }
        } else if args.authcode {
            Grant::AuthorizationCode {
                client_id: args.id.clone(),
                client_secret: args.secret.clone(),
                login_hint: args.login_hint.clone(),
            }
        } else {
            Grant::ClientCredentials {
                client_id: args.id.clone(),
                client_secret: args.secret.clone(),
            }
        }
    }

    /// Handles `idmctl login`
    ///
    /// Acquires a token bundle through the token service for the current
    /// target's addressing mode and stores it on the target.
    ///
    /// # Errors
    ///
    /// Returns error if there is no current target, the grant fails, or the
    /// config cannot be saved
    pub async fn login(config: &mut Config, config_path: &Path, args: &LoginArgs) -> Result<()> {
        let slot = CatcherSlot::new(config.settings.callback_port)
            .with_timeout(config.settings.authorization_timeout());
        login_with(config, config_path, &grant_from_args(args), &slot).await
    }

    /// [`login`] with an explicit grant and redirect catcher.
    pub async fn login_with(
        config: &mut Config,
        config_path: &Path,
        grant: &Grant,
        slot: &CatcherSlot,
    ) -> Result<()> {
        let (name, target) = config.current()?;
        let name = name.to_string();
        let mode = target.mode;

        let mut anonymous = target.clone();
        anonymous.clear_tokens();
        let ctx = session_for(&config.settings, &anonymous)?;

        let bundle = token_service(mode).acquire(&ctx, grant, slot).await?;

        config.current_mut()?.store_tokens(&bundle);
        config.save(config_path)?;

        tracing::info!(target_name = %name, token_type = %bundle.token_type, "Stored new token");
        println!("Logged in to target '{}' ({})", name, grant.kind());
        Ok(())
    }

    /// Handles `idmctl logout`
    pub fn logout(config: &mut Config, config_path: &Path) -> Result<()> {
        config.current_mut()?.clear_tokens();
        config.save(config_path)?;
        println!("Logged out");
        Ok(())
    }

}

// Authenticated API calls
pub mod api {
    //! Authenticated requests against the current target.

    use super::*;
    use crate::config::Config;
    use crate::session::{render_body, RequestBody};
    use reqwest::Method;

    /// Handles `idmctl get`
    ///
    /// Prints the response body rendered in the configured display style.
    pub async fn get(config: &Config, path: &str, accept: &str) -> Result<()> {
        let (_, target) = config.current()?;
        let ctx = session_for(&config.settings, target)?.accept(accept);
        let reply = ctx.send(Method::GET, path, RequestBody::Empty).await?;
        let rendered = render_body(ctx.display(), reply.content_type.as_deref(), &reply.body);
        print!("{}", ensure_newline(rendered));
        Ok(())
    }

    /// Handles `idmctl upload`
    pub async fn upload(
        config: &Config,
        path: &str,
        file: &Path,
        field: &str,
        media_type: &str,
        json: &str,
    ) -> Result<()> {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(crate::error::IdmError::Serialization)?;

        let (_, target) = config.current()?;
        let ctx = session_for(&config.settings, target)?.accept("json");
        let response: serde_json::Value = ctx
            .file_upload_request(Method::POST, path, field, media_type, json, file)
            .await?;
        if !response.is_null() {
            print!("{}", ensure_newline(ctx.display().render(&response)));
        }
        Ok(())
    }
}
