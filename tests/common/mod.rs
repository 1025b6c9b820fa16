use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use idmctl::auth::CatcherSlot;
use idmctl::session::HttpContext;
use idmctl::target::AddressingMode;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Config YAML with one current target called `dev` pointing at `host`.
#[allow(dead_code)]
pub fn single_target_yaml(host: &str, token: Option<&str>) -> String {
    let mode = AddressingMode::classify(host);
    let mut yaml = format!(
        "current_target: dev\ntargets:\n  dev:\n    host: {}\n    mode: {}\n",
        host,
        mode.label()
    );
    if let Some(token) = token {
        yaml.push_str(&format!(
            "    token_type: Bearer\n    access_token: {}\n",
            token
        ));
    }
    yaml
}

/// Session context rooted at the tenant-in-host API base of a stub server.
#[allow(dead_code)]
pub fn api_context(server_uri: &str) -> HttpContext {
    HttpContext::new(server_uri, "/SAAS/jersey/manager/api/", false)
        .expect("failed to build http context")
}

/// Catcher slot on an ephemeral port whose browser never opens.
#[allow(dead_code)]
pub fn headless_slot() -> CatcherSlot {
    CatcherSlot::new(0).with_browser(std::sync::Arc::new(|_: &str| {}))
}
