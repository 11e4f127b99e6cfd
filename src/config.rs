//! Storebot Configuration
//!
//! Loads and saves the configuration from `~/.storebot/storebot.json`,
//! with environment-variable overrides for credentials.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::types::{default_config, StorebotConfig};

/// Config file name within the storebot directory.
const CONFIG_FILENAME: &str = "storebot.json";

/// Returns the storebot config directory: `~/.storebot`.
pub fn get_storebot_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/root"))
        .join(".storebot")
}

/// Returns the full path to the config file: `~/.storebot/storebot.json`.
pub fn get_config_path() -> PathBuf {
    get_storebot_dir().join(CONFIG_FILENAME)
}

/// Load the storebot config.
///
/// Reads `~/.storebot/storebot.json` when present, merges missing
/// fields with defaults, then applies environment overrides for
/// credentials and endpoints. Returns pure defaults (plus env) when no
/// config file exists.
pub fn load_config() -> StorebotConfig {
    let config_path = get_config_path();

    let mut config = fs::read_to_string(&config_path)
        .ok()
        .and_then(|contents| serde_json::from_str::<StorebotConfig>(&contents).ok())
        .unwrap_or_else(default_config);

    merge_defaults(&mut config);
    apply_env_overrides(&mut config);
    config
}

fn merge_defaults(config: &mut StorebotConfig) {
    let defaults = default_config();

    if config.store_name.is_empty() {
        config.store_name = defaults.store_name;
    }
    if config.shopify_api_version.is_empty() {
        config.shopify_api_version = defaults.shopify_api_version;
    }
    if config.model_api_url.is_empty() {
        config.model_api_url = defaults.model_api_url;
    }
    if config.model.is_empty() {
        config.model = defaults.model;
    }
    if config.max_tokens_per_turn == 0 {
        config.max_tokens_per_turn = defaults.max_tokens_per_turn;
    }
    if config.db_path.is_empty() {
        config.db_path = defaults.db_path;
    }
    if config.max_tool_cycles == 0 {
        config.max_tool_cycles = defaults.max_tool_cycles;
    }
    if config.model_timeout_secs == 0 {
        config.model_timeout_secs = defaults.model_timeout_secs;
    }
    if config.tool_timeout_secs == 0 {
        config.tool_timeout_secs = defaults.tool_timeout_secs;
    }
    if config.context_window_messages == 0 {
        config.context_window_messages = defaults.context_window_messages;
    }
}

fn apply_env_overrides(config: &mut StorebotConfig) {
    if let Ok(v) = std::env::var("SHOPIFY_STORE_DOMAIN") {
        config.shopify_store_domain = v;
    }
    if let Ok(v) = std::env::var("SHOPIFY_API_VERSION") {
        config.shopify_api_version = v;
    }
    if let Ok(v) = std::env::var("SHOPIFY_ACCESS_TOKEN") {
        config.shopify_access_token = v;
    }
    if let Ok(v) = std::env::var("STOREBOT_MODEL_API_URL") {
        config.model_api_url = v;
    }
    if let Ok(v) = std::env::var("STOREBOT_MODEL_API_KEY") {
        config.model_api_key = v;
    }
    if let Ok(v) = std::env::var("STOREBOT_MODEL") {
        config.model = v;
    }
}

/// Save the config to `~/.storebot/storebot.json`.
///
/// Creates the directory with mode 0o700 if missing. The file is
/// written with mode 0o600 since it may contain API credentials.
pub fn save_config(config: &StorebotConfig) -> Result<()> {
    let dir = get_storebot_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create storebot directory")?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
    }

    let config_path = get_config_path();
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(&config_path, &json).context("Failed to write config file")?;
    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

/// Verify that the credentials required to reach the collaborators are
/// present, listing every missing one.
pub fn validate(config: &StorebotConfig) -> Result<()> {
    let mut missing: Vec<&str> = Vec::new();

    if config.shopify_store_domain.is_empty() {
        missing.push("SHOPIFY_STORE_DOMAIN");
    }
    if config.shopify_access_token.is_empty() {
        missing.push("SHOPIFY_ACCESS_TOKEN");
    }
    if config.model_api_key.is_empty() {
        missing.push("STOREBOT_MODEL_API_KEY");
    }

    if !missing.is_empty() {
        anyhow::bail!(
            "Missing required configuration: {}",
            missing.join(", ")
        );
    }
    Ok(())
}

/// Resolve a path that may start with `~` to an absolute path.
pub fn resolve_path(p: &str) -> String {
    if let Some(rest) = p.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        home.join(rest).to_string_lossy().to_string()
    } else {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_with_tilde() {
        let resolved = resolve_path("~/some/path");
        assert!(!resolved.starts_with('~'));
        assert!(resolved.ends_with("some/path"));
    }

    #[test]
    fn test_resolve_path_without_tilde() {
        let path = "/absolute/path/to/file";
        assert_eq!(resolve_path(path), path);
    }

    #[test]
    fn test_merge_defaults_fills_empty_fields() {
        let mut config = default_config();
        config.model.clear();
        config.max_tool_cycles = 0;
        merge_defaults(&mut config);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tool_cycles, 10);
    }

    #[test]
    fn test_validate_lists_all_missing() {
        let config = default_config();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("SHOPIFY_STORE_DOMAIN"));
        assert!(err.contains("SHOPIFY_ACCESS_TOKEN"));
        assert!(err.contains("STOREBOT_MODEL_API_KEY"));
    }
}
