//! Config file loading, environment overrides and validation.

use std::fs;
use std::path::{Path, PathBuf};

use creditgate_types::models::AppConfig;
use creditgate_types::ConfigError;
use validator::Validate;

const DATA_DIR: &str = ".creditgate";
const CONFIG_FILE: &str = "config.json";

/// Explicit config file path.
pub const CONFIG_ENV: &str = "CREDITGATE_CONFIG";
/// Overrides the data directory (default `~/.creditgate`).
pub const DATA_DIR_ENV: &str = "CREDITGATE_DATA_DIR";
pub const PORT_ENV: &str = "CREDITGATE_PORT";
pub const DATABASE_URL_ENV: &str = "CREDITGATE_DATABASE_URL";
pub const PROVIDER_API_KEY_ENV: &str = "CREDITGATE_PROVIDER_API_KEY";
pub const GUEST_SECRET_ENV: &str = "CREDITGATE_GUEST_SECRET";

/// Accepted range for the reference timezone offset (UTC-12:00 ..= UTC+14:00).
const UTC_OFFSET_RANGE_MINUTES: std::ops::RangeInclusive<i32> = -720..=840;

/// Get the data directory path, creating it if needed.
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    let data_dir = if let Ok(custom_dir) = std::env::var(DATA_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else {
        let home = dirs::home_dir().ok_or_else(|| ConfigError::NotFound {
            path: "home directory".to_string(),
        })?;
        home.join(DATA_DIR)
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir).map_err(|e| ConfigError::from_io_error(&e))?;
    }

    Ok(data_dir)
}

/// Path the config is read from: `$CREDITGATE_CONFIG`, else `<data dir>/config.json`.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    Ok(get_data_dir()?.join(CONFIG_FILE))
}

/// Load, override from the process environment, and validate.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_path()?;
    let mut config = load_config_from(&path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

/// Read a config file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file {} not found, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
        message: format!("failed to read {}: {}", path.display(), e),
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))
}

/// Save the config atomically (temp file + rename).
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let content =
        serde_json::to_string_pretty(config).map_err(|e| ConfigError::from_json_error(&e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::from_io_error(&e))?;
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, path).map_err(|e| ConfigError::from_io_error(&e))
}

/// Apply `CREDITGATE_*` overrides. `lookup` is `std::env::var` in production.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(PORT_ENV) {
        match port.trim().parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(e) => tracing::warn!("Ignoring {}={:?}: {}", PORT_ENV, port, e),
        }
    }
    if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
        config.database_url = Some(url);
    }
    if let Some(key) = lookup(PROVIDER_API_KEY_ENV) {
        config.provider.api_key = key;
    }
    if let Some(secret) = lookup(GUEST_SECRET_ENV) {
        config.guest_token.secret = secret;
    }
}

/// Field-level validation plus the cross-field checks derive can't express.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|e| ConfigError::invalid("config", e.to_string()))?;

    let offset = config.quota.reference_utc_offset_minutes;
    if !UTC_OFFSET_RANGE_MINUTES.contains(&offset) {
        return Err(ConfigError::invalid(
            "quota.reference_utc_offset_minutes",
            format!("{offset} is outside -720..=840"),
        ));
    }

    if config.generation.services.is_empty() {
        return Err(ConfigError::invalid("generation.services", "no services configured"));
    }

    for (service_id, candidates) in &config.generation.services {
        let field = format!("generation.services.{service_id}");
        if candidates.is_empty() {
            return Err(ConfigError::invalid(field, "candidate list is empty"));
        }
        for candidate in candidates {
            candidate.validate().map_err(|e| ConfigError::invalid(field.clone(), e.to_string()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(&dir.path().join("absent.json")).expect("defaults");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.server.port = 9123;
        config.quota.plans.pro.monthly_limit = 250;
        save_config_to(&config, &path).expect("save");

        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.server.port, 9123);
        assert_eq!(loaded.quota.plans.pro.monthly_limit, 250);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");

        assert!(matches!(load_config_from(&path), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (PORT_ENV, "7001"),
            (DATABASE_URL_ENV, "postgres://localhost/creditgate"),
            (PROVIDER_API_KEY_ENV, "key-123"),
            (GUEST_SECRET_ENV, "s3cret"),
        ]);
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.server.port, 7001);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/creditgate"));
        assert_eq!(config.provider.api_key, "key-123");
        assert_eq!(config.guest_token.secret, "s3cret");
    }

    #[test]
    fn test_bad_port_override_is_ignored() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |k| (k == PORT_ENV).then(|| "http".to_string()));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validate_rejects_empty_service_and_offset() {
        let mut config = AppConfig::default();
        config.generation.services.insert("empty".to_string(), Vec::new());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { ref field, .. }) if field == "generation.services.empty"
        ));

        let mut config = AppConfig::default();
        config.quota.reference_utc_offset_minutes = 900;
        assert!(validate_config(&config).is_err());

        config.quota.reference_utc_offset_minutes = -300;
        assert!(validate_config(&config).is_ok());
    }
}
