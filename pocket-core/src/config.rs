//! Configuration management
//!
//! Settings live in `settings.json` in the pocket directory:
//! ```json
//! {
//!   "kdf": { "salt": "...", "iterations": 100000 },
//!   "cache": { "capacity": 1000 },
//!   "decryptFaultPolicy": "surface",
//!   "ledger": { "idleTimeoutSecs": 900 },
//!   "delivery": { "maxAttempts": 3, "initialDelayMs": 2000 }
//! }
//! ```
//! Keys this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{DecryptFaultPolicy, KdfParams, DEFAULT_ITERATIONS, DEFAULT_SALT};
use crate::ports::{RetryPolicy, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS};
use crate::services::DEFAULT_CAPACITY;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 900;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    // Only ever written back as it was read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kdf: Option<KdfSettings>,
    #[serde(default)]
    cache: CacheSettings,
    #[serde(default)]
    decrypt_fault_policy: DecryptFaultPolicy,
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(default)]
    delivery: DeliverySettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KdfSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
    #[serde(default = "default_iterations")]
    iterations: u32,
}

impl Default for KdfSettings {
    fn default() -> Self {
        Self {
            salt: None,
            iterations: default_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheSettings {
    #[serde(default = "default_capacity")]
    capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default = "default_idle_timeout")]
    idle_timeout_secs: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliverySettings {
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    initial_delay_ms: u64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
        }
    }
}

fn default_salt() -> String {
    DEFAULT_SALT.to_string()
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_initial_delay() -> u64 {
    DEFAULT_INITIAL_DELAY_MS
}

/// Pocket configuration (effective view of settings plus env overrides)
#[derive(Debug, Clone)]
pub struct Config {
    pub kdf: KdfParams,
    /// 0 disables both caches
    pub cache_capacity: usize,
    pub decrypt_fault_policy: DecryptFaultPolicy,
    pub idle_timeout: Duration,
    pub delivery: RetryPolicy,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_raw(SettingsFile::default())
    }
}

impl Config {
    /// Load config from the pocket directory
    ///
    /// `POCKET_KDF_SALT` and `POCKET_DECRYPT_FAULT_POLICY` override the file.
    pub fn load(pocket_dir: &Path) -> Result<Self> {
        Self::load_with_env(pocket_dir, |name| std::env::var(name).ok())
    }

    /// Like [`Config::load`], with environment lookups supplied by the caller
    pub fn load_with_env(pocket_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = read_settings(pocket_dir)?;
        let mut config = Self::from_raw(raw);

        if let Some(salt) = env("POCKET_KDF_SALT").filter(|s| !s.is_empty()) {
            config.kdf.salt = salt;
        }
        if let Some(policy) = env("POCKET_DECRYPT_FAULT_POLICY") {
            config.decrypt_fault_policy = DecryptFaultPolicy::from_str(&policy)
                .with_context(|| "Invalid POCKET_DECRYPT_FAULT_POLICY")?;
        }

        config.kdf.validate()?;
        Ok(config)
    }

    fn from_raw(raw: SettingsFile) -> Self {
        let kdf = raw.kdf.clone().unwrap_or_default();
        Self {
            kdf: KdfParams::new(kdf.salt.unwrap_or_else(default_salt), kdf.iterations),
            cache_capacity: raw.cache.capacity,
            decrypt_fault_policy: raw.decrypt_fault_policy,
            idle_timeout: Duration::from_secs(raw.ledger.idle_timeout_secs),
            delivery: RetryPolicy::new(
                raw.delivery.max_attempts,
                Duration::from_millis(raw.delivery.initial_delay_ms),
            ),
            _raw_settings: raw,
        }
    }

    /// Save config to the pocket directory, preserving unmanaged keys
    ///
    /// KDF settings are written back exactly as read (or not at all), so a
    /// salt from the environment or the built-in default never lands on disk.
    pub fn save(&self, pocket_dir: &Path) -> Result<()> {
        let mut settings = read_settings(pocket_dir)?;

        settings.cache.capacity = self.cache_capacity;
        settings.decrypt_fault_policy = self.decrypt_fault_policy;
        settings.ledger.idle_timeout_secs = self.idle_timeout.as_secs();
        settings.delivery.max_attempts = self.delivery.max_attempts;
        settings.delivery.initial_delay_ms = self.delivery.initial_delay.as_millis() as u64;

        std::fs::create_dir_all(pocket_dir)?;
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(pocket_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    pub fn uses_default_salt(&self) -> bool {
        self.kdf.uses_default_salt()
    }
}

/// A malformed settings file is an error: silently falling back to the
/// default salt would make every existing ledger unreadable.
fn read_settings(pocket_dir: &Path) -> Result<SettingsFile> {
    let settings_path = pocket_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", settings_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), no_env).unwrap();

        assert_eq!(config.kdf, KdfParams::default());
        assert!(config.uses_default_salt());
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.decrypt_fault_policy, DecryptFaultPolicy::Surface);
        assert_eq!(config.idle_timeout, Duration::from_secs(900));
        assert_eq!(config.delivery, RetryPolicy::default());
    }

    #[test]
    fn test_reads_camel_case_settings() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{
                "kdf": { "salt": "per-install-salt", "iterations": 200000 },
                "cache": { "capacity": 0 },
                "decryptFaultPolicy": "substitute-zero",
                "ledger": { "idleTimeoutSecs": 60 },
                "delivery": { "maxAttempts": 5 }
            }"#,
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(config.kdf.salt, "per-install-salt");
        assert_eq!(config.kdf.iterations, 200_000);
        assert!(!config.uses_default_salt());
        assert_eq!(config.cache_capacity, 0);
        assert_eq!(config.decrypt_fault_policy, DecryptFaultPolicy::SubstituteZero);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.delivery.max_attempts, 5);
        assert_eq!(config.delivery.initial_delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_env_overrides() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), |name| match name {
            "POCKET_KDF_SALT" => Some("from-env".to_string()),
            "POCKET_DECRYPT_FAULT_POLICY" => Some("zero".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.kdf.salt, "from-env");
        assert_eq!(config.decrypt_fault_policy, DecryptFaultPolicy::SubstituteZero);
    }

    #[test]
    fn test_weak_iterations_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "kdf": { "iterations": 1000 } }"#,
        )
        .unwrap();
        assert!(Config::load_with_env(dir.path(), no_env).is_err());
    }

    #[test]
    fn test_malformed_settings_is_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        assert!(Config::load_with_env(dir.path(), no_env).is_err());
    }

    #[test]
    fn test_save_preserves_unknown_keys_and_omits_env_salt() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "theme": "dark", "cache": { "capacity": 10 } }"#,
        )
        .unwrap();

        let mut config = Config::load_with_env(dir.path(), |name| {
            (name == "POCKET_KDF_SALT").then(|| "secret-from-env".to_string())
        })
        .unwrap();
        config.cache_capacity = 50;
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["theme"], "dark");
        assert_eq!(value["cache"]["capacity"], 50);
        assert!(!content.contains("secret-from-env"));

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(reloaded.cache_capacity, 50);
    }

    #[test]
    fn test_save_in_fresh_directory_writes_no_salt() {
        let dir = tempdir().unwrap();
        let mut config = Config::load_with_env(dir.path(), no_env).unwrap();
        config.cache_capacity = 5;
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(value.get("kdf").is_none());
        assert!(!content.contains(DEFAULT_SALT));
        assert_eq!(value["cache"]["capacity"], 5);

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert!(reloaded.uses_default_salt());
    }

    #[test]
    fn test_save_keeps_kdf_settings_from_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "kdf": { "salt": "per-install-salt", "iterations": 150000 } }"#,
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        config.save(dir.path()).unwrap();

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(reloaded.kdf, KdfParams::new("per-install-salt", 150_000));

        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "kdf": { "iterations": 150000 } }"#,
        )
        .unwrap();
        Config::load_with_env(dir.path(), no_env)
            .unwrap()
            .save(dir.path())
            .unwrap();
        let content = std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(!content.contains(DEFAULT_SALT));
    }
}
