//! Config command - show and change settings.json

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use pocket_core::config::Config;
use pocket_core::domain::DecryptFaultPolicy;

use super::get_pocket_dir;
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a setting
    ///
    /// Keys: cache.capacity, decryptFaultPolicy, ledger.idleTimeoutSecs,
    /// delivery.maxAttempts, delivery.initialDelayMs. The key derivation
    /// salt is not settable here: changing it makes existing ledgers unreadable.
    Set { key: String, value: String },
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let pocket_dir = get_pocket_dir()?;
    let mut config = Config::load(&pocket_dir)?;

    match command {
        ConfigCommands::Show { json } => {
            let salt = if config.uses_default_salt() {
                "built-in default"
            } else {
                "custom"
            };
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "pocket_dir": pocket_dir.to_string_lossy(),
                        "kdf_salt": salt,
                        "kdf_iterations": config.kdf.iterations,
                        "cache_capacity": config.cache_capacity,
                        "decrypt_fault_policy": config.decrypt_fault_policy,
                        "idle_timeout_secs": config.idle_timeout.as_secs(),
                        "delivery_max_attempts": config.delivery.max_attempts,
                        "delivery_initial_delay_ms": config.delivery.initial_delay.as_millis() as u64,
                    })
                );
                return Ok(());
            }

            println!("{}", "Pocket Configuration".bold());
            let mut table = output::create_table();
            table.add_row(vec!["Directory".to_string(), pocket_dir.display().to_string()]);
            table.add_row(vec!["KDF salt".to_string(), salt.to_string()]);
            table.add_row(vec!["KDF iterations".to_string(), config.kdf.iterations.to_string()]);
            table.add_row(vec!["Cache capacity".to_string(), config.cache_capacity.to_string()]);
            table.add_row(vec![
                "Decrypt fault policy".to_string(),
                config.decrypt_fault_policy.to_string(),
            ]);
            table.add_row(vec![
                "Ledger idle timeout".to_string(),
                format!("{}s", config.idle_timeout.as_secs()),
            ]);
            table.add_row(vec![
                "Delivery retries".to_string(),
                format!(
                    "{} attempts, {}ms initial delay",
                    config.delivery.max_attempts,
                    config.delivery.initial_delay.as_millis()
                ),
            ]);
            println!("{}", table);

            if config.uses_default_salt() {
                output::warning(
                    "Using the built-in salt. Set kdf.salt in settings.json (or POCKET_KDF_SALT) before recording data.",
                );
            }
        }
        ConfigCommands::Set { key, value } => {
            apply_setting(&mut config, &key, &value)?;
            config.save(&pocket_dir)?;
            output::success(&format!("{} = {}", key, value));
        }
    }

    Ok(())
}

fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let number = || {
        value
            .parse::<u64>()
            .with_context(|| format!("{} expects a non-negative integer", key))
    };

    match key {
        "cache.capacity" => config.cache_capacity = number()? as usize,
        "decryptFaultPolicy" => config.decrypt_fault_policy = DecryptFaultPolicy::from_str(value)?,
        "ledger.idleTimeoutSecs" => config.idle_timeout = Duration::from_secs(number()?),
        "delivery.maxAttempts" => {
            let attempts = number()?;
            if attempts == 0 {
                bail!("delivery.maxAttempts must be at least 1");
            }
            config.delivery.max_attempts = attempts as u32;
        }
        "delivery.initialDelayMs" => {
            config.delivery.initial_delay = Duration::from_millis(number()?)
        }
        "kdf.salt" | "kdf.iterations" => {
            bail!("{} cannot be changed here; edit settings.json on a fresh pocket directory", key)
        }
        other => bail!("Unknown setting: {}", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_setting() {
        let mut config = Config::default();

        apply_setting(&mut config, "cache.capacity", "0").unwrap();
        apply_setting(&mut config, "decryptFaultPolicy", "substitute-zero").unwrap();
        apply_setting(&mut config, "delivery.maxAttempts", "5").unwrap();

        assert_eq!(config.cache_capacity, 0);
        assert_eq!(config.decrypt_fault_policy, DecryptFaultPolicy::SubstituteZero);
        assert_eq!(config.delivery.max_attempts, 5);
    }

    #[test]
    fn test_rejects_salt_and_bad_values() {
        let mut config = Config::default();

        assert!(apply_setting(&mut config, "kdf.salt", "x").is_err());
        assert!(apply_setting(&mut config, "cache.capacity", "-1").is_err());
        assert!(apply_setting(&mut config, "delivery.maxAttempts", "0").is_err());
        assert!(apply_setting(&mut config, "nope", "1").is_err());
    }
}
