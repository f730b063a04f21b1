//! Encryption domain models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::Error;

/// Minimum PBKDF2-HMAC-SHA256 rounds accepted for key derivation
pub const MIN_ITERATIONS: u32 = 100_000;
pub const DEFAULT_ITERATIONS: u32 = 100_000;
pub const KEY_LEN: usize = 32;
/// Built-in system-wide salt, shared by every user unless configured
pub const DEFAULT_SALT: &str = "my_super_secret_salt_123";

/// Parameters for per-user key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Salt mixed into every user's derivation (UTF-8 text)
    pub salt: String,
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.to_string(),
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn new(salt: impl Into<String>, iterations: u32) -> Self {
        Self {
            salt: salt.into(),
            iterations,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.salt.is_empty() {
            return Err(Error::config("kdf.salt must not be empty"));
        }
        if self.iterations < MIN_ITERATIONS {
            return Err(Error::config(format!(
                "kdf.iterations must be at least {}, got {}",
                MIN_ITERATIONS, self.iterations
            )));
        }
        Ok(())
    }

    pub fn uses_default_salt(&self) -> bool {
        self.salt == DEFAULT_SALT
    }
}

/// What the read path does when a stored amount fails to decrypt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecryptFaultPolicy {
    /// Return the fault to the caller
    #[default]
    Surface,
    /// Log the fault and count the amount as zero (lossy)
    SubstituteZero,
}

impl DecryptFaultPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecryptFaultPolicy::Surface => "surface",
            DecryptFaultPolicy::SubstituteZero => "substitute-zero",
        }
    }
}

impl fmt::Display for DecryptFaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecryptFaultPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "surface" | "error" => Ok(DecryptFaultPolicy::Surface),
            "substitute-zero" | "zero" => Ok(DecryptFaultPolicy::SubstituteZero),
            other => Err(Error::config(format!("Unknown decrypt fault policy: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        let params = KdfParams::default();
        assert!(params.validate().is_ok());
        assert!(params.uses_default_salt());
        assert_eq!(params.iterations, 100_000);
    }

    #[test]
    fn test_weak_params_rejected() {
        assert!(KdfParams::new("salt", 99_999).validate().is_err());
        assert!(KdfParams::new("", 200_000).validate().is_err());
        assert!(KdfParams::new("per-deployment", 200_000).validate().is_ok());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("surface".parse::<DecryptFaultPolicy>().unwrap(), DecryptFaultPolicy::Surface);
        assert_eq!(
            "Substitute-Zero".parse::<DecryptFaultPolicy>().unwrap(),
            DecryptFaultPolicy::SubstituteZero
        );
        assert!("ignore".parse::<DecryptFaultPolicy>().is_err());
        assert_eq!(DecryptFaultPolicy::default(), DecryptFaultPolicy::Surface);
    }
}
