//! Per-user key derivation
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 from the user's id and the
//! configured salt. Derivation is deterministic and side-effect free, so keys
//! are recomputed on every use and never stored.

use std::fmt;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::domain::result::Result;
use crate::domain::{KdfParams, UserId, KEY_LEN};

/// A derived 256-bit key. Deliberately neither `Clone`, `Serialize` nor printable.
pub struct UserKey([u8; KEY_LEN]);

impl UserKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UserKey(..)")
    }
}

/// Derives ledger keys from user ids
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    params: KdfParams,
}

impl KeyDerivation {
    /// Create a key derivation, rejecting weak parameters
    pub fn new(params: KdfParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Derive the key for `user`. Slow by design (~100k HMAC rounds).
    pub fn derive(&self, user: UserId) -> UserKey {
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(
            user.to_string().as_bytes(),
            self.params.salt.as_bytes(),
            self.params.iterations,
            &mut key,
        );
        UserKey(key)
    }
}
