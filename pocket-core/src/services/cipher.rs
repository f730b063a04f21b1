//! Amount encryption - zlib pre-pass then AES-256-GCM
//!
//! Each amount is written as canonical decimal text, compressed, and sealed
//! under the user's derived key with a fresh random 96-bit nonce. Nonce,
//! ciphertext and tag are stored as separate base64 strings.
//!
//! These functions are CPU-bound; async callers run them on the blocking pool.

use std::io::{Read, Write};
use std::str::FromStr;

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::RngCore;
use rust_decimal::Decimal;

use super::keys::UserKey;
use crate::domain::result::{Error, Result};
use crate::domain::SealedAmount;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
/// Upper bound on decompressed plaintext; amounts are a few dozen bytes
const MAX_PLAINTEXT_LEN: u64 = 256;

/// Canonical text form of an amount (no trailing fractional zeros)
pub fn canonical_text(amount: Decimal) -> String {
    amount.normalize().to_string()
}

/// Encrypt a non-negative amount under `key`
pub fn encrypt(amount: Decimal, key: &UserKey) -> Result<SealedAmount> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::validation("Amount must not be negative"));
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(canonical_text(amount).as_bytes())?;
    let mut buffer = encoder.finish()?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Encryption(format!("Failed to create cipher: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let tag = cipher
        .encrypt_in_place_detached(nonce, b"", &mut buffer)
        .map_err(|e| Error::Encryption(format!("Encryption failed: {}", e)))?;

    Ok(SealedAmount {
        nonce: STANDARD.encode(nonce_bytes),
        ciphertext: STANDARD.encode(&buffer),
        tag: STANDARD.encode(tag),
    })
}

/// Decrypt a stored amount. Any integrity or format problem is a `DecryptionFault`.
pub fn decrypt(sealed: &SealedAmount, key: &UserKey) -> Result<Decimal> {
    let nonce_bytes = decode_field("nonce", &sealed.nonce)?;
    let mut buffer = decode_field("ciphertext", &sealed.ciphertext)?;
    let tag_bytes = decode_field("tag", &sealed.tag)?;

    if nonce_bytes.len() != NONCE_LEN {
        return Err(Error::decryption_fault(format!(
            "nonce must be {} bytes, got {}",
            NONCE_LEN,
            nonce_bytes.len()
        )));
    }
    if tag_bytes.len() != TAG_LEN {
        return Err(Error::decryption_fault(format!(
            "tag must be {} bytes, got {}",
            TAG_LEN,
            tag_bytes.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Encryption(format!("Failed to create cipher: {}", e)))?;
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&nonce_bytes),
            b"",
            &mut buffer,
            Tag::from_slice(&tag_bytes),
        )
        .map_err(|_| Error::decryption_fault("authentication tag mismatch"))?;

    let mut text = String::new();
    ZlibDecoder::new(buffer.as_slice())
        .take(MAX_PLAINTEXT_LEN)
        .read_to_string(&mut text)
        .map_err(|e| Error::decryption_fault(format!("corrupt compressed payload: {}", e)))?;

    let amount = Decimal::from_str(text.trim())
        .map_err(|_| Error::decryption_fault("plaintext is not a decimal amount"))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::decryption_fault("plaintext amount is negative"));
    }
    Ok(amount)
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| Error::decryption_fault(format!("{} is not valid base64: {}", name, e)))
}
