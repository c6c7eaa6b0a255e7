//! PBKDF2-HMAC-SHA256 key derivation and AES-256-GCM sealing

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use sha2::Sha256;
use crate::vault::VaultError;

pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
pub const PBKDF2_ITERATIONS: u32 = 100_000;

pub type Key = [u8; KEY_LEN];

/// Derive a 256-bit key from a passphrase and salt
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Key {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

pub fn random_salt() -> [u8; SALT_LEN] {
    rand::rng().random()
}

pub fn random_iv() -> [u8; IV_LEN] {
    rand::rng().random()
}

/// Encrypt with a fresh random IV, returning `(iv, ciphertext)`
pub fn encrypt(key: &Key, plaintext: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>), VaultError> {
    let iv = random_iv();
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::InvalidKey)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| VaultError::Encrypt)?;
    Ok((iv, ciphertext))
}

pub fn decrypt(key: &Key, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, VaultError> {
    if iv.len() != IV_LEN {
        return Err(VaultError::Decrypt);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::InvalidKey)?;
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| VaultError::Decrypt)
}

pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn b64_decode(text: &str) -> Result<Vec<u8>, VaultError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| VaultError::Encoding(e.to_string()))
}

/// Decode a base64 key, checking its length
pub fn key_from_b64(text: &str) -> Result<Key, VaultError> {
    let bytes = b64_decode(text).map_err(|_| VaultError::InvalidRecoveryCode)?;
    bytes.try_into().map_err(|_| VaultError::InvalidRecoveryCode)
}
