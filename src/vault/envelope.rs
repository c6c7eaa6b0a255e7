//! Self-contained encrypted JSON envelope for shared files
//!
//! Wire form: base64 of `{"iv":[..],"salt":[..],"cipher":[..]}` with byte arrays
//! as JSON numbers. Each envelope carries its own salt, so the passphrase alone
//! opens it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use crate::vault::crypto::{self, b64_decode, b64_encode};
use crate::vault::VaultError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub iv: Vec<u8>,
    pub salt: Vec<u8>,
    pub cipher: Vec<u8>,
}

impl Envelope {
    /// Encrypt a value under a passphrase with a fresh salt and IV
    pub fn seal<T: Serialize>(value: &T, passphrase: &str) -> Result<Self, VaultError> {
        let salt = crypto::random_salt();
        let key = crypto::derive_key(passphrase, &salt);
        let plaintext = serde_json::to_vec(value)?;
        let (iv, cipher) = crypto::encrypt(&key, &plaintext)?;
        Ok(Self {
            iv: iv.to_vec(),
            salt: salt.to_vec(),
            cipher,
        })
    }

    pub fn open<T: DeserializeOwned>(&self, passphrase: &str) -> Result<T, VaultError> {
        let key = crypto::derive_key(passphrase, &self.salt);
        let plaintext = crypto::decrypt(&key, &self.iv, &self.cipher)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// JSON text as stored in Drive files
    pub fn to_json(&self) -> Result<String, VaultError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, VaultError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Encrypt a value into the base64 envelope form
pub fn encrypt_json<T: Serialize>(value: &T, passphrase: &str) -> Result<String, VaultError> {
    let envelope = Envelope::seal(value, passphrase)?;
    Ok(b64_encode(envelope.to_json()?.as_bytes()))
}

/// Decrypt the base64 envelope form
pub fn decrypt_json<T: DeserializeOwned>(payload_b64: &str, passphrase: &str) -> Result<T, VaultError> {
    let bytes = b64_decode(payload_b64)?;
    let text = String::from_utf8(bytes).map_err(|e| VaultError::Encoding(e.to_string()))?;
    Envelope::from_json(&text)?.open(passphrase)
}
