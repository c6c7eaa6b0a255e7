//! Passphrase vault for encrypting records at rest
//!
//! The vault derives an AES-256-GCM key from a passphrase with PBKDF2 and keeps
//! only the salt, the unlock method and an encrypted verifier in the ledger's
//! settings table. The key itself lives in memory for the duration of a command.

pub mod crypto;
pub mod envelope;

pub use envelope::{decrypt_json, encrypt_json, Envelope};

use anyhow::Result;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::repo::SettingsRepo;
use crypto::{b64_decode, b64_encode, Key};

const SALT_KEY: &str = "vault.salt";
const METHOD_KEY: &str = "vault.method";
const VERIFIER_KEY: &str = "vault.verifier";
const VERIFIER_PLAINTEXT: &str = "focus-matrix-vault";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault is not initialized (run 'focus vault init')")]
    NotInitialized,
    #[error("vault is already initialized")]
    AlreadyInitialized,
    #[error("vault is locked")]
    Locked,
    #[error("passphrase cannot be empty")]
    EmptyPassphrase,
    #[error("wrong passphrase")]
    WrongPassphrase,
    #[error("vault was restored from a recovery code and has no passphrase; use the recovery code or rotate to a new passphrase")]
    NoPassphrase,
    #[error("invalid recovery code")]
    InvalidRecoveryCode,
    #[error("invalid key material")]
    InvalidKey,
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed: wrong key or corrupted data")]
    Decrypt,
    #[error("invalid encoding: {0}")]
    Encoding(String),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("vault settings are corrupted: {0}")]
    Corrupt(String),
}

/// How the vault key was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultMethod {
    Passphrase,
    Recovery,
}

impl VaultMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultMethod::Passphrase => "passphrase",
            VaultMethod::Recovery => "recovery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "passphrase" => Some(VaultMethod::Passphrase),
            "recovery" => Some(VaultMethod::Recovery),
            _ => None,
        }
    }
}

/// Record sealed with the vault key; all fields base64
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub ciphertext: String,
    pub iv: String,
    /// Present when the key came from a passphrase, so the record opens elsewhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl EncryptedRecord {
    fn seal(key: &Key, plaintext: &[u8], salt: Option<String>) -> Result<Self, VaultError> {
        let (iv, ciphertext) = crypto::encrypt(key, plaintext)?;
        Ok(Self {
            ciphertext: b64_encode(&ciphertext),
            iv: b64_encode(&iv),
            salt,
        })
    }

    fn open_bytes(&self, key: &Key) -> Result<Vec<u8>, VaultError> {
        let ciphertext = b64_decode(&self.ciphertext)?;
        let iv = b64_decode(&self.iv)?;
        crypto::decrypt(key, &iv, &ciphertext)
    }

    /// Decrypt with a raw key (vault key or recovery code)
    pub fn open_with_key<T: DeserializeOwned>(&self, key: &Key) -> Result<T, VaultError> {
        Ok(serde_json::from_slice(&self.open_bytes(key)?)?)
    }

    /// Decrypt using the embedded salt and a passphrase
    pub fn open_with_passphrase<T: DeserializeOwned>(&self, passphrase: &str) -> Result<T, VaultError> {
        let salt = self.salt.as_deref().ok_or(VaultError::NoPassphrase)?;
        let key = crypto::derive_key(passphrase, &b64_decode(salt)?);
        match self.open_with_key(&key) {
            Err(VaultError::Decrypt) => Err(VaultError::WrongPassphrase),
            other => other,
        }
    }
}

/// Ledger-backed vault; locked until unlocked in this process
pub struct Vault<'c> {
    conn: &'c Connection,
    key: Option<Key>,
}

impl<'c> Vault<'c> {
    pub fn open(conn: &'c Connection) -> Self {
        Self { conn, key: None }
    }

    pub fn method(&self) -> Result<Option<VaultMethod>> {
        Ok(SettingsRepo::get(self.conn, METHOD_KEY)?
            .and_then(|m| VaultMethod::from_str(&m)))
    }

    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.method()?.is_some())
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    /// Create the vault: fresh salt, derived key, stored verifier
    pub fn init_with_passphrase(&mut self, passphrase: &str) -> Result<()> {
        if self.is_initialized()? {
            return Err(VaultError::AlreadyInitialized.into());
        }
        if passphrase.is_empty() {
            return Err(VaultError::EmptyPassphrase.into());
        }
        self.store_passphrase_key(passphrase)?;
        log::info!("Vault initialized");
        Ok(())
    }

    fn store_passphrase_key(&mut self, passphrase: &str) -> Result<()> {
        let salt = crypto::random_salt();
        let key = crypto::derive_key(passphrase, &salt);
        let tx = self.conn.unchecked_transaction()?;
        SettingsRepo::set(&tx, SALT_KEY, &b64_encode(&salt))?;
        SettingsRepo::set(&tx, METHOD_KEY, VaultMethod::Passphrase.as_str())?;
        Self::store_verifier(&tx, &key)?;
        tx.commit()?;
        self.key = Some(key);
        Ok(())
    }

    fn store_verifier(conn: &Connection, key: &Key) -> Result<()> {
        let record = EncryptedRecord::seal(key, VERIFIER_PLAINTEXT.as_bytes(), None)?;
        SettingsRepo::set(conn, VERIFIER_KEY, &serde_json::to_string(&record)?)?;
        Ok(())
    }

    fn verify(&self, key: &Key) -> Result<bool> {
        let stored = SettingsRepo::get(self.conn, VERIFIER_KEY)?
            .ok_or_else(|| VaultError::Corrupt("missing verifier".to_string()))?;
        let record: EncryptedRecord = serde_json::from_str(&stored)
            .map_err(|e| VaultError::Corrupt(e.to_string()))?;
        match record.open_bytes(key) {
            Ok(bytes) => Ok(bytes == VERIFIER_PLAINTEXT.as_bytes()),
            Err(VaultError::Decrypt) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn salt(&self) -> Result<Option<Vec<u8>>> {
        match SettingsRepo::get(self.conn, SALT_KEY)? {
            Some(s) => Ok(Some(b64_decode(&s)?)),
            None => Ok(None),
        }
    }

    /// Derive the key and check it against the stored verifier
    pub fn unlock_with_passphrase(&mut self, passphrase: &str) -> Result<()> {
        if !self.is_initialized()? {
            return Err(VaultError::NotInitialized.into());
        }
        let salt = self.salt()?.ok_or(VaultError::NoPassphrase)?;
        let key = crypto::derive_key(passphrase, &salt);
        if !self.verify(&key)? {
            return Err(VaultError::WrongPassphrase.into());
        }
        self.key = Some(key);
        Ok(())
    }

    pub fn lock(&mut self) {
        self.key = None;
    }

    fn key(&self) -> Result<&Key, VaultError> {
        self.key.as_ref().ok_or(VaultError::Locked)
    }

    pub fn encrypt_record<T: Serialize>(&self, value: &T) -> Result<EncryptedRecord> {
        let key = self.key()?;
        let salt = match self.method()? {
            Some(VaultMethod::Passphrase) => self.salt()?.map(|s| b64_encode(&s)),
            _ => None,
        };
        let plaintext = serde_json::to_vec(value)?;
        Ok(EncryptedRecord::seal(key, &plaintext, salt)?)
    }

    pub fn decrypt_record<T: DeserializeOwned>(&self, record: &EncryptedRecord) -> Result<T> {
        Ok(record.open_with_key(self.key()?)?)
    }

    /// Raw key as base64; whoever holds it can decrypt everything
    pub fn export_recovery_code(&self) -> Result<String> {
        Ok(b64_encode(self.key()?))
    }

    /// Unlock with a recovery code, initializing a recovery-only vault if none exists
    pub fn import_recovery_code(&mut self, code: &str) -> Result<()> {
        let key = crypto::key_from_b64(code)?;
        if self.is_initialized()? {
            if !self.verify(&key)? {
                return Err(VaultError::InvalidRecoveryCode.into());
            }
        } else {
            let tx = self.conn.unchecked_transaction()?;
            SettingsRepo::set(&tx, METHOD_KEY, VaultMethod::Recovery.as_str())?;
            Self::store_verifier(&tx, &key)?;
            tx.commit()?;
            log::info!("Vault restored from recovery code");
        }
        self.key = Some(key);
        Ok(())
    }

    /// Replace the key with one derived from a new passphrase
    ///
    /// Requires an unlocked vault. Records sealed with the old key keep their
    /// embedded salt and still open with the old passphrase.
    pub fn rotate_key(&mut self, new_passphrase: &str) -> Result<()> {
        self.key()?;
        if new_passphrase.is_empty() {
            return Err(VaultError::EmptyPassphrase.into());
        }
        self.store_passphrase_key(new_passphrase)?;
        log::info!("Vault key rotated");
        Ok(())
    }

    /// Remove all vault state and forget the key
    pub fn wipe(&mut self) -> Result<()> {
        self.key = None;
        SettingsRepo::delete_prefix(self.conn, "vault.")?;
        log::info!("Vault wiped");
        Ok(())
    }
}
