// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge content decryption keyed from configuration.

use mnemo_config::model::VaultConfig;
use mnemo_core::{ContentDecryptor, MnemoError};
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto;

/// Decrypts knowledge content sealed with the space key.
///
/// The key is zeroed on drop and never printed.
pub struct ContentCipher {
    key: Zeroizing<[u8; 32]>,
}

impl ContentCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Parse a 64-character hex key.
    pub fn from_hex(hex_key: &str) -> Result<Self, MnemoError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_key.trim())
                .map_err(|e| MnemoError::Config(format!("content key is not valid hex: {e}")))?,
        );
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            MnemoError::Config(format!(
                "content key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::new(key))
    }

    /// Resolve the key from `vault.key`, falling back to the `vault.key_env` variable.
    ///
    /// Returns `Ok(None)` when neither is set; encrypted content then cannot be read.
    pub fn from_config(config: &VaultConfig) -> Result<Option<Self>, MnemoError> {
        if let Some(key) = config.key.as_deref() {
            debug!("content key loaded from configuration");
            return Self::from_hex(key).map(Some);
        }
        match std::env::var(&config.key_env) {
            Ok(value) if !value.trim().is_empty() => {
                debug!(env = config.key_env.as_str(), "content key loaded from environment");
                Self::from_hex(&value).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// A fresh random key, hex-encoded, suitable for `vault.key`.
    pub fn generate_hex() -> Result<Zeroizing<String>, MnemoError> {
        let key = Zeroizing::new(crypto::generate_random_key()?);
        Ok(Zeroizing::new(hex::encode(*key)))
    }

    /// Encrypt content for storage.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, MnemoError> {
        crypto::seal(&self.key, plaintext)
    }
}

impl std::fmt::Debug for ContentCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCipher").field("key", &"[REDACTED]").finish()
    }
}

impl ContentDecryptor for ContentCipher {
    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, MnemoError> {
        crypto::open(&self.key, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn hex_key_roundtrip_through_decryptor() {
        let cipher = ContentCipher::from_hex(KEY_HEX).unwrap();
        let sealed = cipher.seal(b"# Private note").unwrap();
        let decryptor: &dyn ContentDecryptor = &cipher;
        assert_eq!(decryptor.decrypt(&sealed).unwrap(), b"# Private note");
    }

    #[test]
    fn short_or_invalid_keys_are_config_errors() {
        assert!(matches!(ContentCipher::from_hex("abcd"), Err(MnemoError::Config(_))));
        assert!(matches!(ContentCipher::from_hex("zz"), Err(MnemoError::Config(_))));
    }

    #[test]
    fn config_key_takes_precedence_over_env() {
        let config = VaultConfig {
            key: Some(KEY_HEX.to_string()),
            key_env: "MNEMO_TEST_UNSET_KEY_VAR".to_string(),
        };
        assert!(ContentCipher::from_config(&config).unwrap().is_some());
    }

    #[test]
    fn missing_key_yields_none() {
        let config = VaultConfig {
            key: None,
            key_env: "MNEMO_TEST_DEFINITELY_UNSET_VAR".to_string(),
        };
        assert!(ContentCipher::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn generated_keys_are_usable_and_distinct() {
        let first = ContentCipher::generate_hex().unwrap();
        let second = ContentCipher::generate_hex().unwrap();
        assert_eq!(first.len(), 64);
        assert_ne!(*first, *second);
        let cipher = ContentCipher::from_hex(&first).unwrap();
        let sealed = cipher.seal(b"draft").unwrap();
        assert_eq!(cipher.decrypt(&sealed).unwrap(), b"draft");
    }

    #[test]
    fn debug_redacts_key() {
        let cipher = ContentCipher::from_hex(KEY_HEX).unwrap();
        let printed = format!("{cipher:?}");
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("0001"));
    }
}
