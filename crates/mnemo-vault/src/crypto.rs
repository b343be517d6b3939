// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open over a `nonce || ciphertext+tag` payload.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the system
//! CSPRNG. Nonce reuse would be catastrophic for GCM security.

use mnemo_core::MnemoError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

/// Length of the GCM authentication tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

fn key(key: &[u8; 32]) -> Result<LessSafeKey, MnemoError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| MnemoError::Decrypt("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt plaintext into a self-contained payload: 12-byte nonce followed by
/// the ciphertext with its 16-byte tag.
pub fn seal(key_bytes: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, MnemoError> {
    let sealing = key(key_bytes)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| MnemoError::Internal("failed to generate random nonce".to_string()))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    // Seal in place: the buffer is extended with the authentication tag.
    let mut in_out = plaintext.to_vec();
    sealing
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| MnemoError::Internal("AES-256-GCM encryption failed".to_string()))?;

    let mut payload = Vec::with_capacity(NONCE_LEN + in_out.len());
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&in_out);
    Ok(payload)
}

/// Decrypt a payload produced by [`seal`].
///
/// Fails on a truncated payload, a wrong key, or tampered data.
pub fn open(key_bytes: &[u8; 32], payload: &[u8]) -> Result<Vec<u8>, MnemoError> {
    if payload.len() < NONCE_LEN + TAG_LEN {
        return Err(MnemoError::Decrypt(format!(
            "payload of {} bytes is shorter than nonce and tag",
            payload.len()
        )));
    }
    let opening = key(key_bytes)?;

    let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| MnemoError::Decrypt("invalid nonce".to_string()))?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            MnemoError::Decrypt("AES-256-GCM decryption failed -- wrong key or corrupted data".to_string())
        })?;

    Ok(plaintext.to_vec())
}

/// Generate a random 32-byte key suitable for AES-256-GCM.
pub fn generate_random_key() -> Result<[u8; 32], MnemoError> {
    let mut key = [0u8; 32];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| MnemoError::Internal("failed to generate random key".to_string()))?;
    Ok(key)
}
