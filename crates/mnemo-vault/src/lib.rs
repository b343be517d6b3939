// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM knowledge content decryption for the mnemo knowledge assistant.
//!
//! Encrypted knowledge is stored as `nonce || ciphertext+tag`. [`ContentCipher`]
//! implements the pipeline's `ContentDecryptor` collaborator and can also seal
//! content for ingestion.

pub mod cipher;
pub mod crypto;

pub use cipher::ContentCipher;
