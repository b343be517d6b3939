// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driver registry keyed by lowercase name.
//!
//! Each registered driver is probed once for the capability traits it implements;
//! the resulting handles are stored in a [`DriverEntry`] and never re-evaluated.

use std::collections::HashMap;
use std::sync::Arc;

use mnemo_core::types::Capability;
use mnemo_core::{
    ChatCapable, Driver, EmbeddingCapable, MnemoError, ReaderCapable, RerankCapable, VisionCapable,
};

/// One registered driver and the capability handles it exposed at registration.
#[derive(Clone)]
pub struct DriverEntry {
    /// Lowercased registry name.
    pub name: String,
    pub lang: String,
    pub chat: Option<Arc<dyn ChatCapable>>,
    pub embedding: Option<Arc<dyn EmbeddingCapable>>,
    pub rerank: Option<Arc<dyn RerankCapable>>,
    pub vision: Option<Arc<dyn VisionCapable>>,
    pub reader: Option<Arc<dyn ReaderCapable>>,
}

impl DriverEntry {
    fn from_driver(driver: Arc<dyn Driver>) -> Self {
        Self {
            name: driver.name().to_ascii_lowercase(),
            lang: driver.lang().to_string(),
            chat: Arc::clone(&driver).as_chat(),
            embedding: Arc::clone(&driver).as_embedding(),
            rerank: Arc::clone(&driver).as_rerank(),
            vision: Arc::clone(&driver).as_vision(),
            reader: driver.as_reader(),
        }
    }

    /// Whether this driver can serve `capability`. Enhance rides on chat.
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Chat | Capability::Enhance => self.chat.is_some(),
            Capability::Embedding => self.embedding.is_some(),
            Capability::Rerank => self.rerank.is_some(),
            Capability::Vision => self.vision.is_some(),
            Capability::Reader => self.reader.is_some(),
        }
    }

    /// All capabilities this driver serves, in [`Capability::ALL`] order.
    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.supports(*c))
            .collect()
    }
}

impl std::fmt::Debug for DriverEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverEntry")
            .field("name", &self.name)
            .field("lang", &self.lang)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Registry of drivers in registration order.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    entries: Vec<DriverEntry>,
    by_name: HashMap<String, usize>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver. Names are case-insensitive; a duplicate name is an error.
    pub fn register(&mut self, driver: Arc<dyn Driver>) -> Result<(), MnemoError> {
        let entry = DriverEntry::from_driver(driver);
        if entry.name.is_empty() {
            return Err(MnemoError::Config("driver name must not be empty".into()));
        }
        if self.by_name.contains_key(&entry.name) {
            return Err(MnemoError::Config(format!(
                "driver `{}` registered twice",
                entry.name
            )));
        }
        self.by_name.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DriverEntry> {
        self.by_name
            .get(&name.trim().to_ascii_lowercase())
            .map(|&i| &self.entries[i])
    }

    /// First-registered driver supporting `capability`.
    pub fn first_supporting(&self, capability: Capability) -> Option<&DriverEntry> {
        self.entries.iter().find(|e| e.supports(capability))
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[DriverEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
