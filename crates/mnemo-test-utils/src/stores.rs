// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory collaborator stores and an event-recording sink.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;

use mnemo_core::types::{
    ChatRole, ContentType, HistoryMessage, KnowledgeFilter, KnowledgeRecord, TurnEvent,
    VectorFilter, VectorMatch,
};
use mnemo_core::{
    ChatHistoryStore, EventSink, KnowledgeStore, MnemoError, SessionPinStore, VectorStore,
};

/// Build a plaintext markdown knowledge record in space `space-1`.
pub fn knowledge(id: &str, content: &str) -> KnowledgeRecord {
    KnowledgeRecord {
        id: id.to_string(),
        space_id: "space-1".to_string(),
        user_id: "user-1".to_string(),
        resource: "knowledge".to_string(),
        title: format!("note {id}"),
        content_type: ContentType::Markdown,
        content: content.as_bytes().to_vec(),
        encrypted: false,
        masks: HashMap::new(),
        created_at: Utc
            .with_ymd_and_hms(2026, 1, 15, 9, 0, 0)
            .single()
            .unwrap_or_default(),
    }
}

/// Build a vector match in space `space-1`.
pub fn vector_match(id: &str, score: f32, original_length: usize) -> VectorMatch {
    VectorMatch {
        knowledge_id: id.to_string(),
        score,
        space_id: "space-1".to_string(),
        user_id: "user-1".to_string(),
        original_length,
    }
}

/// Build a history message; `created_at` is derived from `seq`.
pub fn history_message(session_id: &str, seq: i64, role: ChatRole, content: &str) -> HistoryMessage {
    HistoryMessage {
        id: format!("{session_id}-{seq}"),
        session_id: session_id.to_string(),
        role,
        content: content.to_string(),
        created_at: Utc.timestamp_opt(1_760_000_000 + seq, 0).single().unwrap_or_default(),
    }
}

/// Vector store over a fixed match list.
#[derive(Default)]
pub struct InMemoryVectorStore {
    matches: Vec<VectorMatch>,
    fail: Option<String>,
    queries: Mutex<Vec<(VectorFilter, usize)>>,
}

impl InMemoryVectorStore {
    pub fn new(matches: Vec<VectorMatch>) -> Self {
        Self {
            matches,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Every `(filter, top_k)` received.
    pub async fn queries(&self) -> Vec<(VectorFilter, usize)> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn query(
        &self,
        filter: &VectorFilter,
        _vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, MnemoError> {
        self.queries.lock().await.push((filter.clone(), top_k));
        if let Some(msg) = &self.fail {
            return Err(MnemoError::VectorStore {
                source: msg.clone().into(),
            });
        }

        let mut out: Vec<VectorMatch> = self
            .matches
            .iter()
            .filter(|m| m.space_id == filter.space_id)
            .filter(|m| filter.user_id.as_ref().is_none_or(|u| &m.user_id == u))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.score.total_cmp(&a.score));
        out.truncate(top_k);
        Ok(out)
    }
}

/// Knowledge store returning records in insertion order, not request order.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    records: Vec<KnowledgeRecord>,
    fail: Option<String>,
}

impl InMemoryKnowledgeStore {
    pub fn new(records: Vec<KnowledgeRecord>) -> Self {
        Self {
            records,
            fail: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            records: Vec::new(),
            fail: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn list_knowledges(
        &self,
        filter: &KnowledgeFilter,
    ) -> Result<Vec<KnowledgeRecord>, MnemoError> {
        if let Some(msg) = &self.fail {
            return Err(MnemoError::Storage {
                source: msg.clone().into(),
            });
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.space_id == filter.space_id && filter.ids.contains(&r.id))
            .cloned()
            .collect())
    }
}

/// Session history held in memory, oldest first.
#[derive(Default)]
pub struct InMemoryHistory {
    messages: Vec<HistoryMessage>,
}

impl InMemoryHistory {
    pub fn new(messages: Vec<HistoryMessage>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl ChatHistoryStore for InMemoryHistory {
    async fn list_session_messages_up_to(
        &self,
        session_id: &str,
        window: usize,
    ) -> Result<Vec<HistoryMessage>, MnemoError> {
        let session: Vec<_> = self
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        let skip = session.len().saturating_sub(window);
        Ok(session.into_iter().skip(skip).collect())
    }
}

/// Pinned knowledge IDs per session.
#[derive(Default)]
pub struct InMemoryPins {
    pins: HashMap<String, Vec<String>>,
}

impl InMemoryPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pins(mut self, session_id: &str, ids: &[&str]) -> Self {
        self.pins.insert(
            session_id.to_string(),
            ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl SessionPinStore for InMemoryPins {
    async fn get_by_session(&self, session_id: &str) -> Result<Vec<String>, MnemoError> {
        Ok(self.pins.get(session_id).cloned().unwrap_or_default())
    }
}

/// Outbound push sink that records every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TurnEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<TurnEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: TurnEvent) -> Result<(), MnemoError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
