// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One RAG chat turn: history, enhancement, retrieval, prompt, generation.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use mnemo_config::model::{RagConfig, StreamConfig};
use mnemo_context::{PromptKind, PromptVars, SpacePrompt};
use mnemo_core::types::{
    ChatMessage, ChatRole, HistoryMessage, ResourceFilter, ToolStatus, ToolTip, TurnEvent,
    UsageRecord,
};
use mnemo_core::{ChatHistoryStore, EventSink, MnemoError};
use mnemo_retrieval::{
    condense_history, EnhancedQuery, KnowledgeRetriever, QueryEnhancer, RerankStatus,
    RetrievalRequest,
};
use mnemo_router::ProviderRouter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mask::MaskMap;
use crate::stream::{spawn_processor, ProcessorConfig, ResponseStream};

const TOOL_SEARCH: &str = "knowledge_search";
const TOOL_ENHANCE: &str = "enhance_query";
const TOOL_RERANK: &str = "rerank";

/// Inputs of one chat turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub space_id: String,
    pub user_id: String,
    pub session_id: String,
    pub query: String,
    pub resource_filter: ResourceFilter,
    /// Id carried by every increment of the generated reply.
    pub message_id: String,
    /// Prompt language; the query driver's language when `None`.
    pub lang: Option<String>,
    pub space_prompt: Option<SpacePrompt>,
    /// Reference time for the prompt's time table; now (UTC) when `None`.
    pub now: Option<DateTime<FixedOffset>>,
}

impl TurnRequest {
    pub fn new(
        space_id: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        let session_id = session_id.into();
        Self {
            space_id: space_id.into(),
            user_id: user_id.into(),
            message_id: format!("{session_id}:reply"),
            session_id,
            query: query.into(),
            resource_filter: ResourceFilter::default(),
            lang: None,
            space_prompt: None,
            now: None,
        }
    }

    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = id.into();
        self
    }

    pub fn resources(mut self, filter: ResourceFilter) -> Self {
        self.resource_filter = filter;
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn space_prompt(mut self, prompt: SpacePrompt) -> Self {
        self.space_prompt = Some(prompt);
        self
    }

    pub fn at(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }
}

/// A started turn. Generation continues in the background on `stream`.
pub struct TurnOutcome {
    pub stream: ResponseStream,
    pub enhanced: EnhancedQuery,
    /// Evidence ids in prompt order.
    pub evidence: Vec<String>,
    pub rerank: RerankStatus,
    /// Usage of the enhancement and retrieval steps. Chat usage arrives on
    /// the stream as a usage increment.
    pub usage: Vec<UsageRecord>,
}

/// Runs RAG turns against one router and set of stores.
pub struct RagPipeline {
    router: Arc<ProviderRouter>,
    enhancer: QueryEnhancer,
    retriever: KnowledgeRetriever,
    history: Arc<dyn ChatHistoryStore>,
    sink: Option<Arc<dyn EventSink>>,
    rag: RagConfig,
    stream: ProcessorConfig,
}

impl RagPipeline {
    pub fn new(
        router: Arc<ProviderRouter>,
        retriever: KnowledgeRetriever,
        history: Arc<dyn ChatHistoryStore>,
        rag: &RagConfig,
        stream: &StreamConfig,
    ) -> Self {
        Self {
            enhancer: QueryEnhancer::new(Arc::clone(&router), rag),
            router,
            retriever,
            history,
            sink: None,
            rag: rag.clone(),
            stream: ProcessorConfig::from(stream),
        }
    }

    /// Tool tips are pushed to `sink` while the turn is prepared.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Prepares the turn and starts generation.
    ///
    /// Errors before generation starts (embedding, vector store, hydration,
    /// opening the chat stream) fail the turn. Enhancement and rerank failures
    /// degrade. Once the stream is open, failures arrive as a terminal
    /// increment instead. Cancelling `cancel` stops the turn at the next step
    /// boundary or, during generation, ends the stream with a cancelled increment.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, MnemoError> {
        let now = request.now.unwrap_or_else(|| Utc::now().fixed_offset());
        let lang = request
            .lang
            .clone()
            .unwrap_or_else(|| self.router.lang().to_string());

        let history = self.load_history(&request).await;
        ensure_live(&cancel)?;

        let enhanced = self.enhance(&request, &history, &lang, now).await;
        ensure_live(&cancel)?;

        self.tool_tip(&request, TOOL_SEARCH, ToolStatus::Running, "searching knowledge base")
            .await;
        let retrieval = RetrievalRequest::new(&request.space_id, enhanced.result_query())
            .user(&request.user_id)
            .rerank_query(&request.query)
            .resources(request.resource_filter.clone())
            .session(&request.session_id);
        let outcome = match self.retriever.retrieve(&retrieval).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.tool_tip(&request, TOOL_SEARCH, ToolStatus::Failed, &e.to_string())
                    .await;
                return Err(e);
            }
        };
        self.tool_tip(
            &request,
            TOOL_SEARCH,
            ToolStatus::Success,
            &format!("{} documents", outcome.docs.len()),
        )
        .await;
        if outcome.rerank == RerankStatus::Degraded {
            self.tool_tip(
                &request,
                TOOL_RERANK,
                ToolStatus::Failed,
                "rerank unavailable, using retrieval order",
            )
            .await;
        }
        ensure_live(&cancel)?;

        let transcript = condense_history(&history, self.rag.assistant_truncate_chars);
        let vars = PromptVars::new(now)
            .with_query(&request.query)
            .with_history(transcript);
        let system = self.router.prompts().build_for_space(
            PromptKind::Rag,
            &lang,
            &vars,
            &outcome.docs,
            request.space_prompt.as_ref(),
        );
        let masks = MaskMap::from_docs(&outcome.docs);

        let mut messages = to_chat_messages(&history);
        messages.push(ChatMessage::user(&request.query));
        let tokens = self
            .router
            .new_query(Some(system), messages)?
            .stream()
            .await?;

        info!(
            user_id = %request.user_id,
            session_id = %request.session_id,
            message_id = %request.message_id,
            enhanced = enhanced.is_enhanced(),
            evidence = outcome.docs.len(),
            masks = masks.len(),
            "generation started"
        );

        let stream = spawn_processor(&request.message_id, tokens, masks, self.stream, cancel);

        let mut usage: Vec<UsageRecord> = enhanced.usage_record().into_iter().collect();
        usage.extend(outcome.usage.iter().cloned());

        Ok(TurnOutcome {
            stream,
            evidence: outcome.docs.iter().map(|d| d.id.clone()).collect(),
            rerank: outcome.rerank,
            enhanced,
            usage,
        })
    }

    /// Prior messages of the session. The current query is dropped if the
    /// store already recorded it. Store failures leave the turn without history.
    async fn load_history(&self, request: &TurnRequest) -> Vec<HistoryMessage> {
        let mut history = match self
            .history
            .list_session_messages_up_to(&request.session_id, self.rag.history_window)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(session_id = %request.session_id, error = %e, "history unavailable");
                Vec::new()
            }
        };
        if let Some(last) = history.last()
            && last.role == ChatRole::User
            && last.content.trim() == request.query.trim()
        {
            history.pop();
        }
        history
    }

    async fn enhance(
        &self,
        request: &TurnRequest,
        history: &[HistoryMessage],
        lang: &str,
        now: DateTime<FixedOffset>,
    ) -> EnhancedQuery {
        let timeout = self.rag.enhance_timeout();
        let attempt =
            tokio::time::timeout(timeout, self.enhancer.enhance(&request.query, history, lang, now))
                .await
                .unwrap_or(Err(MnemoError::Timeout { duration: timeout }));
        match attempt {
            Ok(enhanced) => {
                debug!(alternatives = enhanced.alternatives.len(), "enhancement done");
                enhanced
            }
            Err(e) => {
                warn!(error = %e, "query enhancement failed, using original query");
                self.tool_tip(request, TOOL_ENHANCE, ToolStatus::Failed, "using original query")
                    .await;
                EnhancedQuery::passthrough(&request.query)
            }
        }
    }

    async fn tool_tip(&self, request: &TurnRequest, tool: &str, status: ToolStatus, detail: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        let tip = ToolTip {
            message_id: request.message_id.clone(),
            tool: tool.to_string(),
            status,
            detail: detail.to_string(),
        };
        if let Err(e) = sink.emit(TurnEvent::ToolTip(tip)).await {
            warn!(tool, error = %e, "failed to push tool tip");
        }
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), MnemoError> {
    if cancel.is_cancelled() {
        Err(MnemoError::Cancelled)
    } else {
        Ok(())
    }
}

fn to_chat_messages(history: &[HistoryMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter_map(|m| match m.role {
            ChatRole::User => Some(ChatMessage::user(&m.content)),
            ChatRole::Assistant => Some(ChatMessage::assistant(&m.content)),
            ChatRole::System => None,
        })
        .collect()
}
