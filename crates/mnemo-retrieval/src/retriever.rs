// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge retriever: embed, search, threshold, hydrate, rerank, pin.
//!
//! 1. Embeds the query text (fails fast on error or zero vectors)
//! 2. Runs a similarity search bounded to `top_k`
//! 3. Applies the adaptive cutoff and dedups by knowledge id
//! 4. Hydrates surviving ids: decrypts and normalizes content
//! 5. Reranks, falling back to retrieval order on failure or timeout
//! 6. Re-inserts high-score ids the reranker dropped
//! 7. Appends pinned session documents not already present

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use mnemo_config::model::RagConfig;
use mnemo_core::types::{
    EvidenceDoc, KnowledgeFilter, KnowledgeRecord, RerankDoc, UsageRecord, VectorFilter,
};
use mnemo_core::{
    ContentDecryptor, KnowledgeStore, MarkdownNormalizer, MnemoError, SessionPinStore,
    VectorStore,
};
use mnemo_router::ProviderRouter;
use tracing::{debug, info, warn};

use crate::normalize::BasicNormalizer;
use crate::threshold::{filter_candidates, ThresholdPolicy};
use crate::types::{CandidateSet, RerankStatus, RetrievalOutcome, RetrievalRequest};

/// Subject of the embedding usage record.
const EMBEDDING_SUBJECT: &str = "embedding";
const RERANK_SUBJECT: &str = "rerank";

/// Retrieves evidence for a query from the knowledge base.
pub struct KnowledgeRetriever {
    router: Arc<ProviderRouter>,
    vectors: Arc<dyn VectorStore>,
    knowledge: Arc<dyn KnowledgeStore>,
    pins: Option<Arc<dyn SessionPinStore>>,
    decryptor: Option<Arc<dyn ContentDecryptor>>,
    normalizer: Arc<dyn MarkdownNormalizer>,
    policy: ThresholdPolicy,
    top_k: usize,
    embed_timeout: Duration,
    rerank_timeout: Duration,
}

impl KnowledgeRetriever {
    pub fn new(
        router: Arc<ProviderRouter>,
        vectors: Arc<dyn VectorStore>,
        knowledge: Arc<dyn KnowledgeStore>,
        config: &RagConfig,
    ) -> Self {
        Self {
            router,
            vectors,
            knowledge,
            pins: None,
            decryptor: None,
            normalizer: Arc::new(BasicNormalizer),
            policy: ThresholdPolicy::from(config),
            top_k: config.top_k,
            embed_timeout: config.embed_timeout(),
            rerank_timeout: config.rerank_timeout(),
        }
    }

    pub fn with_pins(mut self, pins: Arc<dyn SessionPinStore>) -> Self {
        self.pins = Some(pins);
        self
    }

    /// Without a decryptor, encrypted records fail hydration.
    pub fn with_decryptor(mut self, decryptor: Arc<dyn ContentDecryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn MarkdownNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalOutcome, MnemoError> {
        let mut usage = Vec::new();

        // Step 1: embed
        let vector = self.embed_query(&request.query, &mut usage).await?;

        // Step 2: similarity search
        let filter = VectorFilter {
            space_id: request.space_id.clone(),
            user_id: request.user_id.clone(),
            resources: request.resource_filter.resources.clone(),
        };
        let matches = self.vectors.query(&filter, &vector, self.top_k).await?;
        let raw_count = matches.len();

        // Step 3: threshold + dedup
        let candidates = filter_candidates(matches, &self.policy);
        debug!(
            raw = raw_count,
            kept = candidates.matches.len(),
            cutoff = candidates.cutoff,
            "vector matches filtered"
        );

        // Step 4: hydrate
        let mut hydrated = if candidates.is_empty() {
            Vec::new()
        } else {
            self.hydrate(&request.space_id, &candidates).await?
        };

        // Steps 5-6: rerank and restore high-score ids
        let rerank_query = request.rerank_query.as_deref().unwrap_or(&request.query);
        let (rerank, dropped) = self.rerank(rerank_query, &mut hydrated, &mut usage).await;
        let missing_high_score = restore_high_score(&candidates, &mut hydrated, dropped);

        // Step 7: pinned documents
        let pinned = match &request.session_id {
            Some(session_id) => {
                self.append_pinned(&request.space_id, session_id, &mut hydrated)
                    .await?
            }
            None => 0,
        };

        info!(
            space = request.space_id,
            docs = hydrated.len(),
            pinned,
            rerank = ?rerank,
            missing_high_score,
            "retrieval complete"
        );

        Ok(RetrievalOutcome {
            candidates,
            docs: hydrated,
            usage,
            rerank,
            missing_high_score,
            pinned,
        })
    }

    async fn embed_query(
        &self,
        query: &str,
        usage: &mut Vec<UsageRecord>,
    ) -> Result<Vec<f32>, MnemoError> {
        let texts = [query.to_string()];
        let output = tokio::time::timeout(self.embed_timeout, self.router.embedding_for_query(&texts))
            .await
            .map_err(|_| MnemoError::Timeout {
                duration: self.embed_timeout,
            })?
            .map_err(|e| match e {
                MnemoError::Embedding(_) | MnemoError::Unsupported { .. } => e,
                other => MnemoError::Embedding(other.to_string()),
            })?;

        usage.push(UsageRecord::new(EMBEDDING_SUBJECT, output.model.clone(), output.usage));
        output
            .vectors
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MnemoError::Embedding("embedding returned no vectors".to_string()))
    }

    /// Loads records for the candidate ids, in candidate order.
    async fn hydrate(
        &self,
        space_id: &str,
        candidates: &CandidateSet,
    ) -> Result<Vec<EvidenceDoc>, MnemoError> {
        let records = self
            .knowledge
            .list_knowledges(&KnowledgeFilter {
                space_id: space_id.to_string(),
                ids: candidates.ids(),
            })
            .await?;
        let mut by_id: HashMap<String, KnowledgeRecord> =
            records.into_iter().map(|r| (r.id.clone(), r)).collect();

        let mut docs = Vec::with_capacity(by_id.len());
        for candidate in &candidates.matches {
            let Some(record) = by_id.remove(&candidate.knowledge_id) else {
                debug!(id = candidate.knowledge_id, "candidate has no knowledge record");
                continue;
            };
            let mut doc = self.to_evidence(record)?;
            doc.score = Some(candidate.score);
            docs.push(doc);
        }
        Ok(docs)
    }

    /// Decrypts and normalizes one record.
    fn to_evidence(&self, record: KnowledgeRecord) -> Result<EvidenceDoc, MnemoError> {
        let text = if record.encrypted {
            let decryptor = self.decryptor.as_ref().ok_or_else(|| {
                MnemoError::Decrypt(format!(
                    "knowledge {} is encrypted but no content key is configured",
                    record.id
                ))
            })?;
            let plain = decryptor.decrypt(&record.content)?;
            String::from_utf8(plain).map_err(|_| {
                MnemoError::Decrypt(format!("knowledge {} decrypted to invalid UTF-8", record.id))
            })?
        } else {
            String::from_utf8_lossy(&record.content).into_owned()
        };
        let content = self.normalizer.normalize(record.content_type, &text)?;

        Ok(EvidenceDoc {
            id: record.id,
            resource: record.resource,
            title: record.title,
            content,
            created_at: record.created_at,
            score: None,
            pinned: false,
            masks: record.masks,
        })
    }

    /// Reorders `docs` by reranker score and returns the documents it dropped.
    ///
    /// `docs` is left untouched unless the call succeeds.
    async fn rerank(
        &self,
        query: &str,
        docs: &mut Vec<EvidenceDoc>,
        usage: &mut Vec<UsageRecord>,
    ) -> (RerankStatus, Vec<EvidenceDoc>) {
        if docs.len() < 2 {
            return (RerankStatus::Skipped, Vec::new());
        }
        let reranker = match self.router.resolve_rerank() {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "no rerank driver, keeping retrieval order");
                return (RerankStatus::Skipped, Vec::new());
            }
        };

        let inputs: Vec<RerankDoc> = docs
            .iter()
            .map(|d| RerankDoc {
                id: d.id.clone(),
                content: d.content.clone(),
            })
            .collect();

        let call = tokio::time::timeout(self.rerank_timeout, reranker.rerank(query, &inputs));
        let output = match call.await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "rerank failed, keeping retrieval order");
                return (RerankStatus::Degraded, Vec::new());
            }
            Err(_) => {
                warn!(timeout = ?self.rerank_timeout, "rerank timed out, keeping retrieval order");
                return (RerankStatus::Degraded, Vec::new());
            }
        };
        usage.push(UsageRecord::new(RERANK_SUBJECT, output.model.clone(), output.usage));

        let original = std::mem::take(docs);
        let mut pool: HashMap<String, EvidenceDoc> =
            original.iter().map(|d| (d.id.clone(), d.clone())).collect();
        for ranked in output.results {
            // Unknown or repeated ids are ignored; the reranker never adds documents.
            if let Some(mut doc) = pool.remove(&ranked.id) {
                doc.score = Some(ranked.score);
                docs.push(doc);
            }
        }

        let dropped: Vec<EvidenceDoc> = original
            .into_iter()
            .filter(|d| pool.contains_key(&d.id))
            .collect();
        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), "reranker dropped documents");
        }
        (RerankStatus::Applied, dropped)
    }

    /// Loads pinned documents for a session and appends the ones not yet present.
    async fn append_pinned(
        &self,
        space_id: &str,
        session_id: &str,
        docs: &mut Vec<EvidenceDoc>,
    ) -> Result<usize, MnemoError> {
        let Some(pins) = &self.pins else {
            return Ok(0);
        };
        let present: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        let mut wanted: Vec<String> = Vec::new();
        for id in pins.get_by_session(session_id).await? {
            if !present.contains(id.as_str()) && !wanted.contains(&id) {
                wanted.push(id);
            }
        }
        if wanted.is_empty() {
            return Ok(0);
        }

        let records = self
            .knowledge
            .list_knowledges(&KnowledgeFilter {
                space_id: space_id.to_string(),
                ids: wanted.clone(),
            })
            .await?;
        let mut by_id: HashMap<String, KnowledgeRecord> =
            records.into_iter().map(|r| (r.id.clone(), r)).collect();

        let mut added = 0;
        for id in wanted {
            if let Some(record) = by_id.remove(&id) {
                let mut doc = self.to_evidence(record)?;
                doc.pinned = true;
                docs.push(doc);
                added += 1;
            }
        }
        Ok(added)
    }
}

/// Appends high-score candidates absent from `docs`, taking them from the
/// documents the reranker dropped. Returns how many could not be restored
/// because they were never hydrated.
fn restore_high_score(
    candidates: &CandidateSet,
    docs: &mut Vec<EvidenceDoc>,
    dropped: Vec<EvidenceDoc>,
) -> usize {
    let mut dropped: HashMap<String, EvidenceDoc> =
        dropped.into_iter().map(|d| (d.id.clone(), d)).collect();
    let mut missing = 0;

    for high in &candidates.high_score {
        if docs.iter().any(|d| d.id == high.knowledge_id) {
            continue;
        }
        match dropped.remove(&high.knowledge_id) {
            Some(mut doc) => {
                debug!(id = high.knowledge_id, "re-inserting high-score document");
                doc.score = Some(high.score);
                docs.push(doc);
            }
            None => {
                warn!(id = high.knowledge_id, "high-score document missing from knowledge store, skipping");
                missing += 1;
            }
        }
    }
    missing
}
