// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted language-model driver for deterministic testing.
//!
//! `MockDriver` implements every capability trait with pre-configured
//! replies popped from FIFO queues, and records what it was asked.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Mutex;

use mnemo_core::types::{
    Capability, ChatRequest, ChatResponse, EmbeddingOutput, ReaderOutput, RerankDoc,
    RerankOutput, RerankedDoc, StreamToken, TokenUsage,
};
use mnemo_core::{
    ChatCapable, Driver, EmbeddingCapable, MnemoError, ReaderCapable, RerankCapable,
    TokenStream, VisionCapable,
};

/// Usage reported by every scripted call.
pub const MOCK_USAGE: TokenUsage = TokenUsage {
    input_tokens: 10,
    output_tokens: 20,
};

/// One scripted step of a streaming reply.
#[derive(Debug, Clone)]
pub enum StreamStep {
    Token(StreamToken),
    /// Yield a transport error.
    Fail(String),
    /// Sleep before the next step (pairs with `tokio::time::pause`).
    Delay(Duration),
    /// Never yield again; the stream only ends when dropped.
    Hang,
}

impl StreamStep {
    pub fn content(text: &str) -> Self {
        StreamStep::Token(StreamToken::content(text))
    }

    pub fn reasoning(text: &str) -> Self {
        StreamStep::Token(StreamToken::reasoning(text))
    }

    pub fn finish(reason: &str) -> Self {
        StreamStep::Token(StreamToken::finish(reason))
    }

    pub fn usage(model: &str) -> Self {
        StreamStep::Token(StreamToken::usage(model, MOCK_USAGE))
    }
}

#[derive(Debug, Clone)]
enum Reply<T> {
    Ok(T),
    Fail(String),
}

/// Counts live and dropped scripted streams.
#[derive(Debug, Default)]
pub struct StreamTracker {
    opened: AtomicUsize,
    dropped: AtomicUsize,
}

impl StreamTracker {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet released.
    pub fn live(&self) -> usize {
        self.opened() - self.dropped()
    }
}

struct StreamGuard(Arc<StreamTracker>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// A mock driver with scripted chat, stream, embedding, and rerank replies.
pub struct MockDriver {
    name: String,
    lang: String,
    model: String,
    capabilities: HashSet<Capability>,
    chat: Mutex<VecDeque<Reply<String>>>,
    streams: Mutex<VecDeque<Vec<StreamStep>>>,
    embeddings: Mutex<VecDeque<Reply<Vec<Vec<f32>>>>>,
    reranks: Mutex<VecDeque<Reply<Vec<RerankedDoc>>>>,
    requests: Mutex<Vec<ChatRequest>>,
    embed_inputs: Mutex<Vec<Vec<String>>>,
    chat_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    rerank_calls: AtomicUsize,
    tracker: Arc<StreamTracker>,
}

impl MockDriver {
    /// A driver named `name` serving chat, embedding, rerank, and vision.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lang: "en".to_string(),
            model: format!("{}-model", name.to_ascii_lowercase()),
            capabilities: [
                Capability::Chat,
                Capability::Embedding,
                Capability::Rerank,
                Capability::Vision,
            ]
            .into_iter()
            .collect(),
            chat: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            embeddings: Mutex::new(VecDeque::new()),
            reranks: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            embed_inputs: Mutex::new(Vec::new()),
            chat_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            rerank_calls: AtomicUsize::new(0),
            tracker: Arc::new(StreamTracker::default()),
        }
    }

    /// Restrict the advertised capabilities.
    pub fn with_capabilities(mut self, caps: &[Capability]) -> Self {
        self.capabilities = caps.iter().copied().collect();
        self
    }

    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = lang.to_string();
        self
    }

    pub fn with_chat_reply(mut self, text: &str) -> Self {
        self.chat.get_mut().push_back(Reply::Ok(text.to_string()));
        self
    }

    pub fn with_chat_failure(mut self, message: &str) -> Self {
        self.chat.get_mut().push_back(Reply::Fail(message.to_string()));
        self
    }

    pub fn with_stream(mut self, steps: Vec<StreamStep>) -> Self {
        self.streams.get_mut().push_back(steps);
        self
    }

    pub fn with_embedding(mut self, vectors: Vec<Vec<f32>>) -> Self {
        self.embeddings.get_mut().push_back(Reply::Ok(vectors));
        self
    }

    pub fn with_embedding_failure(mut self, message: &str) -> Self {
        self.embeddings
            .get_mut()
            .push_back(Reply::Fail(message.to_string()));
        self
    }

    /// Ranked `(id, score)` pairs returned by the next rerank call.
    pub fn with_rerank(mut self, ranked: &[(&str, f32)]) -> Self {
        let docs = ranked
            .iter()
            .map(|(id, score)| RerankedDoc {
                id: id.to_string(),
                score: *score,
            })
            .collect();
        self.reranks.get_mut().push_back(Reply::Ok(docs));
        self
    }

    pub fn with_rerank_failure(mut self, message: &str) -> Self {
        self.reranks
            .get_mut()
            .push_back(Reply::Fail(message.to_string()));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Number of `complete` and `stream` calls.
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn rerank_calls(&self) -> usize {
        self.rerank_calls.load(Ordering::SeqCst)
    }

    /// Every chat request received, in order.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }

    /// Every text batch handed to an embedding call, in order.
    pub async fn embed_inputs(&self) -> Vec<Vec<String>> {
        self.embed_inputs.lock().await.clone()
    }

    pub fn streams(&self) -> Arc<StreamTracker> {
        Arc::clone(&self.tracker)
    }

    async fn record(&self, request: &ChatRequest) {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
    }

    fn response(&self, content: String) -> ChatResponse {
        ChatResponse {
            id: format!("mock-{}", self.chat_calls()),
            content,
            reasoning: None,
            model: self.model.clone(),
            finish_reason: Some("stop".to_string()),
            usage: MOCK_USAGE,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingOutput, MnemoError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.embed_inputs.lock().await.push(texts.to_vec());
        let scripted = self.embeddings.lock().await.pop_front();
        let vectors = match scripted {
            Some(Reply::Ok(v)) => v,
            Some(Reply::Fail(msg)) => return Err(MnemoError::provider(msg)),
            None => texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect(),
        };
        Ok(EmbeddingOutput {
            vectors,
            model: self.model.clone(),
            usage: MOCK_USAGE,
        })
    }
}

impl Driver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn lang(&self) -> &str {
        &self.lang
    }

    fn as_chat(self: Arc<Self>) -> Option<Arc<dyn ChatCapable>> {
        self.capabilities
            .contains(&Capability::Chat)
            .then(|| self as Arc<dyn ChatCapable>)
    }

    fn as_embedding(self: Arc<Self>) -> Option<Arc<dyn EmbeddingCapable>> {
        self.capabilities
            .contains(&Capability::Embedding)
            .then(|| self as Arc<dyn EmbeddingCapable>)
    }

    fn as_rerank(self: Arc<Self>) -> Option<Arc<dyn RerankCapable>> {
        self.capabilities
            .contains(&Capability::Rerank)
            .then(|| self as Arc<dyn RerankCapable>)
    }

    fn as_vision(self: Arc<Self>) -> Option<Arc<dyn VisionCapable>> {
        self.capabilities
            .contains(&Capability::Vision)
            .then(|| self as Arc<dyn VisionCapable>)
    }

    fn as_reader(self: Arc<Self>) -> Option<Arc<dyn ReaderCapable>> {
        self.capabilities
            .contains(&Capability::Reader)
            .then(|| self as Arc<dyn ReaderCapable>)
    }
}

#[async_trait]
impl ChatCapable for MockDriver {
    fn driver_name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, MnemoError> {
        self.record(&request).await;
        match self.chat.lock().await.pop_front() {
            Some(Reply::Ok(text)) => Ok(self.response(text)),
            Some(Reply::Fail(msg)) => Err(MnemoError::provider(msg)),
            None => Ok(self.response("mock response".to_string())),
        }
    }

    async fn stream(&self, request: ChatRequest) -> Result<TokenStream, MnemoError> {
        self.record(&request).await;
        let steps = self.streams.lock().await.pop_front().unwrap_or_else(|| {
            vec![
                StreamStep::content("mock response"),
                StreamStep::finish("stop"),
                StreamStep::usage(&self.model),
            ]
        });

        self.tracker.opened.fetch_add(1, Ordering::SeqCst);
        let guard = StreamGuard(Arc::clone(&self.tracker));
        let state = (VecDeque::from(steps), guard);

        let tokens = stream::unfold(state, |(mut steps, guard)| async move {
            loop {
                match steps.pop_front()? {
                    StreamStep::Token(token) => return Some((Ok(token), (steps, guard))),
                    StreamStep::Fail(msg) => {
                        return Some((Err(MnemoError::provider(msg)), (steps, guard)));
                    }
                    StreamStep::Delay(d) => tokio::time::sleep(d).await,
                    StreamStep::Hang => futures::future::pending::<()>().await,
                }
            }
        });
        Ok(Box::pin(tokens))
    }
}

#[async_trait]
impl EmbeddingCapable for MockDriver {
    fn driver_name(&self) -> &str {
        &self.name
    }

    async fn embed_query(&self, texts: &[String]) -> Result<EmbeddingOutput, MnemoError> {
        self.embed(texts).await
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<EmbeddingOutput, MnemoError> {
        self.embed(texts).await
    }
}

#[async_trait]
impl RerankCapable for MockDriver {
    fn driver_name(&self) -> &str {
        &self.name
    }

    async fn rerank(&self, _query: &str, docs: &[RerankDoc]) -> Result<RerankOutput, MnemoError> {
        self.rerank_calls.fetch_add(1, Ordering::SeqCst);
        let results = match self.reranks.lock().await.pop_front() {
            Some(Reply::Ok(ranked)) => ranked,
            Some(Reply::Fail(msg)) => return Err(MnemoError::Rerank { message: msg }),
            None => docs
                .iter()
                .enumerate()
                .map(|(i, d)| RerankedDoc {
                    id: d.id.clone(),
                    score: 1.0 - i as f32 * 0.01,
                })
                .collect(),
        };
        Ok(RerankOutput {
            results,
            model: self.model.clone(),
            usage: MOCK_USAGE,
        })
    }
}

#[async_trait]
impl VisionCapable for MockDriver {
    fn driver_name(&self) -> &str {
        &self.name
    }

    async fn complete_vision(&self, request: ChatRequest) -> Result<ChatResponse, MnemoError> {
        self.complete(request).await
    }
}

#[async_trait]
impl ReaderCapable for MockDriver {
    fn driver_name(&self) -> &str {
        &self.name
    }

    async fn read(&self, url: &str) -> Result<ReaderOutput, MnemoError> {
        Ok(ReaderOutput {
            title: url.to_string(),
            markdown: format!("# {url}"),
            usage: MOCK_USAGE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn queued_replies_returned_in_order() {
        let driver = MockDriver::new("mock")
            .with_chat_reply("first")
            .with_chat_failure("boom");

        let first = driver.complete(ChatRequest::default()).await.unwrap();
        assert_eq!(first.content, "first");
        assert!(driver.complete(ChatRequest::default()).await.is_err());
        // Queue exhausted, falls back to default
        let fallback = driver.complete(ChatRequest::default()).await.unwrap();
        assert_eq!(fallback.content, "mock response");
        assert_eq!(driver.chat_calls(), 3);
    }

    #[tokio::test]
    async fn scripted_stream_yields_steps_and_releases_handle() {
        let driver = MockDriver::new("mock").with_stream(vec![
            StreamStep::reasoning("hmm"),
            StreamStep::content("hi"),
            StreamStep::Fail("reset".into()),
        ]);
        let tracker = driver.streams();

        let mut stream = driver.stream(ChatRequest::default()).await.unwrap();
        assert_eq!(tracker.live(), 1);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.reasoning.as_deref(), Some("hmm"));
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.content.as_deref(), Some("hi"));
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());

        drop(stream);
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.opened(), 1);
    }

    #[tokio::test]
    async fn capabilities_gate_accessors() {
        let driver = Arc::new(MockDriver::new("embed-only").with_capabilities(&[Capability::Embedding]));
        assert!(Arc::clone(&driver).as_chat().is_none());
        assert!(Arc::clone(&driver).as_embedding().is_some());
        assert!(driver.as_reader().is_none());
    }

    #[tokio::test]
    async fn default_rerank_preserves_order() {
        let driver = MockDriver::new("mock");
        let docs = vec![
            RerankDoc { id: "a".into(), content: "x".into() },
            RerankDoc { id: "b".into(), content: "y".into() },
        ];
        let out = driver.rerank("q", &docs).await.unwrap();
        let ids: Vec<_> = out.results.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
