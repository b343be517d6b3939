// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the RAG turn pipeline and the stream processor.

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, TimeZone};
use mnemo_agent::{
    spawn_processor, MaskMap, ProcessorConfig, RagPipeline, ResponseStream, TurnRequest,
};
use mnemo_config::model::{RagConfig, StreamConfig};
use mnemo_core::types::{
    ChatRequest, ChatRole, HistoryMessage, ResponseChoice, StreamIncrement, ToolStatus, TurnEvent,
    VectorMatch,
};
use mnemo_core::{ChatCapable, MnemoError};
use mnemo_retrieval::{KnowledgeRetriever, RerankStatus};
use mnemo_router::ProviderRouter;
use mnemo_test_utils::{
    history_message, knowledge, vector_match, InMemoryHistory, InMemoryKnowledgeStore,
    InMemoryVectorStore, MockDriver, RecordingSink, StreamStep,
};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn now() -> chrono::DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2026, 3, 4, 10, 0, 0)
        .unwrap()
}

struct Fixture {
    driver: Arc<MockDriver>,
    sink: Arc<RecordingSink>,
    pipeline: RagPipeline,
}

fn fixture(driver: MockDriver, history_len: usize) -> Fixture {
    let history = (0..history_len)
        .map(|i| {
            let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
            history_message("sess", i as i64, role, &format!("earlier message {i}"))
        })
        .collect();
    fixture_with(driver, history)
}

fn fixture_with(driver: MockDriver, history: Vec<HistoryMessage>) -> Fixture {
    let mut masked = knowledge("b", "bravo contact: $hidden[u1]");
    masked.masks.insert("$hidden[u1]".into(), "Alice".into());
    let driver = Arc::new(driver);
    let router = Arc::new(ProviderRouter::builder().driver(driver.clone()).build().unwrap());
    let rag = RagConfig::default();
    let retriever = KnowledgeRetriever::new(
        router.clone(),
        Arc::new(InMemoryVectorStore::new(vec![
            vector_match("a", 0.9, 1000),
            vector_match("b", 0.8, 1000),
            VectorMatch {
                user_id: "user-2".into(),
                ..vector_match("c", 0.95, 1000)
            },
        ])),
        Arc::new(InMemoryKnowledgeStore::new(vec![
            knowledge("a", "alpha"),
            masked,
            knowledge("c", "charlie belongs to someone else"),
        ])),
        &rag,
    );
    let sink = Arc::new(RecordingSink::new());
    let pipeline = RagPipeline::new(
        router,
        retriever,
        Arc::new(InMemoryHistory::new(history)),
        &rag,
        &StreamConfig::default(),
    )
    .with_sink(sink.clone());
    Fixture {
        driver,
        sink,
        pipeline,
    }
}

fn request(query: &str) -> TurnRequest {
    TurnRequest::new("space-1", "user-1", "sess", query)
        .message_id("msg-1")
        .lang("en")
        .at(now())
}

fn texts(choices: &[ResponseChoice]) -> Vec<String> {
    choices
        .iter()
        .filter_map(|c| match &c.increment {
            StreamIncrement::Text(t) => Some(t.clone()),
            _ => None,
        })
        .collect()
}

fn terminal(choices: &[ResponseChoice]) -> Option<&StreamIncrement> {
    choices.last().map(|c| &c.increment)
}

async fn open_stream(driver: &MockDriver, masks: MaskMap, cancel: CancellationToken) -> ResponseStream {
    let tokens = driver.stream(ChatRequest::default()).await.unwrap();
    spawn_processor("msg-1", tokens, masks, ProcessorConfig::default(), cancel)
}

fn alice() -> MaskMap {
    let mut masks = MaskMap::new();
    masks.insert("$hidden[u1]", "Alice");
    masks
}

// --- Pipeline ---

#[tokio::test]
async fn one_message_history_skips_enhancement() {
    let f = fixture(MockDriver::new("openai"), 1);

    let outcome = f
        .pipeline
        .run_turn(request("what's new in the project?"), CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.enhanced.is_enhanced());
    let embedded = f.driver.embed_inputs().await;
    assert_eq!(embedded, vec![vec!["what's new in the project?".to_string()]]);

    let choices = outcome.stream.collect_all().await;
    assert_eq!(texts(&choices).concat(), "mock response");
    assert_eq!(terminal(&choices), Some(&StreamIncrement::Done));
    // only the generation itself reached the chat model
    assert_eq!(f.driver.chat_calls(), 1);
}

#[tokio::test]
async fn prompt_carries_evidence_and_history() {
    let f = fixture(MockDriver::new("openai"), 1);

    let outcome = f
        .pipeline
        .run_turn(request("who is my contact?"), CancellationToken::new())
        .await
        .unwrap();
    outcome.stream.collect_all().await;

    assert_eq!(outcome.evidence, vec!["a", "b"]);
    assert_eq!(outcome.rerank, RerankStatus::Applied);
    let subjects: Vec<_> = outcome.usage.iter().map(|u| u.subject.as_str()).collect();
    assert_eq!(subjects, vec!["embedding", "rerank"]);

    let requests = f.driver.requests().await;
    let generation = requests.last().unwrap();
    let system = generation.system.as_deref().unwrap();
    assert!(system.contains("alpha"));
    assert!(system.contains("$hidden[u1]"));
    assert!(!system.contains("Alice"));
    let last = generation.messages.last().unwrap();
    assert_eq!(last.role, ChatRole::User);
    assert_eq!(last.content, "who is my contact?");
    assert_eq!(generation.messages.len(), 2);
}

#[tokio::test]
async fn retrieval_excludes_other_users_knowledge() {
    let f = fixture(MockDriver::new("openai"), 1);

    let outcome = f
        .pipeline
        .run_turn(request("who is my contact?"), CancellationToken::new())
        .await
        .unwrap();
    outcome.stream.collect_all().await;

    assert!(!outcome.evidence.iter().any(|id| id == "c"));
    let requests = f.driver.requests().await;
    let system = requests.last().unwrap().system.as_deref().unwrap();
    assert!(!system.contains("charlie"));
}

#[tokio::test]
async fn placeholders_from_evidence_are_resolved() {
    let driver = MockDriver::new("openai").with_stream(vec![
        StreamStep::content("the ref "),
        StreamStep::content("$hidd"),
        StreamStep::content("en[u1] is here"),
        StreamStep::finish("stop"),
    ]);
    let f = fixture(driver, 0);

    let outcome = f
        .pipeline
        .run_turn(request("who is my contact?"), CancellationToken::new())
        .await
        .unwrap();
    let choices = outcome.stream.collect_all().await;

    let text = texts(&choices).concat();
    assert_eq!(text, "the ref Alice is here");
    assert!(!text.contains("$hidd"));
}

#[tokio::test]
async fn malformed_enhancement_degrades_to_original_query() {
    let driver = MockDriver::new("openai").with_chat_reply("I think you mean the project");
    let f = fixture(driver, 3);

    let outcome = f
        .pipeline
        .run_turn(request("status?"), CancellationToken::new())
        .await
        .unwrap();
    let choices = outcome.stream.collect_all().await;

    assert!(!outcome.enhanced.is_enhanced());
    assert_eq!(f.driver.embed_inputs().await, vec![vec!["status?".to_string()]]);
    assert_eq!(terminal(&choices), Some(&StreamIncrement::Done));
    assert_eq!(f.driver.chat_calls(), 2);

    let events = f.sink.events().await;
    assert!(events.iter().any(|e| matches!(
        e,
        TurnEvent::ToolTip(t) if t.tool == "enhance_query" && t.status == ToolStatus::Failed
    )));
}

#[tokio::test]
async fn enhancement_widens_the_retrieval_query() {
    let driver = MockDriver::new("openai").with_chat_reply(r#"["project roadmap", "recent changes"]"#);
    let f = fixture(driver, 2);

    let outcome = f
        .pipeline
        .run_turn(request("what's new?"), CancellationToken::new())
        .await
        .unwrap();
    outcome.stream.collect_all().await;

    assert!(outcome.enhanced.is_enhanced());
    assert_eq!(
        f.driver.embed_inputs().await,
        vec![vec!["what's new? project roadmap recent changes".to_string()]]
    );
    assert_eq!(outcome.usage[0].subject, "enhance_query");
}

#[tokio::test]
async fn repeated_query_is_not_sent_twice() {
    // the store already holds the message being answered
    let f = fixture_with(
        MockDriver::new("openai"),
        vec![
            history_message("sess", 0, ChatRole::User, "hi"),
            history_message("sess", 1, ChatRole::Assistant, "hello"),
            history_message("sess", 2, ChatRole::User, "and now?"),
        ],
    );

    let outcome = f
        .pipeline
        .run_turn(request("and now?"), CancellationToken::new())
        .await
        .unwrap();
    outcome.stream.collect_all().await;

    let requests = f.driver.requests().await;
    let generation = requests.last().unwrap();
    let contents: Vec<_> = generation.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hi", "hello", "and now?"]);
}

#[tokio::test]
async fn embedding_failure_fails_the_turn() {
    let driver = MockDriver::new("openai").with_embedding_failure("embedding backend down");
    let f = fixture(driver, 0);

    let err = f
        .pipeline
        .run_turn(request("anything"), CancellationToken::new())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, MnemoError::Embedding(_)));
    assert_eq!(f.driver.chat_calls(), 0);
    let statuses: Vec<_> = f
        .sink
        .events()
        .await
        .into_iter()
        .filter_map(|e| match e {
            TurnEvent::ToolTip(t) if t.tool == "knowledge_search" => Some(t.status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![ToolStatus::Running, ToolStatus::Failed]);
}

#[tokio::test]
async fn retrieval_tool_tips_report_document_count() {
    let f = fixture(MockDriver::new("openai"), 0);

    let outcome = f
        .pipeline
        .run_turn(request("anything"), CancellationToken::new())
        .await
        .unwrap();
    outcome.stream.collect_all().await;

    let tips: Vec<_> = f
        .sink
        .events()
        .await
        .into_iter()
        .filter_map(|e| match e {
            TurnEvent::ToolTip(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(tips.len(), 2);
    assert_eq!(tips[0].status, ToolStatus::Running);
    assert_eq!(tips[1].status, ToolStatus::Success);
    assert_eq!(tips[1].detail, "2 documents");
    assert!(tips.iter().all(|t| t.message_id == "msg-1"));
}

#[tokio::test]
async fn failed_rerank_is_reported_and_degrades() {
    let driver = MockDriver::new("openai").with_rerank_failure("rerank 503");
    let f = fixture(driver, 0);

    let outcome = f
        .pipeline
        .run_turn(request("anything"), CancellationToken::new())
        .await
        .unwrap();
    outcome.stream.collect_all().await;

    assert_eq!(outcome.rerank, RerankStatus::Degraded);
    assert_eq!(outcome.evidence, vec!["a", "b"]);
    assert!(f.sink.events().await.iter().any(|e| matches!(
        e,
        TurnEvent::ToolTip(t) if t.tool == "rerank" && t.status == ToolStatus::Failed
    )));
}

#[tokio::test]
async fn cancelled_before_start_is_an_error() {
    let f = fixture(MockDriver::new("openai"), 0);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = f.pipeline.run_turn(request("anything"), cancel).await.err().unwrap();

    assert!(matches!(err, MnemoError::Cancelled));
    assert_eq!(f.driver.embed_calls(), 0);
}

#[tokio::test]
async fn turn_forwards_to_sink() {
    let f = fixture(MockDriver::new("openai"), 0);

    let outcome = f
        .pipeline
        .run_turn(request("anything"), CancellationToken::new())
        .await
        .unwrap();
    outcome.stream.forward_to(f.sink.as_ref()).await.unwrap();

    let choices: Vec<_> = f
        .sink
        .events()
        .await
        .into_iter()
        .filter_map(|e| match e {
            TurnEvent::Choice(c) => Some(c),
            _ => None,
        })
        .collect();
    assert_eq!(terminal(&choices), Some(&StreamIncrement::Done));
    let seqs: Vec<_> = choices.iter().map(|c| c.sequence).collect();
    assert_eq!(seqs, (0..choices.len() as u64).collect::<Vec<_>>());
}

// --- Stream processor ---

#[tokio::test(start_paused = true)]
async fn timer_coalesces_small_deltas() {
    let driver = MockDriver::new("openai").with_stream(vec![
        StreamStep::content("a"),
        StreamStep::Delay(Duration::from_millis(100)),
        StreamStep::content("b"),
        StreamStep::Delay(Duration::from_secs(1)),
        StreamStep::content("c"),
        StreamStep::finish("stop"),
    ]);

    let choices = open_stream(&driver, MaskMap::new(), CancellationToken::new())
        .await
        .collect_all()
        .await;

    assert_eq!(texts(&choices), vec!["ab", "c"]);
    assert_eq!(
        choices[2].increment,
        StreamIncrement::Finish {
            reason: "stop".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn no_flush_splits_a_placeholder() {
    let driver = MockDriver::new("openai").with_stream(vec![
        StreamStep::content("the ref "),
        StreamStep::content("$hidd"),
        StreamStep::Delay(Duration::from_secs(2)),
        StreamStep::content("en[u1] is here"),
        StreamStep::finish("stop"),
    ]);

    let choices = open_stream(&driver, alice(), CancellationToken::new())
        .await
        .collect_all()
        .await;

    let texts = texts(&choices);
    assert!(texts.iter().all(|t| !t.contains('$')));
    assert_eq!(texts.concat(), "the ref Alice is here");
}

#[tokio::test(start_paused = true)]
async fn reasoning_then_content() {
    let driver = MockDriver::new("openai").with_stream(vec![
        StreamStep::reasoning("look up\nnotes"),
        StreamStep::content("Found it."),
        StreamStep::finish("stop"),
        StreamStep::usage("openai-model"),
    ]);

    let choices = open_stream(&driver, MaskMap::new(), CancellationToken::new())
        .await
        .collect_all()
        .await;

    assert_eq!(
        texts(&choices).concat(),
        "<think>look up<br/>notes</think>Found it."
    );
    let kinds: Vec<_> = choices
        .iter()
        .skip_while(|c| matches!(c.increment, StreamIncrement::Text(_)))
        .map(|c| std::mem::discriminant(&c.increment))
        .collect();
    assert_eq!(
        kinds,
        vec![
            std::mem::discriminant(&StreamIncrement::Finish { reason: String::new() }),
            std::mem::discriminant(&StreamIncrement::Usage {
                model: String::new(),
                usage: Default::default()
            }),
            std::mem::discriminant(&StreamIncrement::Done),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_releases_the_stream() {
    let driver = MockDriver::new("openai").with_stream(vec![
        StreamStep::content("partial"),
        StreamStep::Hang,
    ]);
    let cancel = CancellationToken::new();
    let mut stream = open_stream(&driver, MaskMap::new(), cancel.clone()).await;

    let first = stream.recv().await.unwrap();
    assert_eq!(first.increment, StreamIncrement::Text("partial".into()));

    cancel.cancel();
    let rest = stream.collect_all().await;

    assert_eq!(terminal(&rest), Some(&StreamIncrement::Cancelled));
    let tracker = driver.streams();
    assert_eq!(tracker.opened(), 1);
    assert_eq!(tracker.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_receiver_releases_the_stream() {
    let driver = MockDriver::new("openai").with_stream(vec![
        StreamStep::content("partial"),
        StreamStep::Hang,
    ]);
    let mut stream = open_stream(&driver, MaskMap::new(), CancellationToken::new()).await;
    stream.recv().await.unwrap();
    drop(stream);

    // let the processor observe the closed channel
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(driver.streams().live(), 0);
}

#[tokio::test]
async fn transport_failure_flushes_partial_text_first() {
    let driver = MockDriver::new("openai").with_stream(vec![
        StreamStep::content("so far"),
        StreamStep::Fail("connection reset".into()),
    ]);

    let choices = open_stream(&driver, MaskMap::new(), CancellationToken::new())
        .await
        .collect_all()
        .await;

    assert_eq!(texts(&choices).concat(), "so far");
    assert!(matches!(terminal(&choices), Some(StreamIncrement::Error(m)) if m.contains("connection reset")));
    assert_eq!(driver.streams().live(), 0);
}

fn run_plain(deltas: Vec<String>) -> Vec<ResponseChoice> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    runtime.block_on(async {
        let mut steps: Vec<StreamStep> = deltas.iter().map(|d| StreamStep::content(d)).collect();
        steps.push(StreamStep::finish("stop"));
        let driver = MockDriver::new("openai").with_stream(steps);
        open_stream(&driver, alice(), CancellationToken::new())
            .await
            .collect_all()
            .await
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn text_without_dollar_is_delivered_verbatim(
        deltas in prop::collection::vec("[a-zA-Z0-9 .,\\[\\]\n]{0,12}", 0..20)
    ) {
        let choices = run_plain(deltas.clone());
        prop_assert_eq!(texts(&choices).concat(), deltas.concat());
        prop_assert_eq!(terminal(&choices), Some(&StreamIncrement::Done));
    }
}
