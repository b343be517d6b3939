// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for capability routing.

use std::sync::Arc;

use mnemo_core::types::{Capability, ChatMessage, RerankDoc};
use mnemo_core::MnemoError;
use mnemo_router::ProviderRouter;
use mnemo_test_utils::MockDriver;

fn chat_only(name: &str) -> MockDriver {
    MockDriver::new(name).with_capabilities(&[Capability::Chat])
}

fn embed_only(name: &str) -> MockDriver {
    MockDriver::new(name).with_capabilities(&[Capability::Embedding])
}

#[test]
fn build_requires_chat_and_embedding() {
    let err = ProviderRouter::builder()
        .driver(Arc::new(chat_only("chatty")))
        .build()
        .unwrap_err();
    assert!(matches!(err, MnemoError::Config(ref m) if m.contains("embedding")), "{err}");

    let err = ProviderRouter::builder()
        .driver(Arc::new(embed_only("vec")))
        .build()
        .unwrap_err();
    assert!(matches!(err, MnemoError::Config(ref m) if m.contains("chat")), "{err}");
}

#[test]
fn defaults_follow_registration_order() {
    let router = ProviderRouter::builder()
        .driver(Arc::new(embed_only("vec")))
        .driver(Arc::new(chat_only("first-chat")))
        .driver(Arc::new(MockDriver::new("second")))
        .build()
        .unwrap();

    assert_eq!(router.resolve_chat("query").unwrap().driver_name(), "first-chat");
    assert_eq!(router.resolve_enhance().unwrap().driver_name(), "first-chat");
    assert_eq!(
        router.resolve_embedding("embedding.query").unwrap().driver_name(),
        "vec"
    );
    // only `second` reranks
    assert_eq!(router.resolve_rerank().unwrap().driver_name(), "second");
}

#[test]
fn usage_overrides_default_case_insensitively() {
    let router = ProviderRouter::builder()
        .driver(Arc::new(MockDriver::new("OpenAI")))
        .driver(Arc::new(MockDriver::new("Qwen").with_lang("zh")))
        .usage("Query", "QWEN")
        .build()
        .unwrap();

    assert_eq!(router.resolve_chat("query").unwrap().driver_name(), "Qwen");
    // keys without an entry still use the default
    assert_eq!(router.resolve_chat("summary").unwrap().driver_name(), "OpenAI");
    assert_eq!(router.lang(), "zh");
    assert!(router.registry().get("qwen").is_some());
}

#[test]
fn usage_for_unknown_driver_is_fatal() {
    let err = ProviderRouter::builder()
        .driver(Arc::new(MockDriver::new("openai")))
        .usage("rerank", "cohere")
        .build()
        .unwrap_err();
    assert!(matches!(err, MnemoError::DriverNotFound { ref name } if name == "cohere"));
}

#[test]
fn usage_for_incapable_driver_is_fatal() {
    let err = ProviderRouter::builder()
        .driver(Arc::new(MockDriver::new("openai")))
        .driver(Arc::new(chat_only("chatty")))
        .usage("embedding.document", "chatty")
        .build()
        .unwrap_err();
    assert!(matches!(err, MnemoError::Config(_)));
}

#[test]
fn duplicate_driver_names_are_rejected() {
    let err = ProviderRouter::builder()
        .driver(Arc::new(MockDriver::new("openai")))
        .driver(Arc::new(MockDriver::new("OPENAI")))
        .build()
        .unwrap_err();
    assert!(matches!(err, MnemoError::Config(ref m) if m.contains("twice")));
}

#[test]
fn missing_optional_capability_is_typed_unsupported() {
    let router = ProviderRouter::builder()
        .driver(Arc::new(
            MockDriver::new("basic").with_capabilities(&[Capability::Chat, Capability::Embedding]),
        ))
        .build()
        .unwrap();

    let err = router.resolve_reader().err().expect("no reader");
    assert!(err.is_unsupported());
    assert!(router.resolve_rerank().err().expect("no rerank").is_unsupported());
    assert!(router.resolve_vision().err().expect("no vision").is_unsupported());

    let table = router.capability_table();
    assert!(table.contains(&("query", Some("basic".to_string()))));
    assert!(table.contains(&("reader", None)));
}

#[tokio::test]
async fn read_without_reader_returns_unsupported() {
    let router = ProviderRouter::builder()
        .driver(Arc::new(MockDriver::new("basic")))
        .build()
        .unwrap();
    let err = router.read("https://example.com").await.unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn summarize_parses_json_and_falls_back_to_raw() {
    let driver = Arc::new(
        MockDriver::new("openai")
            .with_chat_reply("```json\n{\"summary\":\"short\",\"title\":\"T\",\"tags\":[\"a\",\"b\"]}\n```")
            .with_chat_reply("just prose"),
    );
    let router = ProviderRouter::builder().driver(driver.clone()).build().unwrap();

    let parsed = router.summarize("long text", "en").await.unwrap();
    assert_eq!(parsed.summary, "short");
    assert_eq!(parsed.title, "T");
    assert_eq!(parsed.tags, vec!["a", "b"]);
    assert_eq!(parsed.usage.total(), 30);

    let raw = router.summarize("long text", "en").await.unwrap();
    assert_eq!(raw.summary, "just prose");
    assert!(raw.tags.is_empty());

    let requests = driver.requests().await;
    assert!(requests[0].system.as_deref().unwrap_or_default().contains("\"summary\""));
    assert_eq!(requests[0].messages, vec![ChatMessage::user("long text")]);
}

#[tokio::test]
async fn chunk_parse_failure_is_an_error() {
    let router = ProviderRouter::builder()
        .driver(Arc::new(
            MockDriver::new("openai")
                .with_chat_reply("[\"one\", \"two\"]")
                .with_chat_reply("not json"),
        ))
        .build()
        .unwrap();

    let chunks = router.chunk("doc", "en").await.unwrap();
    assert_eq!(chunks.chunks, vec!["one", "two"]);
    assert!(matches!(
        router.chunk("doc", "en").await,
        Err(MnemoError::Provider { .. })
    ));
}

#[tokio::test]
async fn document_embedding_prefixes_title() {
    let driver = Arc::new(MockDriver::new("openai"));
    let router = ProviderRouter::builder().driver(driver.clone()).build().unwrap();

    router
        .embedding_for_document("Trip", &["day one".to_string()])
        .await
        .unwrap();
    router
        .embedding_for_query(&["where did I go".to_string()])
        .await
        .unwrap();

    let inputs = driver.embed_inputs().await;
    assert_eq!(inputs[0], vec!["Trip\nday one".to_string()]);
    assert_eq!(inputs[1], vec!["where did I go".to_string()]);
}

#[tokio::test]
async fn new_query_and_vision_are_bound_to_resolved_drivers() {
    let driver = Arc::new(MockDriver::new("openai").with_chat_reply("hello"));
    let router = ProviderRouter::builder().driver(driver.clone()).build().unwrap();

    let query = router
        .new_query(Some("be brief".into()), vec![ChatMessage::user("hi")])
        .unwrap()
        .max_tokens(64);
    assert_eq!(query.driver_name(), "openai");
    let response = query.complete().await.unwrap();
    assert_eq!(response.content, "hello");

    let description = router
        .describe_image("https://img.example/cat.png", "en")
        .await
        .unwrap();
    assert_eq!(description, "mock response");

    let requests = driver.requests().await;
    assert_eq!(requests[0].system.as_deref(), Some("be brief"));
    assert_eq!(requests[0].max_tokens, Some(64));
    assert_eq!(requests[1].messages[0].images, vec!["https://img.example/cat.png"]);
}

#[tokio::test]
async fn rerank_delegates() {
    let router = ProviderRouter::builder()
        .driver(Arc::new(MockDriver::new("openai").with_rerank(&[("b", 0.9), ("a", 0.2)])))
        .build()
        .unwrap();
    let docs = vec![
        RerankDoc { id: "a".into(), content: "x".into() },
        RerankDoc { id: "b".into(), content: "y".into() },
    ];
    let out = router.rerank("q", &docs).await.unwrap();
    assert_eq!(out.results[0].id, "b");
}
