// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for OpenAI-compatible streaming chat completions.
//!
//! Converts a reqwest response byte stream into [`StreamToken`]s using the
//! `eventsource-stream` crate. The stream ends at the `[DONE]` sentinel or
//! when the server closes the connection.

use std::future;

use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use mnemo_core::types::StreamToken;
use mnemo_core::{MnemoError, TokenStream};

use crate::types::ChatCompletionChunk;

const DONE_SENTINEL: &str = "[DONE]";

/// What one SSE frame contributed.
#[derive(Debug)]
enum Frame {
    Token(StreamToken),
    Empty,
    Done,
}

/// Parses a streaming completion response into a [`TokenStream`].
///
/// Dropping the returned stream drops the response body, which closes the
/// connection.
pub fn parse_sse_stream(response: reqwest::Response) -> TokenStream {
    let frames = response.bytes_stream().eventsource().map(|result| match result {
        Ok(event) => parse_frame(&event.data),
        Err(e) => Err(MnemoError::Provider {
            message: format!("SSE stream error: {e}"),
            source: None,
        }),
    });

    let tokens = frames
        .take_while(|frame| future::ready(!matches!(frame, Ok(Frame::Done))))
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Frame::Token(token)) => Some(Ok(token)),
                Ok(Frame::Empty) | Ok(Frame::Done) => None,
                Err(e) => Some(Err(e)),
            })
        });

    Box::pin(tokens)
}

fn parse_frame(data: &str) -> Result<Frame, MnemoError> {
    let data = data.trim();
    if data == DONE_SENTINEL {
        return Ok(Frame::Done);
    }
    if data.is_empty() {
        return Ok(Frame::Empty);
    }

    let chunk: ChatCompletionChunk =
        serde_json::from_str(data).map_err(|e| MnemoError::Provider {
            message: format!("failed to parse stream chunk: {e}"),
            source: Some(Box::new(e)),
        })?;

    let token = chunk_to_token(chunk);
    if token == StreamToken::default() {
        Ok(Frame::Empty)
    } else {
        Ok(Frame::Token(token))
    }
}

/// Folds one chunk into a single token. Only the first choice is consumed.
fn chunk_to_token(chunk: ChatCompletionChunk) -> StreamToken {
    let mut token = StreamToken::default();

    if let Some(choice) = chunk.choices.into_iter().next() {
        token.content = choice.delta.content.filter(|s| !s.is_empty());
        token.reasoning = choice.delta.reasoning_content.filter(|s| !s.is_empty());
        token.finish_reason = choice.finish_reason.filter(|s| !s.is_empty());
    }

    if let Some(usage) = chunk.usage {
        token.usage = Some(usage.into());
        token.model = Some(chunk.model);
    }

    if let Some(error) = chunk.error {
        token.error = Some(error.to_string());
    }

    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::types::TokenUsage;

    async fn mock_sse_response(sse_text: &str) -> reqwest::Response {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_text.to_string()),
            )
            .mount(&server)
            .await;

        reqwest::get(&server.uri()).await.unwrap()
    }

    async fn collect(sse_text: &str) -> Vec<Result<StreamToken, MnemoError>> {
        let response = mock_sse_response(sse_text).await;
        parse_sse_stream(response).collect().await
    }

    #[tokio::test]
    async fn content_deltas_become_tokens() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
                   data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
                   data: [DONE]\n\n";
        let tokens = collect(sse).await;
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].as_ref().unwrap(), &StreamToken::content("Hel"));
        assert_eq!(tokens[1].as_ref().unwrap(), &StreamToken::content("lo"));
    }

    #[tokio::test]
    async fn reasoning_content_maps_to_reasoning() {
        let sse = "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"thinking\",\"content\":\"\"}}]}\n\n";
        let tokens = collect(sse).await;
        assert_eq!(tokens[0].as_ref().unwrap(), &StreamToken::reasoning("thinking"));
    }

    #[tokio::test]
    async fn done_sentinel_ends_the_stream() {
        let sse = "data: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n";
        let tokens = collect(sse).await;
        assert!(tokens.is_empty());
    }

    #[tokio::test]
    async fn finish_and_usage_chunks() {
        let sse = "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
                   data: {\"model\":\"gpt-4o-mini\",\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":4,\"total_tokens\":16}}\n\n\
                   data: [DONE]\n\n";
        let tokens = collect(sse).await;
        assert_eq!(tokens[0].as_ref().unwrap(), &StreamToken::finish("stop"));
        assert_eq!(
            tokens[1].as_ref().unwrap(),
            &StreamToken::usage(
                "gpt-4o-mini",
                TokenUsage {
                    input_tokens: 12,
                    output_tokens: 4
                }
            )
        );
    }

    #[tokio::test]
    async fn empty_deltas_are_skipped() {
        let sse = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
                   data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n";
        let tokens = collect(sse).await;
        assert_eq!(tokens.len(), 1);
    }

    #[tokio::test]
    async fn in_band_error_is_reported_on_the_token() {
        let sse = "data: {\"error\":{\"message\":\"quota exceeded\",\"type\":\"insufficient_quota\"}}\n\n";
        let tokens = collect(sse).await;
        let token = tokens[0].as_ref().unwrap();
        assert_eq!(
            token.error.as_deref(),
            Some("insufficient_quota: quota exceeded")
        );
    }

    #[tokio::test]
    async fn malformed_chunk_is_a_provider_error() {
        let tokens = collect("data: {not json\n\n").await;
        assert!(matches!(tokens[0], Err(MnemoError::Provider { .. })));
    }
}
