// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming response processor.
//!
//! One background task per generation consumes the driver's token stream and
//! turns it into ordered [`ResponseChoice`] increments on a bounded channel.
//! The task watches the token stream, the cancellation token, and the overall
//! deadline at once; a separate ticker flushes the shared buffer on an interval.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use mnemo_config::model::StreamConfig;
use mnemo_core::types::{ResponseChoice, StreamIncrement, StreamToken, TurnEvent};
use mnemo_core::{EventSink, MnemoError, TokenStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::mask::MaskMap;
use crate::writer::{BufferedWriter, Detached};

/// Processor tuning, usually taken from `[stream]`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    pub flush_interval: Duration,
    pub mask_lookahead: usize,
    pub mask_max_span: usize,
    pub channel_capacity: usize,
    pub stream_timeout: Duration,
}

impl From<&StreamConfig> for ProcessorConfig {
    fn from(config: &StreamConfig) -> Self {
        Self {
            flush_interval: config.flush_interval(),
            mask_lookahead: config.mask_lookahead,
            mask_max_span: config.mask_max_span,
            channel_capacity: config.channel_capacity.max(1),
            stream_timeout: config.stream_timeout(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::from(&StreamConfig::default())
    }
}

/// Phase of the processor loop.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Streaming,
    Done,
    Errored(String),
    Cancelled,
    Detached,
}

/// Caller side of a processed generation.
///
/// Yields increments in sequence order and ends after the terminal one.
/// Dropping it detaches the processor, which then releases the token stream.
pub struct ResponseStream {
    rx: mpsc::Receiver<ResponseChoice>,
    task: Option<JoinHandle<()>>,
}

impl ResponseStream {
    pub async fn recv(&mut self) -> Option<ResponseChoice> {
        self.rx.recv().await
    }

    /// Waits for the processor task to exit.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "stream processor task failed");
        }
    }

    /// Delivers every increment to `sink` until the terminal one.
    pub async fn forward_to(mut self, sink: &dyn EventSink) -> Result<(), MnemoError> {
        while let Some(choice) = self.recv().await {
            sink.emit(TurnEvent::Choice(choice)).await?;
        }
        self.join().await;
        Ok(())
    }

    /// Collects all increments, for callers that do not stream to a client.
    pub async fn collect_all(mut self) -> Vec<ResponseChoice> {
        let mut out = Vec::new();
        while let Some(choice) = self.recv().await {
            out.push(choice);
        }
        self.join().await;
        out
    }
}

impl Stream for ResponseStream {
    type Item = ResponseChoice;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Starts processing `tokens` on a background task.
pub fn spawn_processor(
    message_id: &str,
    tokens: TokenStream,
    masks: MaskMap,
    config: ProcessorConfig,
    cancel: CancellationToken,
) -> ResponseStream {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let writer = BufferedWriter::new(
        message_id,
        masks,
        config.mask_lookahead,
        config.mask_max_span,
        tx,
    );
    let task = tokio::spawn(run_processor(tokens, writer, config, cancel));
    ResponseStream {
        rx,
        task: Some(task),
    }
}

async fn run_processor(
    mut tokens: TokenStream,
    writer: BufferedWriter,
    config: ProcessorConfig,
    cancel: CancellationToken,
) {
    let stop_ticker = CancellationToken::new();
    let ticker = writer.spawn_ticker(config.flush_interval, stop_ticker.clone());
    let deadline = tokio::time::sleep(config.stream_timeout);
    tokio::pin!(deadline);

    let mut phase = Phase::Streaming;
    while phase == Phase::Streaming {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("generation cancelled");
                phase = Phase::Cancelled;
            }
            _ = writer.detached() => {
                phase = Phase::Detached;
            }
            _ = &mut deadline => {
                warn!(timeout = ?config.stream_timeout, "generation timed out");
                phase = Phase::Errored(
                    MnemoError::Timeout { duration: config.stream_timeout }.to_string(),
                );
            }
            next = tokens.next() => {
                phase = match next {
                    Some(Ok(token)) => match apply_token(&writer, token).await {
                        Ok(phase) => phase,
                        Err(Detached) => Phase::Detached,
                    },
                    Some(Err(e)) => {
                        warn!(error = %e, "stream transport error");
                        Phase::Errored(e.to_string())
                    }
                    None => Phase::Done,
                };
            }
        }
    }

    stop_ticker.cancel();
    if let Err(e) = ticker.await {
        warn!(error = %e, "flush ticker failed");
    }
    drop(tokens);

    let terminal = match phase {
        Phase::Done => StreamIncrement::Done,
        Phase::Errored(message) => StreamIncrement::Error(message),
        Phase::Cancelled => StreamIncrement::Cancelled,
        Phase::Detached | Phase::Streaming => {
            debug!("receiver dropped, generation abandoned");
            return;
        }
    };
    if writer.close(terminal).await.is_err() {
        debug!("receiver dropped before terminal increment");
    }
}

/// Routes one token into the writer. In-band errors end the stream after
/// whatever content the same token carried.
async fn apply_token(writer: &BufferedWriter, token: StreamToken) -> Result<Phase, Detached> {
    if let Some(reasoning) = token.reasoning.as_deref()
        && !reasoning.is_empty()
    {
        writer.push_reasoning(reasoning).await;
    }
    if let Some(content) = token.content.as_deref()
        && !content.is_empty()
    {
        writer.push_content(content).await;
    }
    if let Some(reason) = token.finish_reason.as_deref() {
        writer.finish(reason).await?;
    }
    if let Some(usage) = token.usage {
        let model = token.model.as_deref().unwrap_or_default();
        writer.usage(model, usage).await?;
    }
    if let Some(error) = token.error {
        warn!(error = %error, "provider reported an in-stream error");
        return Ok(Phase::Errored(error));
    }
    Ok(Phase::Streaming)
}
