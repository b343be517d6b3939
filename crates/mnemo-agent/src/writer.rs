// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Buffered writer with scheduled flushing.
//!
//! Accumulates reasoning and content deltas and releases them as discrete
//! [`ResponseChoice`] increments, either when the flush timer fires or when
//! the stream reaches a boundary (finish, usage, terminal). The timer path and
//! the token path share one mutex over the buffer.

use std::sync::Arc;
use std::time::Duration;

use mnemo_core::types::{ResponseChoice, StreamIncrement, TokenUsage};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::mask::{MaskMap, MaskScanner};

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";
const REASONING_BREAK: &str = "<br/>";

/// Where the choice is with respect to reasoning output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThinkState {
    None,
    Open,
    /// Content has started; later reasoning is dropped.
    Closed,
}

/// The receiving side went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detached;

struct WriterState {
    buffer: String,
    scanner: MaskScanner,
    think: ThinkState,
    sequence: u64,
    finished: bool,
    pending_usage: Option<(String, TokenUsage)>,
}

/// Shared, cloneable handle over one choice's output buffer.
#[derive(Clone)]
pub struct BufferedWriter {
    message_id: Arc<str>,
    state: Arc<Mutex<WriterState>>,
    tx: mpsc::Sender<ResponseChoice>,
}

impl BufferedWriter {
    pub fn new(
        message_id: &str,
        masks: MaskMap,
        lookahead: usize,
        max_span: usize,
        tx: mpsc::Sender<ResponseChoice>,
    ) -> Self {
        Self {
            message_id: Arc::from(message_id),
            state: Arc::new(Mutex::new(WriterState {
                buffer: String::new(),
                scanner: MaskScanner::new(masks, lookahead, max_span),
                think: ThinkState::None,
                sequence: 0,
                finished: false,
                pending_usage: None,
            })),
            tx,
        }
    }

    /// Appends a reasoning delta, opening the think block on first use.
    ///
    /// Reasoning that arrives after content has started is discarded.
    pub async fn push_reasoning(&self, text: &str) {
        let mut state = self.state.lock().await;
        if state.think == ThinkState::Closed {
            trace!(len = text.len(), "reasoning after content dropped");
            return;
        }
        if state.think == ThinkState::None {
            state.buffer.push_str(THINK_OPEN);
            state.think = ThinkState::Open;
        }
        let text = text.replace('\n', REASONING_BREAK);
        state.buffer.push_str(&text);
    }

    /// Appends a content delta through the mask scanner, closing an open think block first.
    pub async fn push_content(&self, text: &str) {
        let mut state = self.state.lock().await;
        close_think(&mut state);
        state.think = ThinkState::Closed;
        let WriterState {
            buffer, scanner, ..
        } = &mut *state;
        scanner.push(text, buffer);
    }

    /// Scheduled flush. Skipped while a placeholder may be forming.
    pub async fn flush(&self) -> Result<(), Detached> {
        let mut state = self.state.lock().await;
        if state.scanner.is_scanning() {
            trace!("flush deferred during mask scan");
            return Ok(());
        }
        self.send_buffer(&mut state).await
    }

    /// Flushes everything, then emits the finish increment and any usage seen so far.
    pub async fn finish(&self, reason: &str) -> Result<(), Detached> {
        let mut state = self.state.lock().await;
        self.drain(&mut state).await?;
        state.finished = true;
        self.send(
            &mut state,
            StreamIncrement::Finish {
                reason: reason.to_string(),
            },
        )
        .await?;
        if let Some((model, usage)) = state.pending_usage.take() {
            self.send(&mut state, StreamIncrement::Usage { model, usage })
                .await?;
        }
        Ok(())
    }

    /// Records usage. Emitted at once after a finish, otherwise held until one.
    pub async fn usage(&self, model: &str, usage: TokenUsage) -> Result<(), Detached> {
        let mut state = self.state.lock().await;
        if state.finished {
            self.drain(&mut state).await?;
            self.send(
                &mut state,
                StreamIncrement::Usage {
                    model: model.to_string(),
                    usage,
                },
            )
            .await
        } else {
            state.pending_usage = Some((model.to_string(), usage));
            Ok(())
        }
    }

    /// Flushes everything, releases held usage, and emits `terminal`.
    pub async fn close(&self, terminal: StreamIncrement) -> Result<(), Detached> {
        let mut state = self.state.lock().await;
        self.drain(&mut state).await?;
        if let Some((model, usage)) = state.pending_usage.take() {
            self.send(&mut state, StreamIncrement::Usage { model, usage })
                .await?;
        }
        self.send(&mut state, terminal).await
    }

    /// Resolves once the receiving side has been dropped.
    pub async fn detached(&self) {
        self.tx.closed().await;
    }

    /// Spawns the periodic flush task. It stops when `stop` is cancelled or
    /// the receiver is dropped.
    pub fn spawn_ticker(&self, interval: Duration, stop: CancellationToken) -> JoinHandle<()> {
        let writer = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        if writer.flush().await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn drain(&self, state: &mut WriterState) -> Result<(), Detached> {
        close_think(state);
        let WriterState {
            buffer, scanner, ..
        } = &mut *state;
        scanner.drain(buffer);
        self.send_buffer(state).await
    }

    async fn send_buffer(&self, state: &mut WriterState) -> Result<(), Detached> {
        if state.buffer.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut state.buffer);
        self.send(state, StreamIncrement::Text(text)).await
    }

    async fn send(&self, state: &mut WriterState, increment: StreamIncrement) -> Result<(), Detached> {
        let choice = ResponseChoice {
            message_id: self.message_id.to_string(),
            sequence: state.sequence,
            increment,
        };
        state.sequence += 1;
        self.tx.send(choice).await.map_err(|_| Detached)
    }
}

fn close_think(state: &mut WriterState) {
    if state.think == ThinkState::Open {
        state.buffer.push_str(THINK_CLOSE);
        state.think = ThinkState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(masks: MaskMap) -> (BufferedWriter, mpsc::Receiver<ResponseChoice>) {
        let (tx, rx) = mpsc::channel(16);
        (BufferedWriter::new("m1", masks, 10, 128, tx), rx)
    }

    fn drain_rx(rx: &mut mpsc::Receiver<ResponseChoice>) -> Vec<StreamIncrement> {
        let mut out = Vec::new();
        while let Ok(choice) = rx.try_recv() {
            out.push(choice.increment);
        }
        out
    }

    #[tokio::test]
    async fn reasoning_is_wrapped_once() {
        let (w, mut rx) = writer(MaskMap::new());
        w.push_reasoning("step one\n").await;
        w.push_reasoning("step two").await;
        w.push_content("Answer").await;
        w.push_content(".").await;
        w.flush().await.unwrap();
        assert_eq!(
            drain_rx(&mut rx),
            vec![StreamIncrement::Text(
                "<think>step one<br/>step two</think>Answer.".into()
            )]
        );
    }

    #[tokio::test]
    async fn no_think_markers_without_reasoning() {
        let (w, mut rx) = writer(MaskMap::new());
        w.push_content("plain").await;
        w.close(StreamIncrement::Done).await.unwrap();
        assert_eq!(
            drain_rx(&mut rx),
            vec![StreamIncrement::Text("plain".into()), StreamIncrement::Done]
        );
    }

    #[tokio::test]
    async fn flush_waits_for_mask_resolution() {
        let mut masks = MaskMap::new();
        masks.insert("u1", "Alice");
        let (w, mut rx) = writer(masks);
        w.push_content("hi $hidden[u").await;
        w.flush().await.unwrap();
        assert!(drain_rx(&mut rx).is_empty());
        w.push_content("1]!").await;
        w.flush().await.unwrap();
        assert_eq!(drain_rx(&mut rx), vec![StreamIncrement::Text("hi Alice!".into())]);
    }

    #[tokio::test]
    async fn late_reasoning_is_dropped() {
        let (w, mut rx) = writer(MaskMap::new());
        w.push_reasoning("plan").await;
        w.push_content("Answer").await;
        w.push_reasoning(" second thoughts").await;
        w.push_content(".").await;
        w.close(StreamIncrement::Done).await.unwrap();
        assert_eq!(
            drain_rx(&mut rx),
            vec![
                StreamIncrement::Text("<think>plan</think>Answer.".into()),
                StreamIncrement::Done
            ]
        );
    }

    #[tokio::test]
    async fn reasoning_never_lands_inside_a_held_placeholder() {
        let mut masks = MaskMap::new();
        masks.insert("u1", "Alice");
        let (w, mut rx) = writer(masks);
        w.push_content("ask $hid").await;
        w.push_reasoning("hmm").await;
        w.push_content("den[u1] now").await;
        w.close(StreamIncrement::Done).await.unwrap();
        assert_eq!(
            drain_rx(&mut rx),
            vec![
                StreamIncrement::Text("ask Alice now".into()),
                StreamIncrement::Done
            ]
        );
    }

    #[tokio::test]
    async fn usage_follows_finish() {
        let (w, mut rx) = writer(MaskMap::new());
        w.push_content("a").await;
        w.usage("m", TokenUsage::default()).await.unwrap();
        w.push_content("b").await;
        w.finish("stop").await.unwrap();
        let got = drain_rx(&mut rx);
        assert_eq!(got[0], StreamIncrement::Text("ab".into()));
        assert_eq!(got[1], StreamIncrement::Finish { reason: "stop".into() });
        assert!(matches!(got[2], StreamIncrement::Usage { .. }));
    }

    #[tokio::test]
    async fn sequences_are_contiguous() {
        let (w, mut rx) = writer(MaskMap::new());
        w.push_content("a").await;
        w.flush().await.unwrap();
        w.push_content("b").await;
        w.close(StreamIncrement::Done).await.unwrap();
        let mut seqs = Vec::new();
        while let Ok(c) = rx.try_recv() {
            assert_eq!(c.message_id, "m1");
            seqs.push(c.sequence);
        }
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn dropped_receiver_is_detached() {
        let (w, rx) = writer(MaskMap::new());
        drop(rx);
        w.push_content("x").await;
        assert_eq!(w.flush().await, Err(Detached));
    }
}
