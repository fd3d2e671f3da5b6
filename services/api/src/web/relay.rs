//! services/api/src/web/relay.rs
//!
//! The stream relay: turns a pull-based token stream from the generation
//! backend into a Server-Sent Events response body.
//!
//! Each non-empty delta becomes one `data: {"text": "<delta>"}` frame. There is
//! no sentinel frame; the client detects completion by the body closing. The
//! relay moves through `Idle -> Streaming -> {Completed | Aborted}`:
//!
//! - `Completed`: the token stream ended cleanly and the consumer polled past
//!   the last frame. The assembled text is handed to the completion hook, which
//!   runs as its own task so the body can close without waiting on it.
//! - `Aborted`: the backend failed mid-stream, or the client went away and the
//!   response body (and with it the relay) was dropped. The hook never runs and
//!   nothing is persisted.

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{future::BoxFuture, Stream, StreamExt};
use reading_club_core::ports::TokenStream;
use serde_json::json;
use std::convert::Infallible;
use tracing::{error, info};

/// Runs once with the full assistant text after a stream completes.
pub type CompletionHook = Box<dyn FnOnce(String) -> BoxFuture<'static, ()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Streaming,
    Completed,
    Aborted,
}

/// Tracks one relay's progress; dropping it before completion marks an abort.
struct RelayGuard {
    state: RelayState,
    frames: usize,
}

impl RelayGuard {
    fn new() -> Self {
        Self {
            state: RelayState::Idle,
            frames: 0,
        }
    }

    fn abort(&mut self) {
        self.state = RelayState::Aborted;
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        match self.state {
            RelayState::Idle | RelayState::Streaming => {
                self.state = RelayState::Aborted;
                info!(
                    "Client disconnected after {} frames; generation abandoned.",
                    self.frames
                );
            }
            RelayState::Aborted => info!("Stream aborted after {} frames.", self.frames),
            RelayState::Completed => {}
        }
    }
}

/// The ordered text deltas to frame. Drives the state machine and spawns the
/// completion hook only after the final delta has been taken by the consumer.
pub fn relay_deltas(
    mut tokens: TokenStream,
    on_complete: Option<CompletionHook>,
) -> impl Stream<Item = String> + Send {
    stream! {
        let mut guard = RelayGuard::new();
        let mut full_text = String::new();
        guard.state = RelayState::Streaming;

        while let Some(item) = tokens.next().await {
            match item {
                Ok(delta) => {
                    if delta.is_empty() {
                        continue;
                    }
                    full_text.push_str(&delta);
                    guard.frames += 1;
                    yield delta;
                }
                Err(e) => {
                    error!("Generation stream failed mid-response: {}", e);
                    guard.abort();
                    return;
                }
            }
        }

        guard.state = RelayState::Completed;
        if let Some(hook) = on_complete {
            tokio::spawn(hook(full_text));
        }
    }
}

/// Wraps the relay as an SSE response.
pub fn relay(
    tokens: TokenStream,
    on_complete: Option<CompletionHook>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = relay_deltas(tokens, on_complete)
        .map(|delta| Ok(Event::default().data(json!({ "text": delta }).to_string())));
    Sse::new(events).keep_alive(KeepAlive::default())
}
