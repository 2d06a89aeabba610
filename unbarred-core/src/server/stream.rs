//! Newline-delimited JSON framing of pipeline events.

use super::types::StreamChunk;
use crate::pipeline::PipelineEvent;
use axum::body::Body;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::task::AbortOnDropHandle;
use tracing::error;

/// Message sent in place of upstream error details.
pub const GENERIC_ERROR: &str = "Failed to generate a response";

struct FrameState {
    pending: Option<PipelineEvent>,
    events: UnboundedReceiver<PipelineEvent>,
    // Dropped with the body; aborts generation when the client goes away.
    _task: AbortOnDropHandle<()>,
    answer: String,
    finished: bool,
}

/// Streams `first` followed by the remaining events, one JSON frame per line.
///
/// The body ends after a `done` or `error` frame.
pub fn ndjson_body(
    first: PipelineEvent,
    events: UnboundedReceiver<PipelineEvent>,
    task: AbortOnDropHandle<()>,
) -> Body {
    Body::from_stream(frames(first, events, task))
}

fn frames(
    first: PipelineEvent,
    events: UnboundedReceiver<PipelineEvent>,
    task: AbortOnDropHandle<()>,
) -> impl Stream<Item = Result<String, Infallible>> + Send {
    let state = FrameState {
        pending: Some(first),
        events,
        _task: task,
        answer: String::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        let event = match state.pending.take() {
            Some(event) => Some(event),
            None => state.events.recv().await,
        };

        let frame = match event {
            Some(PipelineEvent::Chunk(text)) => {
                state.answer.push_str(&text);
                StreamChunk::chunk(text)
            }
            Some(PipelineEvent::Done) => {
                state.finished = true;
                StreamChunk::done(std::mem::take(&mut state.answer))
            }
            Some(PipelineEvent::Failed(e)) => {
                state.finished = true;
                error!(error = %e, "Answer stream ended with an error");
                StreamChunk::error(GENERIC_ERROR)
            }
            None => {
                state.finished = true;
                error!("Pipeline stopped without finishing the answer");
                StreamChunk::error(GENERIC_ERROR)
            }
        };

        Some((Ok(frame.to_line()), state))
    })
}
