//! Incremental server-sent event handling for `sse-invoke` responses.
//!
//! The pipeline is pull-based and blocking: [`FrameReader`] splits the body
//! into frames, [`parse_event`] decodes each frame's fields and [`dispatch`]
//! turns decoded events into [`StreamCallback`] reactions until a terminal
//! event arrives.
mod dispatch;
mod event;
pub(crate) mod framer;
mod response;

pub use dispatch::{StreamCallback, dispatch, run_stream};
pub use event::{EventStreamReader, StreamEvent, parse_event};
pub use framer::{DEFAULT_MAX_BUFFER_SIZE, FrameReader};
pub use response::{
    EventKind, SseFailedResponse, SseInvokeResponse, SseUsage, StreamOutcome, TaskData,
};
