use std::io::Read;

use tracing::{debug, trace, warn};

use crate::errors::StreamError;

use super::event::EventStreamReader;
use super::response::{EventKind, SseInvokeResponse, StreamOutcome, TaskData};

/// Reactions a streaming call drives in the caller.
///
/// Exactly one terminal reaction (`on_finish`, `on_interrupt` or `on_error`)
/// fires per call; `on_data` may fire any number of times before it.
pub trait StreamCallback {
    /// An `add` event: one chunk of generated text.
    fn on_data(&mut self, response: &SseInvokeResponse);
    /// A `finish` event; `response.task` is always set.
    fn on_finish(&mut self, response: &SseInvokeResponse);
    fn on_error(&mut self, err: &StreamError);
    fn on_interrupt(&mut self);
}

impl<T: StreamCallback + ?Sized> StreamCallback for &mut T {
    fn on_data(&mut self, response: &SseInvokeResponse) {
        (**self).on_data(response)
    }

    fn on_finish(&mut self, response: &SseInvokeResponse) {
        (**self).on_finish(response)
    }

    fn on_error(&mut self, err: &StreamError) {
        (**self).on_error(err)
    }

    fn on_interrupt(&mut self) {
        (**self).on_interrupt()
    }
}

/// Reads events until a terminal one arrives and drives `callback`.
///
/// Any failure is reported once through `on_error` and then returned. Nothing
/// past the terminal event is read.
pub fn dispatch<R, C>(
    reader: &mut EventStreamReader<R>,
    callback: &mut C,
) -> Result<StreamOutcome, StreamError>
where
    R: Read,
    C: StreamCallback + ?Sized,
{
    match drive(reader, callback) {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            warn!(event = "sse.failed", code = err.code(), error = %err);
            callback.on_error(&err);
            Err(err)
        }
    }
}

/// Wraps `source` in a reader bounded by `max_buffer_size` and dispatches it.
pub fn run_stream<R, C>(
    source: R,
    max_buffer_size: usize,
    callback: &mut C,
) -> Result<StreamOutcome, StreamError>
where
    R: Read,
    C: StreamCallback + ?Sized,
{
    let mut reader = EventStreamReader::new(source, max_buffer_size);
    dispatch(&mut reader, callback)
}

fn drive<R, C>(
    reader: &mut EventStreamReader<R>,
    callback: &mut C,
) -> Result<StreamOutcome, StreamError>
where
    R: Read,
    C: StreamCallback + ?Sized,
{
    let mut chunks = 0u64;
    loop {
        let Some(event) = reader.read_event()? else {
            return Err(StreamError::Closed);
        };
        if !event.has_content() {
            trace!(event = "sse.event_dropped");
            continue;
        }

        match EventKind::parse(&event.event) {
            EventKind::Add => {
                chunks += 1;
                trace!(
                    event = "sse.data",
                    id = %event.id,
                    seq = chunks,
                    data_bytes = event.data.len() as u64
                );
                callback.on_data(&SseInvokeResponse {
                    id: event.id,
                    data: event.data,
                    task: None,
                });
            }
            EventKind::Finish => {
                let task: TaskData =
                    serde_json::from_slice(&event.meta).map_err(StreamError::Meta)?;
                debug!(
                    event = "sse.finished",
                    id = %event.id,
                    chunks = chunks,
                    task_id = %task.task_id,
                    task_status = %task.task_status,
                    total_tokens = task.usage.total_tokens
                );
                let response = SseInvokeResponse {
                    id: event.id,
                    data: event.data,
                    task: Some(task),
                };
                callback.on_finish(&response);
                return Ok(StreamOutcome::Finished(response));
            }
            EventKind::Interrupted => {
                debug!(event = "sse.interrupted", id = %event.id, chunks = chunks);
                callback.on_interrupt();
                return Ok(StreamOutcome::Interrupted);
            }
            EventKind::Error => {
                let message = if event.data.is_empty() {
                    "stream error".to_string()
                } else {
                    event.data
                };
                return Err(StreamError::Remote {
                    id: event.id,
                    message,
                });
            }
            EventKind::Untagged => {
                trace!(
                    event = "sse.untagged_dropped",
                    id = %event.id,
                    data_bytes = event.data.len() as u64
                );
            }
            EventKind::Unknown(tag) => return Err(StreamError::UnsupportedEvent(tag)),
        }
    }
}
