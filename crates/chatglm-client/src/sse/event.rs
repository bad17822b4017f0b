use std::io::Read;

use crate::errors::StreamError;

use super::framer::FrameReader;

const HEADER_ID: &[u8] = b"id:";
const HEADER_DATA: &[u8] = b"data:";
const HEADER_EVENT: &[u8] = b"event:";
const HEADER_META: &[u8] = b"meta:";

/// Fields decoded from one event frame. Empty means absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamEvent {
    pub id: String,
    pub data: String,
    pub event: String,
    /// Raw `meta` payload; only `finish` events carry one.
    pub meta: Vec<u8>,
}

impl StreamEvent {
    /// Whether any field was present.
    pub fn has_content(&self) -> bool {
        !self.id.is_empty()
            || !self.data.is_empty()
            || !self.event.is_empty()
            || !self.meta.is_empty()
    }
}

/// Decodes one frame into a [`StreamEvent`].
///
/// Lines end at either `\n` or `\r`. Unknown fields are skipped so new
/// server-side fields never break a stream.
pub fn parse_event(frame: &[u8]) -> Result<StreamEvent, StreamError> {
    if frame.is_empty() {
        return Err(StreamError::EmptyFrame);
    }
    let mut event = StreamEvent::default();
    let mut data = Vec::new();
    let lines = frame
        .split(|b| *b == b'\n' || *b == b'\r')
        .filter(|line| !line.is_empty());
    for line in lines {
        if let Some(rest) = line.strip_prefix(HEADER_ID) {
            event.id = lossy(trim_value(rest));
        } else if let Some(rest) = line.strip_prefix(HEADER_DATA) {
            data.extend_from_slice(trim_value(rest));
            data.push(b'\n');
        } else if line == b"data" {
            data.push(b'\n');
        } else if let Some(rest) = line.strip_prefix(HEADER_EVENT) {
            event.event = lossy(trim_value(rest));
        } else if let Some(rest) = line.strip_prefix(HEADER_META) {
            event.meta = trim_value(rest).to_vec();
        }
    }
    if data.last() == Some(&b'\n') {
        data.pop();
    }
    event.data = lossy(&data);
    Ok(event)
}

/// Drops one optional leading space and one trailing line feed.
fn trim_value(value: &[u8]) -> &[u8] {
    let value = value.strip_prefix(b" ").unwrap_or(value);
    value.strip_suffix(b"\n").unwrap_or(value)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Pulls frames from a byte source and decodes them one at a time.
pub struct EventStreamReader<R> {
    frames: FrameReader<R>,
}

impl<R: Read> EventStreamReader<R> {
    pub fn new(source: R, max_buffer_size: usize) -> Self {
        Self {
            frames: FrameReader::new(source, max_buffer_size),
        }
    }

    /// Reads and parses the next event; `Ok(None)` at end of stream.
    pub fn read_event(&mut self) -> Result<Option<StreamEvent>, StreamError> {
        match self.frames.next_frame()? {
            Some(frame) => parse_event(&frame).map(Some),
            None => Ok(None),
        }
    }
}
