use std::io::{ErrorKind, Read};

use tracing::trace;

use crate::errors::StreamError;

/// Default upper bound for a single frame plus any unterminated pending bytes.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1_048_576;

const READ_CHUNK: usize = 4096;

/// Longest separator is `\r\n\r\n`; a match may start this many bytes
/// before the end of an already-scanned buffer.
const SEPARATOR_LOOKBACK: usize = 3;

/// Splits a blocking byte source into raw event frames.
///
/// A frame is everything between the previous boundary and the next blank
/// line, where a blank line is any of `\n\n`, `\r\r`, `\r\n\n`, `\n\r\n` or
/// `\r\n\r\n`. Bytes are read only when the buffer holds no complete frame.
pub struct FrameReader<R> {
    source: R,
    buf: Vec<u8>,
    scanned: usize,
    max_buffer_size: usize,
    eof: bool,
}

impl<R: Read> FrameReader<R> {
    /// Wraps `source`; `max_buffer_size` caps the bytes held for one frame.
    pub fn new(source: R, max_buffer_size: usize) -> Self {
        Self {
            source,
            buf: Vec::with_capacity(READ_CHUNK.min(max_buffer_size)),
            scanned: 0,
            max_buffer_size,
            eof: false,
        }
    }

    /// Returns the next frame, or `Ok(None)` once the source is exhausted.
    ///
    /// Unterminated bytes left at end of input come back as one last frame.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        loop {
            if let Some((idx, len)) = find_frame_delimiter(&self.buf[self.scanned..]) {
                let end = self.scanned + idx;
                let frame = self.buf[..end].to_vec();
                self.buf.drain(..end + len);
                self.scanned = 0;
                trace!(
                    event = "sse.frame",
                    frame_bytes = frame.len() as u64,
                    separator_bytes = len as u64,
                    buffered_bytes = self.buf.len() as u64
                );
                return Ok(Some(frame));
            }
            self.scanned = self.buf.len().saturating_sub(SEPARATOR_LOOKBACK);

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                self.scanned = 0;
                let frame = std::mem::take(&mut self.buf);
                trace!(
                    event = "sse.trailing_frame",
                    frame_bytes = frame.len() as u64
                );
                return Ok(Some(frame));
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<(), StreamError> {
        let room = self.max_buffer_size.saturating_sub(self.buf.len());
        if room == 0 {
            return Err(StreamError::BufferOverflow {
                max: self.max_buffer_size,
            });
        }
        let start = self.buf.len();
        self.buf.resize(start + room.min(READ_CHUNK), 0);
        let read = self.source.read(&mut self.buf[start..]);
        match read {
            Ok(0) => {
                self.buf.truncate(start);
                self.eof = true;
                Ok(())
            }
            Ok(n) => {
                self.buf.truncate(start + n);
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {
                self.buf.truncate(start);
                Ok(())
            }
            Err(err) => {
                self.buf.truncate(start);
                Err(StreamError::Read(err))
            }
        }
    }
}

/// Finds the earliest blank-line separator in `buf`.
///
/// Returns its start index and length in bytes. When several encodings start
/// at the same index the longest one wins.
pub(crate) fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    (0..buf.len()).find_map(|i| {
        let len = match &buf[i..] {
            [b'\r', b'\n', b'\r', b'\n', ..] => 4,
            [b'\r', b'\n', b'\n', ..] | [b'\n', b'\r', b'\n', ..] => 3,
            [b'\n', b'\n', ..] | [b'\r', b'\r', ..] => 2,
            _ => return None,
        };
        Some((i, len))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out at most one byte per `read` call.
    pub(crate) struct ByteByByte<R>(pub R);

    impl<R: Read> Read for ByteByByte<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            self.0.read(&mut buf[..1])
        }
    }

    /// Yields its bytes, then fails with the given error kind.
    pub(crate) struct FailAfter {
        pub data: Cursor<Vec<u8>>,
        pub kind: ErrorKind,
    }

    impl Read for FailAfter {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                return Err(std::io::Error::new(self.kind, "connection reset"));
            }
            Ok(n)
        }
    }

    fn frames(input: &[u8], max: usize) -> Result<Vec<Vec<u8>>, StreamError> {
        let mut reader = FrameReader::new(Cursor::new(input.to_vec()), max);
        let mut out = Vec::new();
        while let Some(frame) = reader.next_frame()? {
            out.push(frame);
        }
        Ok(out)
    }

    #[test]
    fn delimiter_search_picks_earliest_and_longest() {
        assert_eq!(find_frame_delimiter(b"abc"), None);
        assert_eq!(find_frame_delimiter(b"a\n\nb"), Some((1, 2)));
        assert_eq!(find_frame_delimiter(b"a\r\rb"), Some((1, 2)));
        assert_eq!(find_frame_delimiter(b"a\r\n\nb"), Some((1, 3)));
        assert_eq!(find_frame_delimiter(b"a\n\r\nb"), Some((1, 3)));
        assert_eq!(find_frame_delimiter(b"a\r\n\r\nb"), Some((1, 4)));
        // `\r\r` at index 3 is earlier than the `\n\n` at 5.
        assert_eq!(find_frame_delimiter(b"a\r\n\r\rx\n\n"), Some((3, 2)));
        assert_eq!(find_frame_delimiter(b"x\r\n\r"), None);
    }

    #[test]
    fn one_frame_per_separator_plus_trailing_segment() {
        let out = frames(b"one\n\ntwo\r\n\r\nthree\r\rtail", 64).expect("frames");
        assert_eq!(
            out,
            vec![
                b"one".to_vec(),
                b"two".to_vec(),
                b"three".to_vec(),
                b"tail".to_vec()
            ]
        );
    }

    #[test]
    fn terminated_input_ends_without_extra_frame() {
        let out = frames(b"a\n\nb\n\n", 64).expect("frames");
        assert_eq!(out, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn empty_input_is_end_of_stream() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()), 64);
        assert!(reader.next_frame().expect("eof").is_none());
        assert!(reader.next_frame().expect("still eof").is_none());
    }

    #[test]
    fn byte_by_byte_delivery_matches_bulk_delivery() {
        let input = b"id: 1\r\nevent: add\r\ndata: hi\r\n\r\nevent: finish\n\r\nrest";
        let bulk = frames(input, 64).expect("bulk");

        let mut reader = FrameReader::new(ByteByByte(Cursor::new(input.to_vec())), 64);
        let mut chunked = Vec::new();
        while let Some(frame) = reader.next_frame().expect("frame") {
            chunked.push(frame);
        }
        assert_eq!(bulk, chunked);
        assert_eq!(chunked.len(), 3);
        assert_eq!(chunked[1], b"event: finish".to_vec());
    }

    #[test]
    fn back_to_back_separators_yield_an_empty_frame() {
        let out = frames(b"a\n\n\n\nb", 64).expect("frames");
        assert_eq!(out, vec![b"a".to_vec(), Vec::new(), b"b".to_vec()]);
    }

    #[test]
    fn oversized_frame_is_fatal() {
        let err = frames(&[b'x'; 32], 16).expect_err("overflow");
        assert!(matches!(err, StreamError::BufferOverflow { max: 16 }));
    }

    #[test]
    fn trailing_frame_below_limit_is_returned_at_eof() {
        let out = frames(&[b'x'; 15], 16).expect("fits");
        assert_eq!(out, vec![vec![b'x'; 15]]);
    }

    #[test]
    fn buffer_is_reused_after_each_frame() {
        let mut input = Vec::new();
        for _ in 0..10 {
            input.extend_from_slice(b"data: 0123456789\n\n");
        }
        let out = frames(&input, 32).expect("frames fit individually");
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn read_errors_propagate() {
        let source = FailAfter {
            data: Cursor::new(b"event: add\n".to_vec()),
            kind: ErrorKind::ConnectionReset,
        };
        let mut reader = FrameReader::new(source, 64);
        let err = reader.next_frame().expect_err("read error");
        match err {
            StreamError::Read(io) => assert_eq!(io.kind(), ErrorKind::ConnectionReset),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
