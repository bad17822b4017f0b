/// Errors raised while reading and dispatching a server-sent event stream.
///
/// Every variant is terminal for the streaming call that produced it.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The underlying byte source failed.
    #[error("event stream read failed: {0}")]
    Read(#[from] std::io::Error),
    /// A frame, or unterminated pending data, grew past the configured limit.
    #[error("event frame exceeds maximum buffer size of {max} bytes")]
    BufferOverflow { max: usize },
    /// A frame with no bytes at all (two separators back to back).
    #[error("event message was empty")]
    EmptyFrame,
    /// The `meta` field of a `finish` event is not a valid task record.
    #[error("invalid finish metadata: {0}")]
    Meta(#[source] serde_json::Error),
    /// The `event` tag is outside the known vocabulary.
    #[error("unsupported event type: {0:?}")]
    UnsupportedEvent(String),
    /// The service sent an `error` event.
    #[error("stream reported an error event (id={id:?}): {message}")]
    Remote { id: String, message: String },
    /// End of input was reached before any terminal event.
    #[error("event stream closed without a terminal event")]
    Closed,
}

impl StreamError {
    /// Short machine-friendly code used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::BufferOverflow { .. } => "buffer_overflow",
            Self::EmptyFrame => "empty_frame",
            Self::Meta(_) => "meta",
            Self::UnsupportedEvent(_) => "unsupported_event",
            Self::Remote { .. } => "remote",
            Self::Closed => "closed",
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The API key could not be turned into a signed token.
    #[error("token error: {0}")]
    Token(String),
    /// Request could not be sent or the response body could not be read.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with `success == false`.
    #[error("response error code:{code}, msg:{msg}")]
    Api { code: i64, msg: String },
    /// The response body did not match the expected schema.
    #[error("decode error: {0}")]
    Decode(String),
    /// An asynchronous task finished with status `FAIL`.
    #[error("task {task_id} failed")]
    TaskFailed { task_id: String },
    /// Polling gave up before the task reached a final status.
    #[error("task {task_id} still processing after {polls} polls")]
    PollLimit { task_id: String, polls: u32 },
    /// Terminal failure of a streaming call.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl ClientError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}
