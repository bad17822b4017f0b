//! Common imports for typical client usage.
pub use crate::{
    ChatGlmClient, ClientConfig, ClientError, Message, MessageRole, ResponseData,
    SseInvokeResponse, StreamCallback, StreamError, StreamOutcome, TaskData, TaskStatus,
};
