use serde::{Deserialize, Serialize};

/// Event tags understood by the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Incremental output chunk.
    Add,
    /// Terminal success; carries task metadata.
    Finish,
    /// Terminal; generation was cut short by the service.
    Interrupted,
    /// Terminal failure reported by the service.
    Error,
    /// No `event` field. Its data is dropped without a reaction.
    Untagged,
    /// Anything else. Fatal for the stream.
    Unknown(String),
}

impl EventKind {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "add" => Self::Add,
            "finish" => Self::Finish,
            "interrupted" => Self::Interrupted,
            "error" => Self::Error,
            "" => Self::Untagged,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Token accounting sent with a `finish` event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseUsage {
    #[serde(default)]
    pub total_tokens: u64,
}

/// Task record decoded from the `meta` field of a `finish` event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub task_status: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub usage: SseUsage,
}

/// Payload handed to `on_data` and `on_finish`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseInvokeResponse {
    pub id: String,
    pub data: String,
    /// Present on completion only.
    pub task: Option<TaskData>,
}

/// How a streaming call ended when it did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Finished(SseInvokeResponse),
    Interrupted,
}

/// JSON body returned instead of an event stream when a call is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SseFailedResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub success: bool,
}
