use std::fmt;

use serde::{Deserialize, Serialize};

/// Speaker of a prompt message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

/// One turn of the conversation sent as the prompt.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Body shared by `invoke`, `async-invoke` and `sse-invoke`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvokeRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a [Message],
    pub top_p: f32,
    pub temperature: f32,
}

/// Envelope of every JSON response.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InvokeResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<ResponseData>,
}

/// Lifecycle state of a model task.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Success,
    Fail,
    Processing,
    /// Status string this client does not know about.
    Other(String),
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SUCCESS" => Self::Success,
            "FAIL" => Self::Fail,
            "PROCESSING" => Self::Processing,
            _ => Self::Other(value),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "SUCCESS",
            Self::Fail => "FAIL",
            Self::Processing => "PROCESSING",
            Self::Other(other) => other,
        })
    }
}

/// Task payload of `invoke` and `async-invoke` responses.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ResponseData {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub request_id: String,
    pub task_status: TaskStatus,
    #[serde(default)]
    pub choices: Option<Vec<Message>>,
    #[serde(default)]
    pub usage: Option<RequestUsage>,
}

impl ResponseData {
    /// Content of the first choice, if the task produced any.
    pub fn first_choice(&self) -> Option<&str> {
        self.choices
            .as_deref()
            .and_then(|choices| choices.first())
            .map(|message| message.content.as_str())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct RequestUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}
