//! Blocking client for the ChatGLM model API.
//!
//! Three invocation modes are exposed by [`ChatGlmClient`]: synchronous
//! (`invoke`), submit-and-poll (`async_invoke` + `wait_for_task`) and
//! streaming (`sse_invoke`). Streaming responses are decoded incrementally by
//! the [`sse`] module and reported through a [`StreamCallback`].
//!
//! # Streaming usage
//!
//! ```no_run
//! use chatglm_client::prelude::*;
//!
//! struct Print;
//!
//! impl StreamCallback for Print {
//!     fn on_data(&mut self, response: &SseInvokeResponse) {
//!         print!("{}", response.data);
//!     }
//!     fn on_finish(&mut self, response: &SseInvokeResponse) {
//!         if let Some(task) = &response.task {
//!             println!("\n{} {}", task.task_status, task.usage.total_tokens);
//!         }
//!     }
//!     fn on_error(&mut self, err: &StreamError) {
//!         eprintln!("error: {err}");
//!     }
//!     fn on_interrupt(&mut self) {
//!         println!("interrupted");
//!     }
//! }
//!
//! # fn main() -> Result<(), ClientError> {
//! let client = ChatGlmClient::new(ClientConfig::from_env()?)?;
//! client.sse_invoke("chatglm_6b", 0.2, &[Message::user("Hello")], &mut Print)?;
//! # Ok(())
//! # }
//! ```

/// HTTP client for the three invocation modes.
pub mod client;
/// Client configuration and environment loading.
pub mod config;
/// Public error types.
pub mod errors;
/// Request and response schemas of the JSON endpoints.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
/// Incremental event-stream framing, parsing and dispatch.
pub mod sse;
/// API key to bearer token signing.
pub mod token;

pub use client::ChatGlmClient;
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use errors::{ClientError, StreamError};
pub use model::{
    InvokeRequest, InvokeResponse, Message, MessageRole, RequestUsage, ResponseData, TaskStatus,
};
pub use sse::{SseInvokeResponse, StreamCallback, StreamOutcome, TaskData};
pub use token::generate_token;
