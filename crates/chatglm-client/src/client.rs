use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, info_span, warn};

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::model::{InvokeRequest, InvokeResponse, Message, ResponseData, TaskStatus};
use crate::sse::{self, SseFailedResponse, StreamCallback, StreamOutcome};
use crate::token::generate_token;

const EVENT_STREAM: &str = "text/event-stream";

/// Blocking client for the ChatGLM model API.
///
/// Every request is signed with a freshly generated token. Calls share one
/// connection pool but no other state, so a client can be used from several
/// threads at once.
#[derive(Clone, Debug)]
pub struct ChatGlmClient {
    http: Client,
    config: ClientConfig,
}

impl ChatGlmClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Creates a client from `CHATGLM_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs the model synchronously and returns the finished task.
    pub fn invoke(
        &self,
        model: &str,
        temperature: f32,
        prompt: &[Message],
    ) -> Result<ResponseData, ClientError> {
        let url = self.config.endpoint(model, "invoke");
        debug!(
            event = "invoke.request",
            model = model,
            messages = prompt.len() as u64
        );
        let response = self
            .signed(self.http.post(&url))?
            .json(&self.request(model, temperature, prompt))
            .send()
            .map_err(ClientError::transport)?;
        decode_response(response)
    }

    /// Submits a task and returns its id without waiting for the result.
    pub fn async_invoke(
        &self,
        model: &str,
        temperature: f32,
        prompt: &[Message],
    ) -> Result<String, ClientError> {
        let url = self.config.endpoint(model, "async-invoke");
        let response = self
            .signed(self.http.post(&url))?
            .json(&self.request(model, temperature, prompt))
            .send()
            .map_err(ClientError::transport)?;
        let data = decode_response(response)?;
        debug!(event = "async_invoke.submitted", model = model, task_id = %data.task_id);
        Ok(data.task_id)
    }

    /// Fetches the current state of an asynchronous task.
    pub fn async_invoke_task(
        &self,
        model: &str,
        task_id: &str,
    ) -> Result<ResponseData, ClientError> {
        let url = self.config.endpoint(model, &format!("async-invoke/{task_id}"));
        let response = self
            .signed(self.http.get(&url))?
            .send()
            .map_err(ClientError::transport)?;
        decode_response(response)
    }

    /// Polls a task every `interval` until it succeeds or fails.
    ///
    /// Gives up with [`ClientError::PollLimit`] after `max_polls` lookups.
    pub fn wait_for_task(
        &self,
        model: &str,
        task_id: &str,
        interval: Duration,
        max_polls: u32,
    ) -> Result<ResponseData, ClientError> {
        for poll in 1..=max_polls {
            let data = self.async_invoke_task(model, task_id)?;
            match data.task_status {
                TaskStatus::Success => return Ok(data),
                TaskStatus::Fail => {
                    return Err(ClientError::TaskFailed {
                        task_id: task_id.to_string(),
                    });
                }
                ref status => {
                    debug!(
                        event = "async_invoke.pending",
                        task_id = task_id,
                        poll = poll,
                        status = %status
                    );
                }
            }
            if poll < max_polls {
                std::thread::sleep(interval);
            }
        }
        Err(ClientError::PollLimit {
            task_id: task_id.to_string(),
            polls: max_polls,
        })
    }

    /// Streams a completion, driving `callback` as events arrive.
    ///
    /// Blocks the calling thread until a terminal event, an error, or the
    /// end of the response body.
    pub fn sse_invoke<C>(
        &self,
        model: &str,
        temperature: f32,
        prompt: &[Message],
        callback: &mut C,
    ) -> Result<StreamOutcome, ClientError>
    where
        C: StreamCallback + ?Sized,
    {
        let call_id = uuid::Uuid::new_v4();
        let span = info_span!("sse_invoke", call_id = %call_id, model = model);
        let _entered = span.enter();

        let url = self.config.endpoint(model, "sse-invoke");
        let response = self
            .signed(self.http.post(&url))?
            .header(ACCEPT, EVENT_STREAM)
            .json(&self.request(model, temperature, prompt))
            .send()
            .map_err(ClientError::transport)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !status.is_success() || content_type.starts_with("application/json") {
            return Err(rejected_stream(status, response));
        }
        debug!(
            event = "sse.opened",
            status = status.as_u16(),
            content_type = %content_type
        );

        let outcome = sse::run_stream(response, self.config.max_buffer_size, callback)?;
        Ok(outcome)
    }

    fn request<'a>(
        &self,
        model: &'a str,
        temperature: f32,
        prompt: &'a [Message],
    ) -> InvokeRequest<'a> {
        InvokeRequest {
            model,
            prompt,
            top_p: self.config.top_p,
            temperature,
        }
    }

    fn signed(&self, builder: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = generate_token(&self.config.api_key, self.config.token_ttl)?;
        Ok(builder
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, token))
    }
}

fn decode_response(response: Response) -> Result<ResponseData, ClientError> {
    let status = response.status();
    let body = response.text().map_err(ClientError::transport)?;
    let parsed: InvokeResponse = serde_json::from_str(&body)
        .map_err(|e| ClientError::decode(format!("status {status}: {e}: {body}")))?;
    if !parsed.success {
        warn!(event = "invoke.rejected", code = parsed.code, msg = %parsed.msg);
        return Err(ClientError::Api {
            code: parsed.code,
            msg: parsed.msg,
        });
    }
    parsed
        .data
        .ok_or_else(|| ClientError::decode("successful response without data"))
}

fn rejected_stream(status: StatusCode, response: Response) -> ClientError {
    let body = response
        .text()
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    match serde_json::from_str::<SseFailedResponse>(&body) {
        Ok(failed) => {
            warn!(
                event = "sse.rejected",
                status = status.as_u16(),
                code = failed.code,
                msg = %failed.msg
            );
            ClientError::Api {
                code: failed.code,
                msg: failed.msg,
            }
        }
        Err(_) => ClientError::Transport(format!(
            "sse-invoke request failed with status {status}: {body}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StreamError;
    use crate::sse::SseInvokeResponse;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    const KEY: &str = "my-id.c2VjcmV0";

    struct Canned {
        status: &'static str,
        content_type: &'static str,
        body: String,
    }

    impl Canned {
        fn json(body: &str) -> Self {
            Self {
                status: "200 OK",
                content_type: "application/json",
                body: body.to_string(),
            }
        }

        fn events(body: &str) -> Self {
            Self {
                status: "200 OK",
                content_type: "text/event-stream",
                body: body.to_string(),
            }
        }
    }

    /// Answers one connection per canned response and returns the raw
    /// requests it received.
    fn serve(responses: Vec<Canned>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for canned in responses {
                let (stream, _) = listener.accept().expect("accept");
                let mut reader = BufReader::new(stream);
                let mut request = String::new();
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).expect("request line");
                    let lower = line.to_ascii_lowercase();
                    if let Some(value) = lower.strip_prefix("content-length:") {
                        content_length = value.trim().parse().expect("length");
                    }
                    request.push_str(&line);
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                }
                let mut body = vec![0u8; content_length];
                reader.read_exact(&mut body).expect("request body");
                request.push_str(&String::from_utf8_lossy(&body));
                requests.push(request);

                let mut stream = reader.into_inner();
                write!(
                    stream,
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    canned.status,
                    canned.content_type,
                    canned.body.len(),
                    canned.body
                )
                .expect("response");
                stream.flush().expect("flush");
            }
            requests
        });
        (base_url, handle)
    }

    fn client(base_url: &str) -> ChatGlmClient {
        ChatGlmClient::new(
            ClientConfig::new(KEY)
                .base_url(base_url)
                .timeout(Duration::from_secs(5)),
        )
        .expect("client")
    }

    #[derive(Default)]
    struct Collect {
        text: String,
        finished: Option<SseInvokeResponse>,
        errors: Vec<String>,
        interrupted: bool,
    }

    impl StreamCallback for Collect {
        fn on_data(&mut self, response: &SseInvokeResponse) {
            self.text.push_str(&response.data);
        }

        fn on_finish(&mut self, response: &SseInvokeResponse) {
            self.finished = Some(response.clone());
        }

        fn on_error(&mut self, err: &StreamError) {
            self.errors.push(err.to_string());
        }

        fn on_interrupt(&mut self) {
            self.interrupted = true;
        }
    }

    #[test]
    fn sse_invoke_streams_chunks_until_finish() {
        let body = concat!(
            "id: 8\nevent: add\ndata: Hello\n\n",
            "id: 8\nevent: add\ndata: , world\n\n",
            "id: 8\nevent: finish\n",
            "meta: {\"task_id\":\"t1\",\"task_status\":\"SUCCESS\",\"request_id\":\"r1\",\"usage\":{\"total_tokens\":12}}\n\n",
        );
        let (base_url, server) = serve(vec![Canned::events(body)]);
        let mut collect = Collect::default();
        let outcome = client(&base_url)
            .sse_invoke("chatglm_6b", 0.2, &[Message::user("hi")], &mut collect)
            .expect("stream");

        assert!(matches!(outcome, StreamOutcome::Finished(_)));
        assert_eq!(collect.text, "Hello, world");
        let task = collect.finished.and_then(|r| r.task).expect("task");
        assert_eq!(task.usage.total_tokens, 12);
        assert!(collect.errors.is_empty());

        let requests = server.join().expect("server");
        let request = requests[0].to_ascii_lowercase();
        assert!(request.starts_with("post /chatglm_6b/sse-invoke "));
        assert!(request.contains("accept: text/event-stream"));
        assert!(request.contains("authorization: "));
        assert!(requests[0].contains("\"prompt\":[{\"role\":\"user\",\"content\":\"hi\"}]"));
    }

    #[test]
    fn sse_invoke_reports_interruption() {
        let (base_url, server) = serve(vec![Canned::events(
            "event: add\ndata: par\n\nevent: interrupted\n\nevent: add\ndata: never\n\n",
        )]);
        let mut collect = Collect::default();
        let outcome = client(&base_url)
            .sse_invoke("chatglm_6b", 0.2, &[Message::user("hi")], &mut collect)
            .expect("stream");
        server.join().expect("server");

        assert_eq!(outcome, StreamOutcome::Interrupted);
        assert!(collect.interrupted);
        assert_eq!(collect.text, "par");
    }

    #[test]
    fn sse_invoke_surfaces_premature_close() {
        let (base_url, server) = serve(vec![Canned::events("event: add\ndata: half")]);
        let mut collect = Collect::default();
        let err = client(&base_url)
            .sse_invoke("chatglm_6b", 0.2, &[Message::user("hi")], &mut collect)
            .expect_err("closed");
        server.join().expect("server");

        assert!(matches!(err, ClientError::Stream(StreamError::Closed)));
        assert_eq!(collect.text, "half");
        assert_eq!(collect.errors.len(), 1);
        assert!(collect.finished.is_none());
    }

    #[test]
    fn sse_invoke_rejection_is_an_api_error() {
        let (base_url, server) = serve(vec![Canned::json(
            r#"{"code":1002,"msg":"invalid token","success":false}"#,
        )]);
        let mut collect = Collect::default();
        let err = client(&base_url)
            .sse_invoke("chatglm_6b", 0.2, &[Message::user("hi")], &mut collect)
            .expect_err("rejected");
        server.join().expect("server");

        assert!(matches!(err, ClientError::Api { code: 1002, ref msg } if msg == "invalid token"));
        assert!(collect.errors.is_empty());
    }

    #[test]
    fn invoke_returns_finished_task() {
        let (base_url, server) = serve(vec![Canned::json(
            r#"{"code":200,"msg":"ok","success":true,"data":{"task_id":"t9","request_id":"r","task_status":"SUCCESS","choices":[{"role":"assistant","content":"I am ChatGLM"}]}}"#,
        )]);
        let data = client(&base_url)
            .invoke("chatglm_6b", 0.2, &[Message::user("who are you")])
            .expect("invoke");
        let requests = server.join().expect("server");

        assert_eq!(data.first_choice(), Some("I am ChatGLM"));
        assert!(requests[0].starts_with("POST /chatglm_6b/invoke "));
        assert!(requests[0].contains("\"top_p\":0.7"));
    }

    #[test]
    fn unsuccessful_response_becomes_api_error() {
        let (base_url, server) = serve(vec![Canned::json(
            r#"{"code":1261,"msg":"prompt too long","success":false}"#,
        )]);
        let err = client(&base_url)
            .invoke("chatglm_6b", 0.2, &[Message::user("x")])
            .expect_err("api error");
        server.join().expect("server");
        assert!(matches!(err, ClientError::Api { code: 1261, .. }));
    }

    #[test]
    fn async_invoke_then_poll_until_success() {
        let (base_url, server) = serve(vec![
            Canned::json(
                r#"{"code":200,"msg":"ok","success":true,"data":{"task_id":"t42","task_status":"PROCESSING"}}"#,
            ),
            Canned::json(
                r#"{"code":200,"msg":"ok","success":true,"data":{"task_id":"t42","task_status":"PROCESSING"}}"#,
            ),
            Canned::json(
                r#"{"code":200,"msg":"ok","success":true,"data":{"task_id":"t42","task_status":"SUCCESS","choices":[{"role":"assistant","content":"done"}]}}"#,
            ),
        ]);
        let client = client(&base_url);
        let task_id = client
            .async_invoke("chatglm_6b", 0.2, &[Message::user("x")])
            .expect("submit");
        assert_eq!(task_id, "t42");

        let data = client
            .wait_for_task("chatglm_6b", &task_id, Duration::from_millis(1), 5)
            .expect("poll");
        assert_eq!(data.first_choice(), Some("done"));

        let requests = server.join().expect("server");
        assert!(requests[0].starts_with("POST /chatglm_6b/async-invoke "));
        assert!(requests[1].starts_with("GET /chatglm_6b/async-invoke/t42 "));
        assert!(requests[2].starts_with("GET /chatglm_6b/async-invoke/t42 "));
    }

    #[test]
    fn failed_task_stops_polling() {
        let (base_url, server) = serve(vec![Canned::json(
            r#"{"code":200,"msg":"ok","success":true,"data":{"task_id":"t7","task_status":"FAIL"}}"#,
        )]);
        let err = client(&base_url)
            .wait_for_task("chatglm_6b", "t7", Duration::from_millis(1), 5)
            .expect_err("failed");
        server.join().expect("server");
        assert!(matches!(err, ClientError::TaskFailed { task_id } if task_id == "t7"));
    }

    #[test]
    fn poll_limit_is_reported() {
        let pending =
            r#"{"code":200,"msg":"ok","success":true,"data":{"task_id":"t1","task_status":"PROCESSING"}}"#;
        let (base_url, server) = serve(vec![Canned::json(pending), Canned::json(pending)]);
        let err = client(&base_url)
            .wait_for_task("chatglm_6b", "t1", Duration::from_millis(1), 2)
            .expect_err("limit");
        server.join().expect("server");
        assert!(matches!(err, ClientError::PollLimit { polls: 2, .. }));
    }

    #[test]
    fn malformed_api_key_fails_before_sending() {
        let config = ClientConfig::new("not-a-key").base_url("http://127.0.0.1:9");
        let client = ChatGlmClient::new(config).expect("client");
        let err = client
            .invoke("chatglm_6b", 0.2, &[Message::user("x")])
            .expect_err("token");
        assert!(matches!(err, ClientError::Token(_)));
    }
}
