use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ClientError;
use crate::sse::DEFAULT_MAX_BUFFER_SIZE;
use crate::token::DEFAULT_TOKEN_TTL;

pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v3/model-api";

/// Configuration for [`ChatGlmClient`](crate::ChatGlmClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// API key in `<id>.<secret>` form; signed into a token per request.
    pub api_key: String,
    /// Prefix that `/{model}/...` endpoint paths are appended to.
    pub base_url: String,
    /// HTTP timeout, covering the whole body of a streaming call.
    pub timeout: Duration,
    /// Lifetime of each generated token.
    pub token_ttl: Duration,
    /// Nucleus sampling value sent with every request.
    pub top_p: f32,
    /// Upper bound for one buffered SSE frame.
    pub max_buffer_size: usize,
}

impl ClientConfig {
    /// Creates a config with defaults and the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            token_ttl: DEFAULT_TOKEN_TTL,
            top_p: 0.7,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }

    /// Builds a config from `CHATGLM_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key/value source.
    ///
    /// Reads `CHATGLM_API_KEY` (required), `CHATGLM_BASE_URL`,
    /// `CHATGLM_TIMEOUT_SECS` and `CHATGLM_MAX_BUFFER_SIZE`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let api_key = lookup("CHATGLM_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ClientError::Config("missing CHATGLM_API_KEY".into()));
        }
        let mut config = Self::new(api_key.trim());
        if let Some(base_url) = lookup("CHATGLM_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config = config.base_url(base_url.trim());
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "CHATGLM_TIMEOUT_SECS")? {
            config = config.timeout(Duration::from_secs(secs));
        }
        if let Some(max) = parse_var::<usize>(&lookup, "CHATGLM_MAX_BUFFER_SIZE")? {
            config = config.max_buffer_size(max);
        }
        Ok(config)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn max_buffer_size(mut self, max: usize) -> Self {
        self.max_buffer_size = max;
        self
    }

    pub(crate) fn endpoint(&self, model: &str, action: &str) -> String {
        format!("{}/{model}/{action}", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.api_key.trim().is_empty() {
            return Err(ClientError::Config("api_key must not be empty".into()));
        }
        if self.max_buffer_size == 0 {
            return Err(ClientError::Config(
                "max_buffer_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key_id = self.api_key.split('.').next().unwrap_or_default();
        f.debug_struct("ClientConfig")
            .field("api_key", &format_args!("{key_id}.***"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("token_ttl", &self.token_ttl)
            .field("top_p", &self.top_p)
            .field("max_buffer_size", &self.max_buffer_size)
            .finish()
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ClientError> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClientError::Config(format!("invalid value for {key}: {raw:?}"))),
        None => Ok(None),
    }
}
