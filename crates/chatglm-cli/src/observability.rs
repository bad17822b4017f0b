use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

/// Filter used when neither `CHATGLM_LOG_LEVEL` nor `RUST_LOG` is usable.
const DEFAULT_DIRECTIVES: &str = "warn,chatglm=info,chatglm_client=info";

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn observability_enabled() -> bool {
    std::env::var("CHATGLM_OBSERVABILITY")
        .ok()
        .and_then(|value| parse_bool_env(&value))
        .unwrap_or(true)
}

fn resolve_env_filter() -> EnvFilter {
    filter_from(
        std::env::var("CHATGLM_LOG_LEVEL").ok().as_deref(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
    )
}

/// First parseable directive set wins: ours, then `RUST_LOG`, then the crate default.
fn filter_from(chatglm_level: Option<&str>, rust_log: Option<&str>) -> EnvFilter {
    [chatglm_level, rust_log]
        .into_iter()
        .flatten()
        .filter(|directives| !directives.trim().is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Installs the process-wide tracing subscriber once.
///
/// Environment variables:
/// - `CHATGLM_OBSERVABILITY`: `0`/`false`/`off` disables logging (default on).
/// - `CHATGLM_LOG_LEVEL`: filter directive, e.g. `debug` or `chatglm_client=trace`.
/// - `CHATGLM_JSON_LOG_PATH`: write JSON lines to this file instead of stderr.
/// - `RUST_LOG`: fallback filter when `CHATGLM_LOG_LEVEL` is unset.
///
/// Without either, this crate and the client log at `info` and everything
/// else at `warn`.
///
/// Console logs go to stderr so streamed model output on stdout stays clean.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !observability_enabled() {
            return;
        }

        let env_filter = resolve_env_filter();
        if let Ok(path_raw) = std::env::var("CHATGLM_JSON_LOG_PATH") {
            let path = std::path::PathBuf::from(path_raw);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let _ = std::fs::create_dir_all(parent);
            }
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("chatglm.logs.jsonl");
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}
