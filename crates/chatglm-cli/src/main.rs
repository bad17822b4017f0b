//! `chatglm`: command-line front end for the ChatGLM client.

mod cli;
mod observability;
mod reporter;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use chatglm_client::{ChatGlmClient, ClientError, ResponseData};
use clap::Parser as _;
use tracing::info;

use crate::cli::{Args, Command};
use crate::observability::init_observability;
use crate::reporter::ConsoleReporter;

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        // The reporter has already printed stream failures.
        Err(ClientError::Stream(_)) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("chatglm: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), ClientError> {
    load_env(args.env_file.as_deref())?;
    init_observability();

    let client = ChatGlmClient::from_env()?;
    let messages = args.command.messages();
    info!(
        event = "cli.start",
        model = %args.model,
        temperature = args.temperature as f64,
        messages = messages.len() as u64
    );

    match &args.command {
        Command::Stream { .. } => {
            let mut reporter = ConsoleReporter::new(std::io::stdout().lock());
            client.sse_invoke(&args.model, args.temperature, &messages, &mut reporter)?;
        }
        Command::Invoke { .. } => {
            let data = client.invoke(&args.model, args.temperature, &messages)?;
            print_reply(&data);
        }
        Command::Async {
            poll_interval_ms,
            max_polls,
            ..
        } => {
            let task_id = client.async_invoke(&args.model, args.temperature, &messages)?;
            println!("task: {task_id}");
            let data = client.wait_for_task(
                &args.model,
                &task_id,
                Duration::from_millis(*poll_interval_ms),
                *max_polls,
            )?;
            print_reply(&data);
        }
    }
    Ok(())
}

/// Loads `.env` from `path`, or from the working directory when no path is
/// given. Only an explicitly requested file is required to exist.
fn load_env(path: Option<&Path>) -> Result<(), ClientError> {
    match path {
        Some(path) => dotenvy::from_path(path)
            .map_err(|e| ClientError::Config(format!("failed to load {}: {e}", path.display()))),
        None => {
            dotenvy::dotenv().ok();
            Ok(())
        }
    }
}

fn print_reply(data: &ResponseData) {
    println!("{}", data.first_choice().unwrap_or_default());
    if let Some(usage) = &data.usage {
        println!("{} {}", data.task_status, usage.total_tokens);
    }
}
