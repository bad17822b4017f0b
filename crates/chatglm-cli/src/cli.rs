use std::path::PathBuf;

use chatglm_client::Message;
use clap::{Parser, Subcommand};

/// Talk to a ChatGLM model from the terminal.
#[derive(Parser, Debug)]
#[command(name = "chatglm", version, about, long_about = None)]
pub struct Args {
    /// Model name, as it appears in the endpoint path
    #[arg(short, long, default_value = "chatglm_6b", global = true)]
    pub model: String,

    /// Sampling temperature
    #[arg(short, long, default_value_t = 0.2, global = true)]
    pub temperature: f32,

    /// `.env` file to load before reading `CHATGLM_*` variables
    #[arg(long, value_name = "PATH", global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream the reply as it is generated
    Stream {
        /// Prompt messages, sent as consecutive user turns
        #[arg(required = true, value_name = "PROMPT")]
        prompt: Vec<String>,
    },
    /// Wait for the complete reply in a single request
    Invoke {
        #[arg(required = true, value_name = "PROMPT")]
        prompt: Vec<String>,
    },
    /// Submit a task, then poll until it finishes
    Async {
        #[arg(required = true, value_name = "PROMPT")]
        prompt: Vec<String>,

        /// Delay between status checks
        #[arg(long, default_value_t = 200)]
        poll_interval_ms: u64,

        /// Give up after this many status checks
        #[arg(long, default_value_t = 300)]
        max_polls: u32,
    },
}

impl Command {
    pub fn messages(&self) -> Vec<Message> {
        let prompt = match self {
            Self::Stream { prompt } | Self::Invoke { prompt } | Self::Async { prompt, .. } => {
                prompt
            }
        };
        prompt.iter().map(Message::user).collect()
    }
}
