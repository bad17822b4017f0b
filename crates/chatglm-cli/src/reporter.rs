use std::io::Write;

use chatglm_client::{SseInvokeResponse, StreamCallback, StreamError};

/// Writes streamed output to a terminal-like sink as it arrives.
pub struct ConsoleReporter<W> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    // Write failures are logged, never propagated into the stream.
    fn emit(&mut self, args: std::fmt::Arguments<'_>) {
        if let Err(err) = self.out.write_fmt(args).and_then(|_| self.out.flush()) {
            tracing::debug!(event = "cli.write_failed", error = %err);
        }
    }
}

impl<W: Write> StreamCallback for ConsoleReporter<W> {
    fn on_data(&mut self, response: &SseInvokeResponse) {
        self.emit(format_args!("{}", response.data));
    }

    fn on_finish(&mut self, response: &SseInvokeResponse) {
        match &response.task {
            Some(task) => self.emit(format_args!(
                "\n{} {}\n",
                task.task_status, task.usage.total_tokens
            )),
            None => self.emit(format_args!("\n")),
        }
    }

    fn on_error(&mut self, err: &StreamError) {
        self.emit(format_args!("\nerror: {err}\n"));
    }

    fn on_interrupt(&mut self) {
        self.emit(format_args!("\ninterrupted\n"));
    }
}
