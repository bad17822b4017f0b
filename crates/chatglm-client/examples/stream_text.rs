use chatglm_client::prelude::*;

struct Stdout;

impl StreamCallback for Stdout {
    fn on_data(&mut self, response: &SseInvokeResponse) {
        print!("{}", response.data);
    }

    fn on_finish(&mut self, response: &SseInvokeResponse) {
        println!();
        if let Some(task) = &response.task {
            println!("{} {}", task.task_status, task.usage.total_tokens);
        }
    }

    fn on_error(&mut self, err: &StreamError) {
        eprintln!("stream error: {err}");
    }

    fn on_interrupt(&mut self) {
        println!("interrupted");
    }
}

fn main() -> Result<(), ClientError> {
    let client = ChatGlmClient::from_env()?;
    let prompt = [
        Message::user("Hello"),
        Message::assistant("I am an AI assistant."),
        Message::user("What can you do?"),
    ];
    client.sse_invoke("chatglm_6b", 0.2, &prompt, &mut Stdout)?;
    Ok(())
}
