use std::time::Duration;

use chatglm_client::prelude::*;

fn main() -> Result<(), ClientError> {
    let client = ChatGlmClient::from_env()?;
    let prompt = [Message::user("What is your name?")];

    let task_id = client.async_invoke("chatglm_6b", 0.2, &prompt)?;
    println!("task: {task_id}");

    let data = client.wait_for_task("chatglm_6b", &task_id, Duration::from_millis(200), 300)?;
    println!("{}", data.first_choice().unwrap_or_default());
    Ok(())
}
