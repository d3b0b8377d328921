use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::model::tree::TaskNode;
use crate::sync::service::Confirmer;

type Input = BufReader<Box<dyn AsyncRead + Send + Unpin>>;

/// Asks on the terminal before reopening a finished task with subtasks.
/// Anything but `y`/`yes` (including EOF) counts as no.
///
/// One buffered reader serves every prompt, so piped answers queued
/// behind the first line are kept for the next question.
pub struct StdinConfirmer {
    input: Mutex<Input>,
}

impl StdinConfirmer {
    pub fn new() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        StdinConfirmer {
            input: Mutex::new(BufReader::new(reader)),
        }
    }
}

impl Default for StdinConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm_cascade(&self, task: &TaskNode, affected: &[&TaskNode]) -> bool {
        let prompt = format!(
            "reopen {} \"{}\" and reset {} subtask(s) to TODO? [y/N] ",
            task.id(),
            task.task.title,
            affected.len()
        );
        let mut stderr = tokio::io::stderr();
        if stderr.write_all(prompt.as_bytes()).await.is_err() || stderr.flush().await.is_err() {
            return false;
        }

        let mut line = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut line).await {
            Ok(_) => is_yes(&line),
            Err(e) => {
                tracing::debug!(error = %e, "could not read confirmation");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
