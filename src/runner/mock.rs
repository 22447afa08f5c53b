//! Scripted runner for unit tests

use crate::runner::{CommandOutput, CommandRunner, Invocation, RunnerError};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

type Handler = Box<dyn Fn(&Invocation) -> CommandOutput + Send + Sync>;

/// Answers every invocation through a closure and remembers what it ran
pub struct MockRunner {
    handler: Handler,
    delay: Option<Duration>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockRunner {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Invocation) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command succeeds with its own text as output
    pub fn succeeding() -> Self {
        Self::new(|inv| CommandOutput::success(inv.command.clone()))
    }

    /// Commands containing `needle` exit with `code`, the rest succeed
    pub fn failing_on(needle: &'static str, code: i32) -> Self {
        Self::new(move |inv| {
            if inv.command.contains(needle) {
                CommandOutput::failure(code, format!("{} failed", needle))
            } else {
                CommandOutput::success("ok")
            }
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Raw commands received so far
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|inv| inv.command.clone())
            .collect()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok((self.handler)(invocation))
    }
}
