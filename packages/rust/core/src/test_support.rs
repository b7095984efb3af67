//! In-memory `LanguageModel` double for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use fathom_provider::{LanguageModel, PromptRequest, ProviderError};

type Script = Box<dyn Fn(&PromptRequest) -> Result<String, ProviderError> + Send + Sync>;

/// Answers every prompt with a closure and records what it was asked.
pub struct ScriptedModel {
    script: Script,
    delay: Duration,
    calls: Mutex<Vec<PromptRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&PromptRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<PromptRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls observed running at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, request: PromptRequest) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.script)(&request)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
