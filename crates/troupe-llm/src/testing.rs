//! Scripted generators for tests.
//!
//! [`ScriptedGenerator`] answers calls from a FIFO of canned results and
//! records every prompt it saw. [`ScriptedFactory`] hands the same generator
//! out for every credential, so replies are consumed in call order across
//! the coordinator and all participants.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use troupe_core::CredentialToken;

use crate::provider::{GenerationParams, Generator, GeneratorFactory, ProviderError, ProviderResult};

/// One recorded `generate` call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    /// System prompt sent.
    pub system_prompt: String,
    /// User prompt sent.
    pub user_prompt: String,
    /// Parameters sent.
    pub params: GenerationParams,
}

/// Generator that replays queued results.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<ProviderResult<String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    /// Empty script; every call fails until replies are pushed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script that answers with `replies` in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let generator = Self::new();
        for reply in replies {
            generator.push_reply(reply);
        }
        generator
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(Ok(reply.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: ProviderError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> ProviderResult<String> {
        self.calls.lock().push(RecordedCall {
            system_prompt: system_prompt.to_owned(),
            user_prompt: user_prompt.to_owned(),
            params: *params,
        });
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Malformed("script exhausted".into())))
    }
}

/// Factory that returns one shared [`ScriptedGenerator`] for every credential.
pub struct ScriptedFactory {
    generator: Arc<ScriptedGenerator>,
    issued: Mutex<Vec<CredentialToken>>,
}

impl ScriptedFactory {
    /// Wrap a shared generator.
    pub fn new(generator: Arc<ScriptedGenerator>) -> Self {
        Self {
            generator,
            issued: Mutex::new(Vec::new()),
        }
    }

    /// The shared generator.
    pub fn generator(&self) -> &Arc<ScriptedGenerator> {
        &self.generator
    }

    /// Credentials generators were built for, in request order.
    pub fn issued(&self) -> Vec<CredentialToken> {
        self.issued.lock().clone()
    }
}

impl GeneratorFactory for ScriptedFactory {
    fn for_credential(&self, credential: &CredentialToken) -> ProviderResult<Arc<dyn Generator>> {
        self.issued.lock().push(credential.clone());
        Ok(self.generator.clone())
    }
}
