//! Fakes for the model traits, shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{ChatModel, Embedder, ModelError};

pub const LETTER_DIM: usize = 27;

/// Deterministic embedding: letter counts plus a constant bias component.
pub fn letter_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; LETTER_DIM];
    for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
        v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    v[LETTER_DIM - 1] = 1.0;
    v
}

/// Embeds with [`letter_vector`]; fails the first `failures` calls.
#[derive(Default)]
pub struct LetterEmbedder {
    failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl LetterEmbedder {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ModelError::Unavailable("connection refused".into()));
        }
        Ok(letter_vector(text))
    }
}

/// Replies with queued responses in order, then repeats the fallback. Records every prompt.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn always(reply: &str) -> Self {
        Self::new(Vec::new(), reply)
    }

    pub fn new(replies: Vec<Result<String, String>>, fallback: &str) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: fallback.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(msg)) => Err(ModelError::Unavailable(msg)),
            None => Ok(self.fallback.clone()),
        }
    }
}
