#![allow(dead_code)]

//! Scripted user interaction for session tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use faultgraph::interact::{Interaction, InteractionError};

/// Answers from a queue, falling back to a fixed reply when it runs dry.
/// Every prompt is recorded for assertions.
pub struct ScriptedInteraction {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    asked: Mutex<Vec<String>>,
}

impl ScriptedInteraction {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: "no".to_string(),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply.to_string(),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.asked.lock().expect("prompt log lock").clone()
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn ask(&self, prompt: &str) -> Result<String, InteractionError> {
        self.asked
            .lock()
            .expect("prompt log lock")
            .push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Ok(reply)
    }
}
