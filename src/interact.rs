//! The interaction capability: asking the actual user a question.
//!
//! Behaviors and the oracle's disambiguation step never touch stdin
//! directly; they go through [`Interaction::ask`]. Production wires the
//! capability to the terminal, training hard-binds [`DenyAll`] so the
//! builder never blocks and every branch of every segment gets enumerated.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Errors from user interaction.
#[derive(Debug, Error, Diagnostic)]
pub enum InteractionError {
    /// The input stream ended (EOF) before an answer arrived.
    #[error("input closed before an answer was given")]
    #[diagnostic(code(faultgraph::interact::closed))]
    Closed,

    /// Reading the answer failed.
    #[error("failed to read user input")]
    #[diagnostic(code(faultgraph::interact::io))]
    Io(#[from] std::io::Error),
}

/// Capability to ask the user one free-text question.
#[async_trait]
pub trait Interaction: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<String, InteractionError>;
}

/// Terminal-backed interaction: prints the prompt, reads one line.
pub struct StdioInteraction;

#[async_trait]
impl Interaction for StdioInteraction {
    async fn ask(&self, prompt: &str) -> Result<String, InteractionError> {
        println!("{prompt}");
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(InteractionError::Closed);
        }
        Ok(line.trim().to_string())
    }
}

/// Interaction that always answers `"no"`.
///
/// Training binds this so that no branch is ever confirmed interactively
/// and the builder enumerates every path without blocking.
pub struct DenyAll;

#[async_trait]
impl Interaction for DenyAll {
    async fn ask(&self, _prompt: &str) -> Result<String, InteractionError> {
        Ok("no".to_string())
    }
}
