use serde::{Deserialize, Serialize};

/// A single turn in a diagnostic dialog, with a role and text content.
///
/// The dialog log is the append-only sequence of these turns: the user's
/// issue statement, their answers, and the engine's clarification prompts.
/// The oracle grounds every yes/no and routing judgment on this log.
///
/// # Examples
///
/// ```
/// use faultgraph::message::Message;
///
/// let opening = Message::user("the robot won't boot");
/// let probe = Message::assistant("Is the battery indicator lit?");
///
/// assert!(opening.has_role(Message::USER));
/// assert!(!probe.has_role(Message::USER));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the turn's author (e.g., "user", "assistant", "system").
    pub role: String,
    /// The text content of the turn.
    pub content: String,
}

impl Message {
    /// User input turn role.
    pub const USER: &'static str = "user";
    /// Engine/assistant prompt turn role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System instruction turn role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new turn with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user turn with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant turn with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system turn with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this turn has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

/// Renders a dialog log as plain `role: content` lines.
///
/// This is the grounding text handed to the oracle; it contains nothing the
/// user or the engine did not actually say.
#[must_use]
pub fn render_dialog(dialog: &[Message]) -> String {
    let mut out = String::new();
    for turn in dialog {
        out.push_str(&turn.role);
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out
}
