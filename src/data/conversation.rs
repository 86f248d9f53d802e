use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role paired with its text content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, role-tagged dialogue replayed verbatim to the model on every call.
///
/// A conversation always starts with exactly one system turn. Turns can only
/// be appended; earlier turns are never rewritten. Extending a conversation
/// that another session still holds goes through [`Conversation::extended`],
/// which leaves the original untouched.
///
/// Serializes for logging and request bodies only. There is no way to build
/// one from outside data, so a conversation can never lack its system turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    /// Starts a conversation with its single system turn.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn::system(system_prompt)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn::user(content));
    }

    /// Returns a copy of this conversation with `turns` appended.
    ///
    /// System turns in `turns` are rejected by being downgraded to user turns,
    /// so the single-system-turn invariant holds for every conversation.
    pub fn extended(&self, turns: impl IntoIterator<Item = ConversationTurn>) -> Self {
        let mut next = self.clone();
        for turn in turns {
            match turn.role {
                Role::System => next.push_user(turn.content),
                _ => next.turns.push(turn),
            }
        }
        next
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn system_prompt(&self) -> &str {
        &self.turns[0].content
    }

    pub fn last(&self) -> &ConversationTurn {
        &self.turns[self.turns.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
