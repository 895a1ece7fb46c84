use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A single request: the question plus whatever history the caller supplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    text: String,
    history: Vec<ChatTurn>,
}

impl Question {
    pub fn new(text: impl Into<String>, history: Vec<ChatTurn>) -> Result<Self, DomainError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DomainError::EmptyQuestion);
        }
        if let Some(index) = history.iter().position(|turn| turn.content.trim().is_empty()) {
            return Err(DomainError::EmptyHistoryTurn { index });
        }

        Ok(Self { text, history })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn into_parts(self) -> (String, Vec<ChatTurn>) {
        (self.text, self.history)
    }
}
