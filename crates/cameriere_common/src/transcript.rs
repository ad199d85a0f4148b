//! Conversation transcript: append-only turn history and JSON export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WaiterError;

/// Who is speaking in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Waiter,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Waiter => write!(f, "waiter"),
        }
    }
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn customer(text: impl Into<String>) -> Self {
        Self {
            role: Role::Customer,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn waiter(text: impl Into<String>) -> Self {
        Self {
            role: Role::Waiter,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only turn history, owned by the session for its whole lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last `n` turns, for the rolling generation context window.
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Ordered JSON array of `{role, text, timestamp}`.
    pub fn to_json(&self) -> Result<String, WaiterError> {
        Ok(serde_json::to_string_pretty(&self.turns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_keeps_order() {
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::customer("Buonasera"));
        history.push(ConversationTurn::waiter("Benvenuto!"));
        history.push(ConversationTurn::customer("Vorrei un caffè"));

        assert_eq!(history.len(), 3);
        assert_eq!(history.turns()[0].role, Role::Customer);
        assert_eq!(history.turns()[1].role, Role::Waiter);
        assert_eq!(history.recent(2).len(), 2);
        assert_eq!(history.recent(2)[0].text, "Benvenuto!");
        assert_eq!(history.recent(10).len(), 3);
    }

    #[test]
    fn test_export_shape() {
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::customer("Ciao"));
        let json = history.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let first = &parsed.as_array().unwrap()[0];
        assert_eq!(first["role"], "customer");
        assert_eq!(first["text"], "Ciao");
        assert!(first["timestamp"].is_string());
    }
}
