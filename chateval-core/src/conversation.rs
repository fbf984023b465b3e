// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Conversation transcripts and retrieved context bundles
//!
//! Both documents are read as JSON. Unknown fields are ignored so that
//! transcripts exported with extra metadata (turn numbers, timestamps,
//! vector ids, scores) load without changes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub message: String,
}

impl ConversationTurn {
    pub fn new(role: Role, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(Role::User, message)
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self::new(Role::Assistant, message)
    }
}

/// Ordered chat transcript, oldest turn first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new(conversation_turns: Vec<ConversationTurn>) -> Self {
        Self { conversation_turns }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.conversation_turns
    }

    pub fn len(&self) -> usize {
        self.conversation_turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversation_turns.is_empty()
    }

    /// Most recent turn spoken by `role`, if any
    pub fn last_turn_by(&self, role: Role) -> Option<&ConversationTurn> {
        self.conversation_turns.iter().rev().find(|t| t.role == role)
    }
}

/// One retrieved snippet. Only `text` is used; everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextVectorItem {
    #[serde(default)]
    pub text: Option<String>,
}

impl ContextVectorItem {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextData {
    #[serde(default)]
    pub vector_data: Vec<ContextVectorItem>,
}

/// Retrieval output attached to a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub data: ContextData,
}

impl ContextBundle {
    pub fn new(vector_data: Vec<ContextVectorItem>) -> Self {
        Self {
            data: ContextData { vector_data },
        }
    }

    pub fn items(&self) -> &[ContextVectorItem] {
        &self.data.vector_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_deserialization_ignores_extra_fields() {
        let json = r#"{
            "chat_id": 42,
            "conversation_turns": [
                {"turn": 1, "role": "user", "message": "Hi", "created_at": "2025-01-01"},
                {"turn": 2, "role": "assistant", "message": "Hello"}
            ]
        }"#;

        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.turns()[0].role, Role::User);
        assert_eq!(conversation.turns()[1].message, "Hello");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let json = r#"{"conversation_turns": [{"role": "system", "message": "x"}]}"#;
        assert!(serde_json::from_str::<Conversation>(json).is_err());
    }

    #[test]
    fn test_last_turn_by_role() {
        let conversation = Conversation::new(vec![
            ConversationTurn::user("first"),
            ConversationTurn::assistant("reply"),
            ConversationTurn::user("second"),
        ]);

        assert_eq!(conversation.last_turn_by(Role::User).unwrap().message, "second");
        assert_eq!(
            conversation.last_turn_by(Role::Assistant).unwrap().message,
            "reply"
        );
    }

    #[test]
    fn test_context_bundle_text_is_optional() {
        let json = r#"{
            "status": "success",
            "data": {
                "vector_data": [
                    {"id": 1, "text": "Paris is the capital of France.", "score": 0.9},
                    {"id": 2, "source_url": "https://example.com"},
                    {"id": 3, "text": null}
                ]
            }
        }"#;

        let bundle: ContextBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.items().len(), 3);
        assert!(bundle.items()[1].text.is_none());
        assert!(bundle.items()[2].text.is_none());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
