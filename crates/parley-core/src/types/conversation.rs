//! Conversation thread types

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One exchange recorded in a thread. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            files: vec![],
            images: vec![],
            tool_name: None,
            model_provider: None,
            model_name: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.model_provider = Some(provider.into());
        self.model_name = Some(model.into());
        self
    }
}

/// A conversation thread as held by the thread store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadContext {
    pub id: Uuid,
    pub originating_tool: String,
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
    #[serde(default)]
    pub initial_context: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ThreadContext {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Most recent assistant turn, if any
    pub fn last_assistant_turn(&self) -> Option<&ConversationTurn> {
        self.turns.iter().rev().find(|t| t.role == TurnRole::Assistant)
    }

    /// Model recorded on the most recent assistant turn
    pub fn last_assistant_model(&self) -> Option<&str> {
        self.last_assistant_turn().and_then(|t| t.model_name.as_deref())
    }

    /// Every file referenced by any turn, newest reference first, de-duplicated
    pub fn referenced_files(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for turn in self.turns.iter().rev() {
            for file in &turn.files {
                if seen.insert(file.as_str()) {
                    files.push(file.clone());
                }
            }
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn thread(turns: Vec<ConversationTurn>) -> ThreadContext {
        let now = Utc::now();
        ThreadContext {
            id: Uuid::new_v4(),
            originating_tool: "chat".into(),
            turns,
            initial_context: Map::new(),
            session_fingerprint: None,
            created_at: now,
            expires_at: now + Duration::hours(3),
        }
    }

    #[test]
    fn last_assistant_model_skips_user_turns() {
        let t = thread(vec![
            ConversationTurn::user("q1"),
            ConversationTurn::assistant("a1").with_model("gemini", "flash"),
            ConversationTurn::user("q2"),
        ]);
        assert_eq!(t.last_assistant_model(), Some("flash"));
    }

    #[test]
    fn referenced_files_newest_first() {
        let t = thread(vec![
            ConversationTurn::user("q1").with_files(vec!["/a.rs".into(), "/b.rs".into()]),
            ConversationTurn::user("q2").with_files(vec!["/b.rs".into(), "/c.rs".into()]),
        ]);
        assert_eq!(t.referenced_files(), vec!["/b.rs", "/c.rs", "/a.rs"]);
    }

    #[test]
    fn expiry_is_inclusive() {
        let t = thread(vec![]);
        assert!(!t.is_expired_at(t.created_at));
        assert!(t.is_expired_at(t.expires_at));
    }
}
