use serde::{Deserialize, Serialize};

use crate::generation::GenerationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One line of the chat transcript. Every entry carries the request id of the
/// submission it belongs to, so a user entry and its assistant reply share an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEntry {
    User {
        id: String,
        #[serde(rename = "encodedImage")]
        encoded_image: String,
        #[serde(rename = "createdAt")]
        created_at: String,
    },
    Pending {
        id: String,
    },
    Result {
        id: String,
        result: GenerationResult,
    },
    Error {
        id: String,
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl ChatEntry {
    pub fn request_id(&self) -> &str {
        match self {
            ChatEntry::User { id, .. }
            | ChatEntry::Pending { id }
            | ChatEntry::Result { id, .. }
            | ChatEntry::Error { id, .. } => id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            ChatEntry::User { .. } => Role::User,
            ChatEntry::Pending { .. } | ChatEntry::Result { .. } | ChatEntry::Error { .. } => {
                Role::Assistant
            }
        }
    }

    /// Render key, unique within a log.
    pub fn key(&self) -> String {
        match self.role() {
            Role::User => format!("user-{}", self.request_id()),
            Role::Assistant => format!("assistant-{}", self.request_id()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ChatEntry::Pending { .. })
    }

    pub fn is_pending_for(&self, request_id: &str) -> bool {
        matches!(self, ChatEntry::Pending { id } if id == request_id)
    }
}
