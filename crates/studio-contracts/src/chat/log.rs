use crate::chat::entry::ChatEntry;
use crate::generation::GenerationResult;

/// Number of entries kept in memory and on disk.
pub const CHAT_LOG_CAPACITY: usize = 10;

/// Ordered transcript, oldest first. Settled entries are capped at
/// [`CHAT_LOG_CAPACITY`]; an outstanding request may hold its user entry and
/// placeholder beyond the cap until it is resolved or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the most recent [`CHAT_LOG_CAPACITY`] entries unless a request is outstanding.
    pub fn from_entries(entries: Vec<ChatEntry>) -> Self {
        let mut log = Self { entries };
        log.truncate_oldest();
        log
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
        self.truncate_oldest();
    }

    /// Slice of at most `n` newest entries.
    pub fn recent(&self, n: usize) -> &[ChatEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_pending()).count()
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(ChatEntry::is_pending)
    }

    /// Appends the user entry and its pending placeholder. Refuses (returns false)
    /// while another placeholder is outstanding. Nothing is evicted until the
    /// request settles.
    pub fn begin_request(&mut self, request_id: &str, encoded_image: &str, created_at: &str) -> bool {
        if self.has_pending() {
            return false;
        }
        self.entries.push(ChatEntry::User {
            id: request_id.to_string(),
            encoded_image: encoded_image.to_string(),
            created_at: created_at.to_string(),
        });
        self.entries.push(ChatEntry::Pending {
            id: request_id.to_string(),
        });
        true
    }

    /// Replaces the placeholder for `request_id` in place.
    pub fn resolve_success(&mut self, request_id: &str, result: GenerationResult) -> bool {
        self.replace_pending(
            request_id,
            ChatEntry::Result {
                id: request_id.to_string(),
                result,
            },
        )
    }

    /// Replaces the placeholder for `request_id` in place.
    pub fn resolve_error(&mut self, request_id: &str, message: &str) -> bool {
        self.replace_pending(
            request_id,
            ChatEntry::Error {
                id: request_id.to_string(),
                error_message: message.to_string(),
            },
        )
    }

    pub fn remove_pending(&mut self, request_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.is_pending_for(request_id));
        let removed = self.entries.len() != before;
        self.truncate_oldest();
        removed
    }

    /// Drops every placeholder; returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.is_pending());
        let dropped = before - self.entries.len();
        self.truncate_oldest();
        dropped
    }

    fn replace_pending(&mut self, request_id: &str, replacement: ChatEntry) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.is_pending_for(request_id))
        {
            Some(slot) => {
                *slot = replacement;
                self.truncate_oldest();
                true
            }
            None => false,
        }
    }

    fn truncate_oldest(&mut self) {
        if self.has_pending() {
            return;
        }
        if self.entries.len() > CHAT_LOG_CAPACITY {
            let excess = self.entries.len() - CHAT_LOG_CAPACITY;
            self.entries.drain(..excess);
        }
    }
}

impl<'a> IntoIterator for &'a ChatLog {
    type Item = &'a ChatEntry;
    type IntoIter = std::slice::Iter<'a, ChatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
