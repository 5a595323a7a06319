use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, warn};

use crate::chat::entry::ChatEntry;
use crate::chat::log::{ChatLog, CHAT_LOG_CAPACITY};

/// Name of the single storage slot holding the serialized log.
pub const CHAT_SLOT_NAME: &str = "ai-studio-chat-v1";

/// Durable home of the chat log. Loading never fails: absent or corrupt
/// storage reads as an empty log. Saving never fails either; write errors are
/// logged and dropped.
pub trait ChatStore {
    fn load(&self) -> ChatLog;
    fn save(&mut self, log: &ChatLog);
}

/// JSON array of the newest [`CHAT_LOG_CAPACITY`] entries.
pub fn encode_log(log: &ChatLog) -> anyhow::Result<String> {
    Ok(serde_json::to_string(log.recent(CHAT_LOG_CAPACITY))?)
}

/// Lenient inverse of [`encode_log`]. Entries that do not parse are skipped and
/// pending placeholders are dropped, since nothing can be in flight for a log
/// that was just read back.
pub fn decode_log(raw: &str) -> ChatLog {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ChatLog::new();
    }
    let parsed: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "stored chat log is not valid JSON; starting empty");
            return ChatLog::new();
        }
    };
    let Some(items) = parsed.as_array() else {
        warn!("stored chat log is not an array; starting empty");
        return ChatLog::new();
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<ChatEntry>(item.clone()) {
            Ok(entry) => entries.push(entry),
            Err(err) => debug!(error = %err, "skipping unreadable chat entry"),
        }
    }
    let mut log = ChatLog::from_entries(entries);
    let stale = log.discard_pending();
    if stale > 0 {
        debug!(stale, "dropped stale pending entries");
    }
    log
}

#[derive(Debug, Clone)]
pub struct JsonFileChatStore {
    path: PathBuf,
}

impl JsonFileChatStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/ai-studio-chat-v1.json`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{CHAT_SLOT_NAME}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes to a sibling temp file, then renames it over the slot.
    pub fn try_save(&self, log: &ChatLog) -> anyhow::Result<()> {
        let payload = encode_log(log)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, payload)
            .with_context(|| format!("failed writing {}", staging.display()))?;
        std::fs::rename(&staging, &self.path)
            .with_context(|| format!("failed replacing {}", self.path.display()))?;
        Ok(())
    }
}

impl ChatStore for JsonFileChatStore {
    fn load(&self) -> ChatLog {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => decode_log(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => ChatLog::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "chat log unreadable; starting empty");
                ChatLog::new()
            }
        }
    }

    fn save(&mut self, log: &ChatLog) {
        if let Err(err) = self.try_save(log) {
            warn!(path = %self.path.display(), error = %format!("{err:#}"), "failed to persist chat log");
        }
    }
}

/// In-memory slot holding the serialized log, with an optional byte quota that
/// makes oversized writes fail the way a full browser storage area would.
#[derive(Debug, Clone, Default)]
pub struct MemoryChatStore {
    slot: Option<String>,
    quota: Option<usize>,
    failed_writes: usize,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Some(raw.into()),
            ..Self::default()
        }
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    pub fn raw(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    pub fn failed_writes(&self) -> usize {
        self.failed_writes
    }

    pub fn try_save(&mut self, log: &ChatLog) -> anyhow::Result<()> {
        let payload = encode_log(log)?;
        if let Some(quota) = self.quota {
            if payload.len() > quota {
                anyhow::bail!(
                    "storage quota exceeded ({} bytes > {quota} bytes)",
                    payload.len()
                );
            }
        }
        self.slot = Some(payload);
        Ok(())
    }
}

impl ChatStore for MemoryChatStore {
    fn load(&self) -> ChatLog {
        self.slot.as_deref().map(decode_log).unwrap_or_default()
    }

    fn save(&mut self, log: &ChatLog) {
        if let Err(err) = self.try_save(log) {
            self.failed_writes += 1;
            warn!(error = %err, "failed to persist chat log");
        }
    }
}
