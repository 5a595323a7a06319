//! Shared contracts for the studio: wire types, the chat log and its store,
//! the composer command parser, and the lifecycle event journal.

pub mod chat;
pub mod events;
pub mod generation;
pub mod ids;

use chrono::{SecondsFormat, Utc};

/// RFC 3339 UTC timestamp with millisecond precision, e.g. `2026-10-17T09:30:00.123Z`.
pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
