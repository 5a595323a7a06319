mod command_parser;
mod command_registry;
mod entry;
mod log;
mod store;

pub use command_parser::{parse_command, ComposerCommand};
pub use command_registry::CHAT_HELP_COMMANDS;
pub use entry::{ChatEntry, Role};
pub use log::{ChatLog, CHAT_LOG_CAPACITY};
pub use store::{
    decode_log, encode_log, ChatStore, JsonFileChatStore, MemoryChatStore, CHAT_SLOT_NAME,
};
