#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandKind {
    AttachImage,
    RemoveImage,
    SetStyle,
    SetPrompt,
    Generate,
    Stop,
    History,
    Status,
    Help,
    Quit,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub kind: CommandKind,
}

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image",
        kind: CommandKind::AttachImage,
    },
    CommandSpec {
        command: "upload",
        kind: CommandKind::AttachImage,
    },
];

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "style",
        kind: CommandKind::SetStyle,
    },
    CommandSpec {
        command: "prompt",
        kind: CommandKind::SetPrompt,
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "remove_image",
        kind: CommandKind::RemoveImage,
    },
    CommandSpec {
        command: "generate",
        kind: CommandKind::Generate,
    },
    CommandSpec {
        command: "stop",
        kind: CommandKind::Stop,
    },
    CommandSpec {
        command: "history",
        kind: CommandKind::History,
    },
    CommandSpec {
        command: "status",
        kind: CommandKind::Status,
    },
    CommandSpec {
        command: "help",
        kind: CommandKind::Help,
    },
    CommandSpec {
        command: "quit",
        kind: CommandKind::Quit,
    },
    CommandSpec {
        command: "exit",
        kind: CommandKind::Quit,
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/image <path>",
    "/remove_image",
    "/style <Editorial|Streetwear|Vintage>",
    "/prompt <text>",
    "/generate",
    "/stop",
    "/history",
    "/status",
    "/help",
    "/quit",
];
