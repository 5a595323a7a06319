use super::command_registry::{
    CommandKind, CommandSpec, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
};

/// One line of composer input. Plain text sets the prompt; slash commands
/// drive everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerCommand {
    Noop,
    AttachImage { path: String },
    RemoveImage,
    SetStyle { style: String },
    SetPrompt { prompt: String },
    Generate,
    Stop,
    History,
    Status,
    Help,
    Quit,
    Unknown { command: String, arg: String },
}

fn find_kind(command: &str, specs: &[CommandSpec]) -> Option<CommandKind> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.kind)
}

fn parse_single_path_arg(arg: &str) -> String {
    if arg.trim().is_empty() {
        return String::new();
    }
    let parts: Vec<String> = match shell_words::split(arg) {
        Ok(parts) => parts.into_iter().filter(|value| !value.is_empty()).collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    parts.join(" ")
}

fn command_for(kind: CommandKind, arg: &str) -> ComposerCommand {
    match kind {
        CommandKind::AttachImage => ComposerCommand::AttachImage {
            path: parse_single_path_arg(arg),
        },
        CommandKind::SetStyle => ComposerCommand::SetStyle {
            style: arg.to_string(),
        },
        CommandKind::SetPrompt => ComposerCommand::SetPrompt {
            prompt: arg.to_string(),
        },
        CommandKind::RemoveImage => ComposerCommand::RemoveImage,
        CommandKind::Generate => ComposerCommand::Generate,
        CommandKind::Stop => ComposerCommand::Stop,
        CommandKind::History => ComposerCommand::History,
        CommandKind::Status => ComposerCommand::Status,
        CommandKind::Help => ComposerCommand::Help,
        CommandKind::Quit => ComposerCommand::Quit,
    }
}

pub fn parse_command(text: &str) -> ComposerCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return ComposerCommand::Noop;
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            let kind = find_kind(&command, SINGLE_PATH_COMMANDS)
                .or_else(|| find_kind(&command, RAW_ARG_COMMANDS))
                .or_else(|| find_kind(&command, NO_ARG_COMMANDS));
            return match kind {
                Some(kind) => command_for(kind, arg),
                None => ComposerCommand::Unknown {
                    command,
                    arg: arg.to_string(),
                },
            };
        }
    }

    ComposerCommand::SetPrompt {
        prompt: raw_trimmed.to_string(),
    }
}
