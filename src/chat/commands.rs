//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the server.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Start a new conversation with no session bound.
    New,

    /// List stored sessions.
    Sessions,

    /// Load a stored session by identifier.
    Load(u64),

    /// Log in, optionally with a username given inline.
    Login(Option<String>),

    /// Discard stored credentials.
    Logout,

    /// Save the current transcript to a file.
    Save(String),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use confab::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/load 7").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" | "clear" => ChatCommand::New,
        "sessions" | "history" => ChatCommand::Sessions,
        "load" => match argument {
            Some(arg) => match arg.parse::<u64>() {
                Ok(id) => ChatCommand::Load(id),
                Err(_) => ChatCommand::Invalid("/load expects a session id".to_string()),
            },
            None => ChatCommand::Invalid("/load requires a session id".to_string()),
        },
        "login" => ChatCommand::Login(argument.map(|s| s.to_string())),
        "logout" => ChatCommand::Logout,
        "save" => match argument {
            Some(arg) => ChatCommand::Save(arg.to_string()),
            None => ChatCommand::Invalid("/save requires a file path".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new conversation
  /sessions              List stored sessions
  /load <id>             Load a stored session
  /login [username]      Log in to the server
  /logout                Discard stored credentials
  /save <file>           Save the current transcript to a file
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_messages_are_not_commands() {
        assert_eq!(parse_command("Hello there!"), None);
        assert_eq!(parse_command("  what is 2/3?  "), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn quit_aliases() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
    }

    #[test]
    fn new_aliases() {
        assert_eq!(parse_command("/new"), Some(ChatCommand::New));
        assert_eq!(parse_command("/clear"), Some(ChatCommand::New));
    }

    #[test]
    fn sessions_aliases() {
        assert_eq!(parse_command("/sessions"), Some(ChatCommand::Sessions));
        assert_eq!(parse_command("/history"), Some(ChatCommand::Sessions));
    }

    #[test]
    fn load_parses_an_id() {
        assert_eq!(parse_command("/load 7"), Some(ChatCommand::Load(7)));
        assert!(matches!(
            parse_command("/load seven"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/load"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn login_username_is_optional() {
        assert_eq!(parse_command("/login"), Some(ChatCommand::Login(None)));
        assert_eq!(
            parse_command("/login alice"),
            Some(ChatCommand::Login(Some("alice".to_string())))
        );
    }

    #[test]
    fn save_requires_a_path() {
        assert_eq!(
            parse_command("/save chat.json"),
            Some(ChatCommand::Save("chat.json".to_string()))
        );
        assert!(matches!(
            parse_command("/save"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn help_aliases() {
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn unknown_commands_are_invalid() {
        assert!(matches!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(parse_command("/QUIT"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/Load 3"), Some(ChatCommand::Load(3)));
    }

    #[test]
    fn help_text_names_every_command() {
        let help = help_text();
        for command in ["/new", "/sessions", "/load", "/login", "/logout", "/save", "/help", "/quit"] {
            assert!(help.contains(command), "missing {command}");
        }
    }
}
