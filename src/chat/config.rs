//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;

use arrrg_derive::CommandLine;

/// Default server URL when none is given on the command line or stored.
const DEFAULT_SERVER: &str = "http://localhost:8000";

/// Command-line arguments for the confab-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat server.
    #[arrrg(optional, "Server URL (default: http://localhost:8000)", "URL")]
    pub server: Option<String>,

    /// Username to log in with when no stored token works.
    #[arrrg(optional, "Username for login", "USER")]
    pub username: Option<String>,

    /// Where to persist login credentials between runs.
    #[arrrg(optional, "Credential store file", "PATH")]
    pub store: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the chat server.
    pub server: String,

    /// Username to offer at the login prompt.
    pub username: Option<String>,

    /// Path of the credential store file, if credentials should persist.
    pub store_path: Option<PathBuf>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Server: http://localhost:8000
    /// - Color: enabled
    /// - Credentials: in-memory only
    pub fn new() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            username: None,
            store_path: None,
            use_color: true,
        }
    }

    /// Sets the server URL.
    pub fn with_server(mut self, server: String) -> Self {
        self.server = server;
        self
    }

    /// Sets the login username.
    pub fn with_username(mut self, username: String) -> Self {
        self.username = Some(username);
        self
    }

    /// Sets the credential store path.
    pub fn with_store_path(mut self, path: PathBuf) -> Self {
        self.store_path = Some(path);
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig {
            server: args.server.unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            username: args.username,
            store_path: args.store.map(PathBuf::from),
            use_color: !args.no_color,
        }
    }
}
