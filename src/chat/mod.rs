//! Chat application module for interactive conversations with a confab
//! server.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! confab client library. It supports:
//!
//! - Streaming responses with real-time frame display
//! - Slash commands for session control
//! - Persistent login credentials across runs
//!
//! # Architecture
//!
//! The module is organized into two components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing and handling
//!
//! The conversation loop itself lives in [`crate::conversation`].

mod commands;
mod config;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
