//! Interactive chat application for conversing with a confab server.
//!
//! This binary provides a streaming REPL interface for chatting against a
//! confab-compatible backend.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage against a local server
//! confab-chat
//!
//! # Point at a remote server
//! confab-chat --server https://chat.example.com
//!
//! # Persist credentials between runs
//! confab-chat --store ~/.confab/credentials.json
//!
//! # Disable colors (useful for piping output)
//! confab-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/new` - Start a new conversation
//! - `/sessions` - List stored sessions
//! - `/load <id>` - Resume a stored session
//! - `/login [username]` - Log in to the server
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use confab::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, help_text, parse_command,
};
use confab::client::ChatClient;
use confab::conversation::{Conversation, SendStatus};
use confab::token::{FileStore, MemoryStore, StoredTokens, TokenProvider};
use confab::types::MessageRole;

/// Main entry point for the confab-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("confab-chat [OPTIONS]");
    let explicit_server = args.server.clone();
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    // A stored server URL wins over the default, but an explicit --server
    // wins over both and is remembered for next time.
    let (tokens, server): (Arc<dyn TokenProvider>, String) = match &config.store_path {
        Some(path) => {
            let stored = StoredTokens::new(FileStore::open(path)?);
            let server = match &explicit_server {
                Some(url) => {
                    stored.set_server_url(url);
                    url.clone()
                }
                None => stored.server_url().unwrap_or_else(|| config.server.clone()),
            };
            (Arc::new(stored), server)
        }
        None => (
            Arc::new(StoredTokens::new(MemoryStore::new())),
            config.server.clone(),
        ),
    };

    let client = ChatClient::new(&server, tokens.clone())?;
    let conversation = Arc::new(Conversation::new(Arc::new(client.clone())));
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C during streaming cancels the in-flight send; at the prompt it
    // is absorbed by rustyline below.
    let streaming = conversation.clone();
    ctrlc::set_handler(move || {
        streaming.cancel();
    })?;

    println!("Confab Chat (server: {server})");
    println!("Type /help for commands, /quit to exit\n");

    if tokens.token().is_none() {
        renderer.print_info("Not logged in.");
        login_flow(&client, &mut rl, config.username.clone(), &mut renderer).await;
    }

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::New => match conversation.new_chat() {
                            Ok(()) => renderer.print_info("Started a new conversation."),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Sessions => {
                            match conversation.refresh_sessions().await {
                                Ok(sessions) => print_sessions(&sessions),
                                Err(err) => renderer
                                    .print_error(&format!("Failed to list sessions: {}", err)),
                            }
                        }
                        ChatCommand::Load(id) => match conversation.load_session(id).await {
                            Ok(()) => {
                                print_transcript(&conversation);
                                renderer.print_info(&format!("Resumed session {id}."));
                            }
                            Err(err) => {
                                renderer.print_error(&format!("Failed to load session: {}", err))
                            }
                        },
                        ChatCommand::Login(username) => {
                            login_flow(&client, &mut rl, username, &mut renderer).await;
                        }
                        ChatCommand::Logout => {
                            tokens.clear();
                            renderer.print_info("Logged out.");
                        }
                        ChatCommand::Save(path) => {
                            match conversation.transcript().save(&path) {
                                Ok(()) => {
                                    renderer.print_info(&format!("Transcript saved to {}", path))
                                }
                                Err(err) => renderer
                                    .print_error(&format!("Failed to save transcript: {}", err)),
                            }
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - stream the reply
                println!("Assistant:");
                match conversation.send(line, &mut renderer).await {
                    SendStatus::Completed { .. } => {}
                    SendStatus::Failed(err) if err.is_auth_error() => {
                        renderer.print_info("Session expired; use /login to sign in again.");
                    }
                    SendStatus::Failed(_) => {}
                    SendStatus::Busy => {
                        renderer.print_error("A response is still streaming.");
                    }
                    SendStatus::EmptyInput => {}
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

/// Prompts for credentials and logs in. Failures are reported, never fatal.
async fn login_flow(
    client: &ChatClient,
    rl: &mut DefaultEditor,
    username: Option<String>,
    renderer: &mut PlainTextRenderer,
) {
    let username = match username {
        Some(username) => username,
        None => match rl.readline("Username: ") {
            Ok(line) if !line.trim().is_empty() => line.trim().to_string(),
            _ => {
                renderer.print_info("Login cancelled.");
                return;
            }
        },
    };
    let password = match rl.readline("Password: ") {
        Ok(line) => line,
        Err(_) => {
            renderer.print_info("Login cancelled.");
            return;
        }
    };

    match client.login(&username, &password).await {
        Ok(_) => renderer.print_info(&format!("Logged in as {username}.")),
        Err(err) => renderer.print_error(&format!("Login failed: {}", err)),
    }
}

fn print_sessions(sessions: &[confab::types::Session]) {
    if sessions.is_empty() {
        println!("    (no sessions)");
        return;
    }
    println!("    Sessions:");
    for session in sessions {
        if session.title.is_empty() {
            println!("      [{}] (untitled)", session.id);
        } else {
            println!("      [{}] {}", session.id, session.title);
        }
    }
}

fn print_transcript(conversation: &Conversation<ChatClient>) {
    for message in conversation.transcript().snapshot() {
        match message.role {
            MessageRole::User => println!("You: {}", message.content),
            MessageRole::Assistant => println!("Assistant:\n{}\n", message.content),
        }
    }
}
