// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod conversation;
pub mod error;
pub mod frame;
pub mod observability;
pub mod reflow;
pub mod render;
pub mod sse;
pub mod token;
pub mod transcript;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{ChatClient, ChatTransport, FrameStream};
pub use conversation::{Conversation, SendStatus};
pub use error::{Error, Result};
pub use transcript::Transcript;
pub use types::*;
