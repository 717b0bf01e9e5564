//! Group Bridge Library
//!
//! Manages messaging groups on behalf of a chat bot owner: pairing state,
//! the numbered group listing, admin-gated group changes and the HTTP API
//! and bot commands that drive them.

pub mod commands;
pub mod error;
pub mod groups;
pub mod pacing;
pub mod picture;
pub mod server;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use commands::{BotCommand, CommandHandler};
pub use error::{BridgeError, Result};
pub use groups::GroupDirectory;
pub use server::{create_router, start_server, ServerState, SharedState};
pub use session::{MessagingSession, UnpairedSession};
pub use types::*;
