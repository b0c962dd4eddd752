//! Chat front-end: transport abstraction, Telegram client, command parsing

pub mod commands;
pub mod telegram;
pub mod traits;

pub use commands::Command;
pub use telegram::TelegramTransport;
pub use traits::{ChatTransport, CommandEvent};

#[cfg(test)]
pub(crate) mod mock;
