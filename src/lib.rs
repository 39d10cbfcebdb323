//! Interactive chat REPL over streaming chat-completion providers.
//!
//! Invariant: every transcript mutation goes through [`Session`], which
//! refreshes the autosave mirror after each one.
//!
//! # Public API Overview
//! - Drive a conversation with [`Session`], fed by a [`LineReader`].
//! - Slash commands live in a [`CommandRegistry`] and are routed by
//!   [`commands::dispatch`].
//! - [`CompletionClient`] wraps a provider with the establishment retry
//!   policy and drains its stream.
//! - Console output, line editing and the external text editor sit behind
//!   the [`Printer`], [`LineReader`] and [`TextEditor`] traits.

pub mod commands;
pub mod completion;
pub mod config;
pub mod editor;
pub mod error;
pub mod line_reader;
pub mod logging;
pub mod printer;
pub mod providers;
pub mod session;
pub mod text;

pub use crate::commands::{Command, CommandRegistry, COMMAND_PREFIX};
pub use crate::completion::CompletionClient;
pub use crate::config::{Cli, EnvConfig};
pub use crate::editor::{ExternalEditor, TextEditor};
pub use crate::error::ReplError;
pub use crate::line_reader::{LineReader, RustylineReader};
pub use crate::printer::{ConsolePrinter, Printer};
pub use crate::session::{Session, SessionOptions};
pub use crate::text::text_wrap;

pub use completion_provider::{Message, Role};
pub use context_store::Context;
