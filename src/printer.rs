//! User-visible output.
//!
//! The session never writes to stdout or stderr directly; everything goes
//! through a [`Printer`] so tests can record it.

use std::io::{self, Write};

use colored::Colorize;

pub trait Printer {
    /// Writes `text` verbatim, without adding a newline.
    fn print(&mut self, text: &str);

    /// Reports a recoverable problem. A trailing newline is added.
    fn warn(&mut self, text: &str);

    /// Reports a failure. A trailing newline is added.
    fn error(&mut self, text: &str);
}

/// Prints model output and listings to stdout, and warnings and errors to
/// stderr with a colored label.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrinter;

impl Printer for ConsolePrinter {
    fn print(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn warn(&mut self, text: &str) {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{}{text}", "Warning: ".yellow());
        let _ = stderr.flush();
    }

    fn error(&mut self, text: &str) {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{}{text}", "Error: ".red());
        let _ = stderr.flush();
    }
}
