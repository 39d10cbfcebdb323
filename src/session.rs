//! The interactive control loop and the single owner of the transcript.

use std::path::{Path, PathBuf};

use colored::Colorize;
use completion_provider::Message;
use context_store::{write_context_file, Context, ContextError};

use crate::commands::{self, CommandRegistry, COMMAND_PREFIX};
use crate::completion::CompletionClient;
use crate::config::DEFAULT_MODEL;
use crate::editor::TextEditor;
use crate::error::ReplError;
use crate::line_reader::LineReader;
use crate::printer::Printer;

/// Startup switches for a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub model: String,
    pub quiet: bool,
    pub forgetful: bool,
    pub commands_enabled: bool,
    pub autosave_path: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            quiet: false,
            forgetful: false,
            commands_enabled: true,
            autosave_path: None,
        }
    }
}

/// Owns the transcript, the autosave path and the collaborators.
///
/// Every transcript mutation goes through a method here so the autosave
/// mirror is refreshed after each one. A failed refresh is reported and the
/// in-memory transcript is kept as is.
pub struct Session {
    context: Context,
    model: String,
    quiet: bool,
    forgetful: bool,
    commands_enabled: bool,
    autosave_path: Option<PathBuf>,
    registry: CommandRegistry,
    client: CompletionClient,
    printer: Box<dyn Printer>,
    editor: Box<dyn TextEditor>,
    exit_code: Option<i32>,
}

impl Session {
    pub fn new(
        options: SessionOptions,
        context: Context,
        client: CompletionClient,
        printer: Box<dyn Printer>,
        editor: Box<dyn TextEditor>,
    ) -> Self {
        Self {
            context,
            model: options.model,
            quiet: options.quiet,
            forgetful: options.forgetful,
            commands_enabled: options.commands_enabled,
            autosave_path: options.autosave_path,
            registry: CommandRegistry::builtin(),
            client,
            printer,
            editor,
            exit_code: None,
        }
    }

    /// Reads and handles lines until end of input or `/exit`, returning the
    /// process exit status.
    pub fn run(&mut self, reader: &mut dyn LineReader) -> i32 {
        if !self.quiet && self.commands_enabled {
            let banner = banner();
            self.print(&banner);
        }

        loop {
            if let Some(code) = self.exit_code {
                return code;
            }
            let prompt = self.prompt();
            let Some(line) = reader.read_line(&prompt) else {
                tracing::debug!("end of input");
                return 0;
            };
            self.handle_line(&line);
        }
    }

    /// Classifies one raw input line and acts on it.
    pub fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if self.commands_enabled && line.starts_with(COMMAND_PREFIX) {
            commands::dispatch(self, line);
        } else {
            self.ask(line);
        }
    }

    /// Sends `text` as a user message and records the reply.
    ///
    /// On failure the user message is retracted. In forgetful mode it is
    /// retracted on success too and the reply is not recorded.
    pub fn ask(&mut self, text: &str) {
        self.push_message(Message::user(text));
        match self.exchange() {
            Ok(response) if !self.forgetful => self.push_message(Message::assistant(response)),
            Ok(_) => self.retract_last(),
            Err(error) => {
                self.error(&format!("{error} (no changes done to context)"));
                self.retract_last();
            }
        }
    }

    /// Sends the transcript as it stands, echoing fragments as they arrive.
    /// The transcript is not modified.
    pub fn exchange(&mut self) -> Result<String, ReplError> {
        let printer = &mut self.printer;
        let mut echoed = false;
        let result = self.client.send_and_collect(
            self.context.messages(),
            &self.model,
            |fragment| {
                echoed = true;
                printer.print(fragment);
            },
        );
        if result.is_ok() || echoed {
            self.printer.print("\n");
        }
        result
    }

    /// Runs an exchange for a user message that was just pushed. The reply is
    /// recorded on success; the message is retracted on failure.
    pub fn exchange_and_record_or_retract(&mut self) -> Result<(), ReplError> {
        match self.exchange() {
            Ok(response) => {
                self.push_message(Message::assistant(response));
                Ok(())
            }
            Err(error) => {
                self.retract_last();
                Err(error)
            }
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
        tracing::debug!(model = %self.model, "model switched");
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn autosave_path(&self) -> Option<&Path> {
        self.autosave_path.as_deref()
    }

    /// Sets or clears the autosave path and writes the mirror immediately.
    pub fn set_autosave_path(&mut self, path: Option<PathBuf>) {
        self.autosave_path = path;
        self.refresh_autosave();
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Ends the loop after the current line.
    pub fn request_exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    pub fn push_message(&mut self, message: Message) {
        self.context.push(message);
        self.refresh_autosave();
    }

    pub fn pop_messages(&mut self, count: i64) -> Result<(), ContextError> {
        self.context.pop_last(count)?;
        self.refresh_autosave();
        Ok(())
    }

    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.context.replace(messages);
        self.refresh_autosave();
    }

    pub fn prepend_messages(&mut self, messages: Vec<Message>) {
        self.context.prepend(messages);
        self.refresh_autosave();
    }

    pub fn append_messages(&mut self, messages: Vec<Message>) {
        self.context.extend(messages);
        self.refresh_autosave();
    }

    pub fn clear_messages(&mut self) {
        self.context.clear();
        self.refresh_autosave();
    }

    pub fn edit_text(&mut self) -> Result<String, ReplError> {
        self.editor.edit()
    }

    pub fn print(&mut self, text: &str) {
        self.printer.print(text);
    }

    pub fn warn(&mut self, text: &str) {
        self.printer.warn(text);
    }

    pub fn error(&mut self, text: &str) {
        self.printer.error(text);
    }

    /// `(model)> `, or nothing in quiet mode.
    pub fn prompt(&self) -> String {
        if self.quiet {
            return String::new();
        }
        format!(
            "{}{}{}{}",
            "(".blue(),
            self.model.yellow(),
            ")".blue(),
            "> ".cyan()
        )
    }

    fn retract_last(&mut self) {
        if let Err(error) = self.pop_messages(1) {
            tracing::warn!(%error, "could not retract the last message");
        }
    }

    fn refresh_autosave(&mut self) {
        let Some(path) = self.autosave_path.as_deref() else {
            return;
        };
        match write_context_file(path, self.context.messages()) {
            Ok(()) => tracing::debug!(path = %path.display(), "autosave refreshed"),
            Err(error) => {
                let message = format!("failed to write to file \"{}\": {error}", path.display());
                self.printer.error(&message);
            }
        }
    }
}

/// Startup hint printed unless quiet or commands are disabled.
pub fn banner() -> String {
    format!(
        "Enter \"{}\" for a list of commands.\n",
        format!("{COMMAND_PREFIX}help").green()
    )
}
