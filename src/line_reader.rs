use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Source of logical input lines.
pub trait LineReader {
    /// Returns the next line, or `None` at end of input. Read errors are
    /// treated as end of input.
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

/// Interactive line editing with in-memory history.
pub struct RustylineReader {
    editor: DefaultEditor,
}

impl RustylineReader {
    pub fn new() -> Result<Self, ReadlineError> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineReader for RustylineReader {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Some(line)
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => None,
            Err(error) => {
                tracing::debug!(%error, "line reader failed; treating as end of input");
                None
            }
        }
    }
}
