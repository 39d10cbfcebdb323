use std::fs;
use std::process::Command;

use crate::error::ReplError;

pub const TEXT_EDITOR_ENV_VAR: &str = "GPTREPL_TEXT_EDITOR";
pub const DEFAULT_TEXT_EDITOR: &str = "nano";

/// Collects multi-line text from the operator.
pub trait TextEditor {
    fn edit(&mut self) -> Result<String, ReplError>;
}

/// Runs an external editor program on a fresh temporary file and returns
/// what was saved in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEditor {
    program: String,
}

impl ExternalEditor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uses the given program, or `nano` when none is configured.
    pub fn from_setting(program: Option<&str>) -> Self {
        Self::new(
            program
                .map(str::trim)
                .filter(|program| !program.is_empty())
                .unwrap_or(DEFAULT_TEXT_EDITOR),
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl TextEditor for ExternalEditor {
    fn edit(&mut self) -> Result<String, ReplError> {
        let scratch = tempfile::Builder::new()
            .prefix("gptrepl")
            .tempfile()
            .map_err(|error| {
                ReplError::Editor(format!("failed to create temporary file: {error}"))
            })?;

        tracing::debug!(program = %self.program, path = %scratch.path().display(), "launching text editor");
        let status = Command::new(&self.program)
            .arg(scratch.path())
            .status()
            .map_err(|error| ReplError::Editor(format!("text editor failed to run: {error}")))?;
        if !status.success() {
            return Err(ReplError::Editor(format!(
                "text editor failed to run: {status}"
            )));
        }

        fs::read_to_string(scratch.path())
            .map_err(|error| ReplError::Editor(format!("can't read temporary file: {error}")))
    }
}
