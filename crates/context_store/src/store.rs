use std::fs;
use std::io::Write;
use std::path::Path;

use completion_provider::{Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::error::ContextFileError;

/// On-disk record. Fields default to empty so a missing role is reported as
/// an invalid role at its index rather than as a parse failure.
#[derive(Debug, Deserialize)]
struct StoredMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

/// Reads a JSON array of `{role, content}` records.
pub fn read_context_file(path: &Path) -> Result<Vec<Message>, ContextFileError> {
    let data = fs::read(path)
        .map_err(|source| ContextFileError::io("reading context file", path, source))?;
    let stored = serde_json::from_slice::<Option<Vec<StoredMessage>>>(&data)
        .map_err(|source| ContextFileError::parse(path, source))?
        .unwrap_or_default();

    let messages = stored
        .into_iter()
        .enumerate()
        .map(|(index, record)| match Role::parse(&record.role) {
            Some(role) => Ok(Message::new(role, record.content)),
            None => Err(ContextFileError::InvalidRole {
                path: path.to_path_buf(),
                index,
                role: record.role,
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(path = %path.display(), messages = messages.len(), "context file read");
    Ok(messages)
}

/// Writes `messages` as tab-indented JSON.
///
/// The document is staged in a sibling temporary file and renamed over the
/// destination, so readers never observe a partially written file. A symlink
/// at `path` is followed and its target replaced. An existing file keeps its
/// permissions; a new one gets the usual `0o666 & !umask`.
pub fn write_context_file(path: &Path, messages: &[Message]) -> Result<(), ContextFileError> {
    let mut encoded = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut encoded, PrettyFormatter::with_indent(b"\t"));
    messages
        .serialize(&mut serializer)
        .map_err(|source| ContextFileError::serialize(path, source))?;

    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let existing = fs::metadata(&target).ok().map(|metadata| metadata.permissions());

    let directory = target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut builder = tempfile::Builder::new();
    builder.prefix(".gptrepl-").suffix(".tmp");
    if existing.is_none() {
        if let Some(permissions) = new_file_permissions() {
            builder.permissions(permissions);
        }
    }
    let mut staged = builder
        .tempfile_in(directory)
        .map_err(|source| ContextFileError::io("staging context file for", path, source))?;
    if let Some(permissions) = existing {
        staged
            .as_file()
            .set_permissions(permissions)
            .map_err(|source| ContextFileError::io("staging context file for", path, source))?;
    }
    staged
        .write_all(&encoded)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|source| ContextFileError::io("writing context file", path, source))?;
    staged
        .persist(&target)
        .map_err(|error| ContextFileError::io("replacing context file", path, error.error))?;

    tracing::debug!(path = %path.display(), messages = messages.len(), "context file written");
    Ok(())
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    Some(fs::Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}
