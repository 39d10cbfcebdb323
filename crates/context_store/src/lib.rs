mod context;
mod error;
mod store;

pub use context::Context;
pub use error::{ContextError, ContextFileError};
pub use store::{read_context_file, write_context_file};
