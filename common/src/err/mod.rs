pub mod server_error;

pub use server_error::{ErrorKind, KillKind, ServerError};

/// Result alias used across the workspace.
pub type SqlResult<T> = std::result::Result<T, ServerError>;
