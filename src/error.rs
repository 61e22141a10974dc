use thiserror::Error;

/// Failures a session can surface to the user.
///
/// Everything except `PermissionDenied` ends the current turn in the error
/// screen; `PermissionDenied` opens the escalation prompt instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("no executable command found")]
    NoCommandAvailable,

    #[error("failed to copy: {0} (install wl-clipboard or xclip)")]
    ClipboardUnavailable(String),

    #[error("read error: {path}: {message}")]
    FileReadFailed { path: String, message: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("elevated read failed: {0}")]
    ElevatedReadFailed(String),

    #[error("cannot list directory {path}: {message}")]
    DirectoryUnreadable { path: String, message: String },
}

impl SessionError {
    /// Classify an I/O failure from reading an attachment.
    pub fn from_read(path: &str, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path: path.to_string() }
        } else {
            Self::FileReadFailed {
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl From<crate::client::QueryError> for SessionError {
    fn from(err: crate::client::QueryError) -> Self {
        Self::QueryFailed(err.to_string())
    }
}
