use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Session-level errors. Anything that escapes `run` ends the process with
/// the exit code from [`AppError::exit_code`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid duration '{0}': expected <number><unit> with unit s, m, h or d (e.g. 30s, 5m, 1h, 2d)")]
    InvalidDuration(String),

    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("namespace '{0}' does not exist")]
    UnknownNamespace(String),

    #[error("no namespaces matched the requested patterns")]
    NoNamespaces,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// 1 = usage/validation, 2 = auth/permission, 3 = connection before any
    /// stream was established.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::InvalidDuration(_)
            | AppError::InvalidPattern { .. }
            | AppError::UnknownNamespace(_)
            | AppError::NoNamespaces
            | AppError::Other(_) => 1,
            AppError::PermissionDenied(_) => 2,
            AppError::Kube(_) | AppError::Io(_) => 3,
        }
    }
}

/// Per-stream failure taxonomy. `Gone` retires the stream quietly,
/// `Forbidden` emits one warning and retires it, `Interrupted` is retried
/// with exponential backoff.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream gone")]
    Gone,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("stream interrupted: {0}")]
    Interrupted(String),
}

/// Maps a kube API failure onto the per-stream taxonomy. 404/410 mean the
/// container or pod is no longer there; 401/403 are not retried.
pub fn classify_stream_error(e: kube::Error) -> StreamError {
    match &e {
        kube::Error::Api(ae) => match ae.code {
            401 | 403 => StreamError::Forbidden(ae.message.clone()),
            404 | 410 => StreamError::Gone,
            _ => StreamError::Interrupted(e.to_string()),
        },
        _ => StreamError::Interrupted(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_cli_contract() {
        assert_eq!(AppError::InvalidDuration("x".into()).exit_code(), 1);
        assert_eq!(AppError::NoNamespaces.exit_code(), 1);
        assert_eq!(AppError::PermissionDenied("ns".into()).exit_code(), 2);
        assert_eq!(
            AppError::Io(io::Error::new(io::ErrorKind::Other, "net")).exit_code(),
            3
        );
    }
}
