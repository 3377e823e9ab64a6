use thiserror::Error;

#[derive(Error, Debug)]
pub enum PilotError {
    /// Not signed in, or the stored session expired. Never retried automatically.
    #[error("{0}")]
    Authentication(String),

    #[error("No selector matched slot '{slot}' (tried: {})", .tried.join(" | "))]
    NotFound { slot: String, tried: Vec<String> },

    #[error("Address never reached {expected} (landed on {actual})")]
    NavigationMismatch { expected: String, actual: String },

    #[error("Element for slot '{slot}' was resolved before the last navigation")]
    StaleElement { slot: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    /// The page rejected a candidate's CSS. Retrying cannot help.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chrome error: {0}")]
    ChromeError(String),
}

pub type Result<T> = std::result::Result<T, PilotError>;

// headless_chrome reports everything through anyhow
impl From<anyhow::Error> for PilotError {
    fn from(err: anyhow::Error) -> Self {
        PilotError::ChromeError(err.to_string())
    }
}

impl PilotError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, PilotError::Authentication(_))
    }

    /// True for the "nothing showed up in time" family the caller sees as a UI timeout.
    pub fn is_ui_timeout(&self) -> bool {
        matches!(self, PilotError::NotFound { .. } | PilotError::Timeout(_))
    }

    /// Collapses everything except authentication failures into the single
    /// caller-facing `OperationFailed` kind.
    pub fn at_boundary(self, operation: &str) -> Self {
        match self {
            PilotError::Authentication(_) => self,
            PilotError::OperationFailed(detail) => {
                PilotError::OperationFailed(format!("{operation}: {detail}"))
            }
            err if err.is_ui_timeout() => {
                PilotError::OperationFailed(format!("{operation}: NotebookLM UI timed out: {err}"))
            }
            err => PilotError::OperationFailed(format!("{operation}: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_passes_the_boundary_unwrapped() {
        let err = PilotError::Authentication("Not authenticated".into()).at_boundary("list notebooks");
        assert!(err.is_authentication());
        assert_eq!(err.to_string(), "Not authenticated");
    }

    #[test]
    fn not_found_becomes_a_ui_timeout() {
        let err = PilotError::NotFound {
            slot: "chat_input".into(),
            tried: vec!["textarea".into()],
        }
        .at_boundary("query notebook");

        match err {
            PilotError::OperationFailed(detail) => {
                assert!(detail.starts_with("query notebook: NotebookLM UI timed out"));
                assert!(detail.contains("chat_input"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn other_errors_are_wrapped_once() {
        let err = PilotError::OperationFailed("no response received".into())
            .at_boundary("query notebook");
        assert_eq!(
            err.to_string(),
            "Operation failed: query notebook: no response received"
        );
    }
}
