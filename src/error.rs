use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Every failure the relay can surface. `Clone` so a single in-flight
/// credential request can hand the same outcome to all of its waiters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Sign-in cancelled: {0}")]
    AuthCancelled(String),

    #[error("Another sign-in prompt is already pending")]
    AuthBusy,

    #[error("Credential unavailable: {0}")]
    AuthUnavailable(String),

    #[error("sessions.create failed: {status} {body}")]
    SessionCreateFailed { status: u16, body: String },

    #[error("Picker session timed out. Please try again.")]
    SessionTimeout,

    #[error("sessions.delete failed: {0}")]
    SessionDeleteFailed(String),

    #[error("A picker flow is already running")]
    PickerBusy,

    #[error("Request failed: {message}")]
    FetchFailed { status: Option<u16>, message: String },

    #[error("Upload failed for {item}: {reason}")]
    UploadItemFailed { item: String, reason: String },

    #[error("Invalid presign response")]
    InvalidPresignResponse,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl AppError {
    /// Non-2xx response from one of the backends.
    pub fn http(status: StatusCode, context: &str, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("{} failed: {}", context, status.as_u16())
        } else {
            format!("{} failed: {} {}", context, status.as_u16(), body)
        };
        AppError::FetchFailed {
            status: Some(status.as_u16()),
            message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::FetchFailed { status, .. } => *status,
            AppError::SessionCreateFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    /// Prompt dismissals and rejected consent are user decisions, not faults.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AppError::AuthCancelled(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::FetchFailed {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(format!("JSON error: {}", err))
    }
}

// 以字符串形式序列化，方便 UI 层直接展示
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type AppResult<T> = Result<T, AppError>;
