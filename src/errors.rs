use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("API returned a successful but empty response.")]
    EmptyResponse,
    #[error("invalid response from server: {0}")]
    Decode(String),
    #[error("{0}")]
    Validation(String),
    /// A page could not be loaded; carries the message shown in its place.
    #[error("{0}")]
    Load(String),
    #[error("{0}")]
    Session(String),
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Keychain(#[from] keyring::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// The single line shown next to the form or in place of the page.
    pub fn display_message(&self) -> String {
        match self {
            AppError::Http(err) if err.is_connect() => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Api { status, .. } => Some(*status),
            AppError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
