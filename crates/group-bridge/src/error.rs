//! Error types for the group bridge

use crate::session::SessionError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum BridgeError {
    /// Missing or malformed request input
    BadRequest(String),
    GroupNotFound,
    NotAdmin,
    Session(SessionError),
    Picture(reqwest::Error),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::BadRequest(msg) => write!(f, "{}", msg),
            BridgeError::GroupNotFound => write!(f, "Group not found"),
            BridgeError::NotAdmin => write!(f, "Not admin in this group"),
            BridgeError::Session(err) => write!(f, "{}", err),
            BridgeError::Picture(err) => write!(f, "Failed to download picture: {}", err),
            BridgeError::Io(err) => write!(f, "IO error: {}", err),
            BridgeError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Session(err) => Some(err),
            BridgeError::Picture(err) => Some(err),
            BridgeError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl BridgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BridgeError::GroupNotFound => StatusCode::NOT_FOUND,
            BridgeError::NotAdmin => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (
            status,
            axum::Json(json!({ "success": false, "message": self.to_string() })),
        )
            .into_response()
    }
}

impl From<SessionError> for BridgeError {
    fn from(err: SessionError) -> Self {
        BridgeError::Session(err)
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Picture(err)
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for BridgeError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        BridgeError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
