use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::{PresenceState, Role};
use crate::services::transitions::EventKind;

/// Broad failure category, used by callers to decide between showing a
/// guidance message, explaining a refusal, re-reading, or giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    Lookup,
    Policy,
    Conflict,
    Store,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid class label {input:?}: {reason}")]
    Parse { input: String, reason: &'static str },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("No program found for {name} at level L{licence} S{semester} with group {group}")]
    ProgramNotFound {
        name: String,
        licence: u32,
        semester: u32,
        group: u32,
    },

    #[error("Program {0} not found")]
    UnknownProgram(String),

    #[error("Session {session_id} is not scheduled on {date}")]
    SessionNotFound { session_id: String, date: String },

    #[error("Presence {0} not found")]
    PresenceNotFound(String),

    #[error("Cannot {event} a {from} presence as {role}")]
    InvalidTransition {
        from: PresenceState,
        event: EventKind,
        role: Role,
    },

    #[error("Presence is locked {minutes} minutes after declaration")]
    EditWindowExpired { minutes: i64 },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("A presence already exists for session {session_id} on {date}")]
    AlreadyExists { session_id: String, date: String },

    #[error("Presence {0} was modified concurrently")]
    ConcurrentModification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Parse { .. } | AppError::BadRequest(_) => ErrorKind::Input,
            AppError::ProgramNotFound { .. }
            | AppError::UnknownProgram(_)
            | AppError::SessionNotFound { .. }
            | AppError::PresenceNotFound(_) => ErrorKind::Lookup,
            AppError::InvalidTransition { .. }
            | AppError::EditWindowExpired { .. }
            | AppError::Forbidden(_) => ErrorKind::Policy,
            AppError::AlreadyExists { .. } | AppError::ConcurrentModification(_) => {
                ErrorKind::Conflict
            }
            AppError::Config(_)
            | AppError::Corrupt(_)
            | AppError::Database(_)
            | AppError::Migration(_) => ErrorKind::Store,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match (&self, kind) {
            (AppError::Forbidden(_), _) => StatusCode::FORBIDDEN,
            (_, ErrorKind::Input) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::Lookup) => StatusCode::NOT_FOUND,
            (_, ErrorKind::Policy) => StatusCode::UNPROCESSABLE_ENTITY,
            (_, ErrorKind::Conflict) => StatusCode::CONFLICT,
            (_, ErrorKind::Store) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match kind {
            ErrorKind::Store => {
                error!("store error: {}", self);
                "Database error occurred".to_string()
            }
            _ => {
                debug!("request rejected: {}", self);
                self.to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            kind,
            message,
        });

        (status, body).into_response()
    }
}
