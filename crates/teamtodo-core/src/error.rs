//! Error taxonomy shared by all services

use sea_orm::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Postgres SQLSTATE for unique violations, kept as the operator diagnostic
pub const UNIQUE_VIOLATION: &str = "23505";

/// Postgres SQLSTATE for foreign key violations
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Broad category of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Bad input shape, length or charset
    Validation,
    /// Caller lacks rights
    Authorization,
    /// Referenced entity or target user absent
    NotFound,
    /// Uniqueness violation
    Conflict,
    /// Opaque store error
    BackendFailure,
    /// Programming error
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Authorization => "AUTHORIZATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::BackendFailure => "BACKEND_FAILURE",
            ErrorKind::Unexpected => "UNEXPECTED",
        }
    }
}

/// Errors returned by the membership, todo and profile services
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Denied by the policy set; the string is logged, never shown
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("No user matches '{0}'")]
    UserNotFound(String),

    #[error("Cannot invite yourself")]
    SelfInvite,

    #[error("User is already a member of this team")]
    AlreadyMember,

    #[error("User is not a member of this team")]
    NotAMember,

    #[error("Team not found")]
    TeamNotFound,

    #[error("Todo not found")]
    TodoNotFound,

    #[error("Team name '{0}' is already taken")]
    TeamNameTaken(String),

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("The team creator cannot leave the team")]
    CreatorCannotLeave,

    #[error("Invalid invite code")]
    InvalidInviteCode,

    /// Store failure; `diagnostic` is the SQLSTATE-style code when known
    #[error("Database error: {message}")]
    Database {
        diagnostic: Option<String>,
        message: String,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidInput(_) | ServiceError::InvalidEmail(_) => ErrorKind::Validation,
            ServiceError::Unauthorized(_)
            | ServiceError::SelfInvite
            | ServiceError::CreatorCannotLeave => ErrorKind::Authorization,
            ServiceError::UserNotFound(_)
            | ServiceError::NotAMember
            | ServiceError::TeamNotFound
            | ServiceError::TodoNotFound
            | ServiceError::InvalidInviteCode => ErrorKind::NotFound,
            ServiceError::AlreadyMember
            | ServiceError::TeamNameTaken(_)
            | ServiceError::UsernameTaken(_) => ErrorKind::Conflict,
            ServiceError::Database { .. } => ErrorKind::BackendFailure,
            ServiceError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::InvalidEmail(_) => "INVALID_EMAIL",
            ServiceError::UserNotFound(_) => "USER_NOT_FOUND",
            ServiceError::SelfInvite => "SELF_INVITE",
            ServiceError::AlreadyMember => "ALREADY_MEMBER",
            ServiceError::NotAMember => "NOT_A_MEMBER",
            ServiceError::TeamNotFound => "TEAM_NOT_FOUND",
            ServiceError::TodoNotFound => "TODO_NOT_FOUND",
            ServiceError::TeamNameTaken(_) => "TEAM_NAME_TAKEN",
            ServiceError::UsernameTaken(_) => "USERNAME_TAKEN",
            ServiceError::CreatorCannotLeave => "CREATOR_CANNOT_LEAVE",
            ServiceError::InvalidInviteCode => "INVALID_INVITE_CODE",
            ServiceError::Database { .. } => "DATABASE_ERROR",
            ServiceError::Unexpected(_) => "UNEXPECTED_ERROR",
        }
    }

    /// Message safe to show an end user
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Unauthorized(_) => {
                "You do not have permission to perform this action".to_string()
            }
            ServiceError::InvalidInput(msg) => msg.clone(),
            ServiceError::InvalidEmail(_) => "Please enter a valid email address".to_string(),
            ServiceError::UserNotFound(identifier) => {
                format!("No user found for '{}'", identifier)
            }
            ServiceError::Database { .. } => "A database error occurred".to_string(),
            ServiceError::Unexpected(_) => {
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Suggested next step for known failures
    pub fn remedy(&self) -> Option<&'static str> {
        match self {
            ServiceError::Unauthorized(_) => Some("Sign in again or ask the team creator for access"),
            ServiceError::InvalidInput(_) => Some("Check the input and try again"),
            ServiceError::InvalidEmail(_) => Some("Use an address like name@example.com"),
            ServiceError::UserNotFound(_) => {
                Some("Check the email, username or display name and make sure the user has signed up")
            }
            ServiceError::SelfInvite => Some("Invite somebody else"),
            ServiceError::AlreadyMember => None,
            ServiceError::NotAMember => Some("Refresh the member list"),
            ServiceError::TeamNotFound => Some("Check the team link or pick a team from your list"),
            ServiceError::TodoNotFound => Some("Refresh the list, the todo may have been deleted"),
            ServiceError::TeamNameTaken(_) => Some("Choose a different team name"),
            ServiceError::UsernameTaken(_) => Some("Choose a different username"),
            ServiceError::CreatorCannotLeave => {
                Some("Ask an administrator to dissolve the team instead")
            }
            ServiceError::InvalidInviteCode => {
                Some("Ask the team creator for the current invite code")
            }
            ServiceError::Database { .. } => Some("Try again later or contact support"),
            ServiceError::Unexpected(_) => Some("Try again later"),
        }
    }

    /// Store diagnostic code, if any
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ServiceError::Database { diagnostic, .. } => diagnostic.as_deref(),
            _ => None,
        }
    }
}

/// Whether a store error is a unique constraint violation
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => ServiceError::Database {
                diagnostic: Some(UNIQUE_VIOLATION.to_string()),
                message,
            },
            Some(SqlErr::ForeignKeyConstraintViolation(message)) => ServiceError::Database {
                diagnostic: Some(FOREIGN_KEY_VIOLATION.to_string()),
                message,
            },
            _ => ServiceError::Database {
                diagnostic: None,
                message: err.to_string(),
            },
        }
    }
}
