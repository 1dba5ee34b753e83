//! Unified error types for the account aggregate core.
//!
//! Every operation returns either its payload or exactly one [`Error`]. Expected
//! conditions (not found, conflicts, auth) carry a stable [`Error::code`]; anything
//! coming from the store, hashing, token signing or the runtime is an
//! infrastructure failure and reports the `INTERNAL` code.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// The persisted entity types an error can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    /// A registered user
    User,
    /// A financial account
    Account,
    /// A recurring bill
    Bill,
    /// A one-off payment
    OneOffPayment,
    /// A payday schedule
    Payday,
    /// A free-text note
    Note,
}

impl EntityKind {
    /// Upper-case prefix used to build stable error codes.
    #[must_use]
    pub const fn code_prefix(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Account => "ACCOUNT",
            Self::Bill => "BILL",
            Self::OneOffPayment => "PAYMENT",
            Self::Payday => "PAYDAY",
            Self::Note => "NOTE",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "User",
            Self::Account => "Account",
            Self::Bill => "Bill",
            Self::OneOffPayment => "OneOffPayment",
            Self::Payday => "Payday",
            Self::Note => "Note",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} with id '{id}' does not exist")]
    NotFound { entity: EntityKind, id: String },

    #[error("No {entity} records exist{}", scope_suffix(.scope))]
    CollectionEmpty {
        entity: EntityKind,
        scope: Option<Uuid>,
    },

    #[error("{entity} '{key}' already exists")]
    Exists { entity: EntityKind, key: String },

    #[error("{entity} cannot be updated")]
    UpdateFailed { entity: EntityKind },

    #[error("{entity} cannot be deleted")]
    DeleteFailed { entity: EntityKind },

    #[error("Unauthenticated! - Expired token")]
    AuthExpired,

    #[error("Unauthenticated! - Invalid token")]
    AuthInvalid,

    #[error("Not authorized to access this account")]
    Forbidden,

    #[error("Password is incorrect")]
    InvalidCredentials,

    #[error("We couldn't find a user with that email address")]
    UserEmailNotFound,

    #[error("No valid fields provided for {entity} update")]
    NoFieldsProvided { entity: EntityKind },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Background task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn scope_suffix(scope: &Option<Uuid>) -> String {
    scope.map_or_else(String::new, |id| format!(" for account with ID '{id}'"))
}

/// Machine-readable rendering of an [`Error`] for the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable error code, e.g. `BILL_EXISTS`
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl Error {
    /// Builds a `NotFound` error for a single id.
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Maps a write-time unique index violation to `Exists`, keeping every other
    /// store error as an infrastructure failure.
    pub fn from_write(entity: EntityKind, key: &str, err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => Self::Exists {
                entity,
                key: key.to_string(),
            },
            _ => Self::Database(err),
        }
    }

    /// Stable code consumed by callers.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::NotFound { entity, .. } => format!("{}_NOT_FOUND", entity.code_prefix()),
            Self::CollectionEmpty { entity, .. } => format!("{}S_NOT_FOUND", entity.code_prefix()),
            Self::Exists { entity, .. } => format!("{}_EXISTS", entity.code_prefix()),
            Self::UpdateFailed { entity } => format!("{}_UPDATE_FAILED", entity.code_prefix()),
            Self::DeleteFailed { entity } => format!("{}_DELETE_FAILED", entity.code_prefix()),
            Self::AuthExpired => "AUTH_EXPIRED".to_string(),
            Self::AuthInvalid => "AUTH_INVALID".to_string(),
            Self::Forbidden => "FORBIDDEN".to_string(),
            Self::InvalidCredentials => "INVALID_CREDENTIALS".to_string(),
            Self::UserEmailNotFound => "USER_EMAIL_NOT_FOUND".to_string(),
            Self::NoFieldsProvided { .. } => "NO_VALID_FIELDS_PROVIDED".to_string(),
            Self::InvalidInput { .. } => "BAD_USER_INPUT".to_string(),
            Self::Config { .. }
            | Self::Database(_)
            | Self::PasswordHash(_)
            | Self::Token(_)
            | Self::Task(_)
            | Self::Io(_) => "INTERNAL".to_string(),
        }
    }

    /// True for unexpected failures that should fail the whole request.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Database(_)
                | Self::PasswordHash(_)
                | Self::Token(_)
                | Self::Task(_)
                | Self::Io(_)
        )
    }

    /// Structured body for the transport layer. Infrastructure details are not
    /// exposed to callers.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        let message = if self.is_infrastructure() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        ErrorBody {
            code: self.code(),
            message,
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
