//! Repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - Keep SQL details behind use-case oriented traits.
//! - Return semantic errors (`NotFound`, `NotOwner`) alongside transport
//!   errors.
//!
//! # Invariants
//! - Writes validate model values before any SQL mutation.
//! - Reads reject invalid persisted rows instead of masking them.

pub mod identity_repo;
pub mod object_repo;

use crate::db::DbError;
use crate::model::object::{ObjectId, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by object and identity storage.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(ObjectId),
    /// Delete attempted by a device that does not own the row.
    NotOwner(ObjectId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "object not found: {id}"),
            Self::NotOwner(id) => write!(f, "not object owner: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::NotOwner(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Current wall clock in unix epoch seconds; `0` if the clock is before 1970.
pub(crate) fn epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
