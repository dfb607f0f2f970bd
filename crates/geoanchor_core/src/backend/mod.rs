//! Persistence backend contract.
//!
//! # Responsibility
//! - Define the minimal place/list/delete/upload contract the engine needs
//!   from the shared object store.
//! - Provide `LocalBackend`, a SQLite + directory implementation of it.
//!
//! # Invariants
//! - `delete` enforces ownership on its own; the client-side gate is UX only.
//! - A failed `place` creates nothing.

mod local;

pub use local::LocalBackend;

use crate::model::object::{DeviceIdentity, ObjectId, PlacedObject, PlacementRequest};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type BackendResult<T> = Result<T, BackendError>;

/// Failures reported by a backend call.
#[derive(Debug)]
pub enum BackendError {
    /// The request was malformed and refused before storage.
    InvalidRequest(String),
    NotFound(ObjectId),
    NotOwner(ObjectId),
    /// Network or protocol failure; the call may be retried.
    Transport(String),
    Storage(RepoError),
    Io(std::io::Error),
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest(message) => write!(f, "invalid request: {message}"),
            Self::NotFound(id) => write!(f, "object not found: {id}"),
            Self::NotOwner(id) => write!(f, "not object owner: {id}"),
            Self::Transport(message) => write!(f, "transport failure: {message}"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
            Self::Io(err) => write!(f, "io failure: {err}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for BackendError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::NotOwner(id) => Self::NotOwner(id),
            RepoError::Validation(err) => Self::InvalidRequest(err.to_string()),
            other => Self::Storage(other),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// A file picked by the user, ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUpload {
    pub file_name: String,
    /// MIME type reported by the file picker, e.g. `video/mp4`.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Where an uploaded asset can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub url: String,
    pub media_type: String,
}

/// Shared object store consumed by the engine.
pub trait ObjectBackend {
    fn place(&self, request: &PlacementRequest) -> BackendResult<PlacedObject>;
    fn list(&self) -> BackendResult<Vec<PlacedObject>>;
    fn delete(&self, id: &ObjectId, owner: &DeviceIdentity) -> BackendResult<()>;
    fn upload(&self, upload: &AssetUpload) -> BackendResult<UploadedAsset>;
}
