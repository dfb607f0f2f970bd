//! Conditions reported to the host instead of failing the session.
//!
//! Every collaborator failure is caught where it happens and converted into
//! one of these; none of them is fatal.

use crate::backend::BackendError;
use crate::geo::location::LocationError;
use crate::model::object::ObjectId;
use crate::scene::views::EntityHandle;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why a delete did not happen.
#[derive(Debug)]
pub enum DeleteRejection {
    /// The client gate refused; no remote call was made.
    NotOwner(ObjectId),
    UnknownObject(ObjectId),
    /// AR tap on an entity that no registered object owns.
    UnknownEntity(EntityHandle),
    Backend(BackendError),
}

impl Display for DeleteRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOwner(id) => write!(f, "object {id} belongs to another device"),
            Self::UnknownObject(id) => write!(f, "object {id} is not in this session"),
            Self::UnknownEntity(entity) => write!(f, "entity {} has no object", entity.0),
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug)]
pub enum EngineCondition {
    /// GPS denied or timed out; the fallback coordinate is in use.
    LocationUnavailable(LocationError),
    /// Create rejected or failed; nothing was inserted.
    PlacementFailed(BackendError),
    /// Asset transport failed; the intent went back to idle.
    UploadFailed(BackendError),
    /// The uploaded asset is neither image nor video.
    UnsupportedMediaType(String),
    DeleteRejected(DeleteRejection),
    /// Initial object load failed; it will be retried on the next trigger.
    LoadFailed(BackendError),
    /// No projection update arrived before the retry budget ran out.
    ProjectionLost { object_id: ObjectId },
}

impl EngineCondition {
    /// Stable code used in log lines and FFI envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LocationUnavailable(_) => "location_unavailable",
            Self::PlacementFailed(_) => "placement_failed",
            Self::UploadFailed(_) => "upload_failed",
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::DeleteRejected(_) => "delete_rejected",
            Self::LoadFailed(_) => "load_failed",
            Self::ProjectionLost { .. } => "projection_lost",
        }
    }
}

impl Display for EngineCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocationUnavailable(err) => write!(f, "location unavailable: {err}"),
            Self::PlacementFailed(err) => write!(f, "placement failed: {err}"),
            Self::UploadFailed(err) => write!(f, "upload failed: {err}"),
            Self::UnsupportedMediaType(value) => {
                write!(f, "unsupported media type `{value}`")
            }
            Self::DeleteRejected(reason) => write!(f, "delete rejected: {reason}"),
            Self::LoadFailed(err) => write!(f, "object load failed: {err}"),
            Self::ProjectionLost { object_id } => {
                write!(f, "AR projection lost for object {object_id}")
            }
        }
    }
}

impl Error for EngineCondition {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LocationUnavailable(err) => Some(err),
            Self::PlacementFailed(err) | Self::UploadFailed(err) | Self::LoadFailed(err) => {
                Some(err)
            }
            Self::DeleteRejected(DeleteRejection::Backend(err)) => Some(err),
            _ => None,
        }
    }
}
