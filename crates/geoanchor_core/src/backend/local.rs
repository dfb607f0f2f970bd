//! SQLite + filesystem backend.
//!
//! Objects live in the `objects` table; uploads are written to a directory
//! under a fresh UUID file name and addressed as `/uploads/<name>`.

use crate::backend::{AssetUpload, BackendError, BackendResult, ObjectBackend, UploadedAsset};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::object::{DeviceIdentity, ObjectId, PlacedObject, PlacementRequest};
use crate::repo::identity_repo::{DeviceIdentityStore, SqliteDeviceIdentityStore};
use crate::repo::object_repo::{ObjectRepository, SqliteObjectRepository};
use crate::repo::{epoch_seconds, RepoResult};
use log::{info, warn};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const UPLOAD_URL_PREFIX: &str = "/uploads/";
const MAX_EXTENSION_CHARS: usize = 8;

pub struct LocalBackend {
    conn: Connection,
    upload_dir: PathBuf,
}

impl LocalBackend {
    /// Opens (or creates) the database at `db_path`.
    pub fn open(
        db_path: impl AsRef<Path>,
        upload_dir: impl Into<PathBuf>,
    ) -> Result<Self, DbError> {
        Ok(Self {
            conn: open_db(db_path)?,
            upload_dir: upload_dir.into(),
        })
    }

    pub fn in_memory(upload_dir: impl Into<PathBuf>) -> Result<Self, DbError> {
        Ok(Self {
            conn: open_db_in_memory()?,
            upload_dir: upload_dir.into(),
        })
    }

    /// Identity of this installation, created on first use.
    pub fn device_identity(&self) -> RepoResult<DeviceIdentity> {
        SqliteDeviceIdentityStore::new(&self.conn).load_or_create()
    }

    /// Looks up one stored object by id.
    pub fn get(&self, id: &ObjectId) -> BackendResult<Option<PlacedObject>> {
        Ok(self.repo().get_object(id)?)
    }

    /// Resolves an `/uploads/...` URL back to its file.
    pub fn asset_path(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(UPLOAD_URL_PREFIX)?;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.upload_dir.join(name))
    }

    fn repo(&self) -> SqliteObjectRepository<'_> {
        SqliteObjectRepository::new(&self.conn)
    }
}

impl ObjectBackend for LocalBackend {
    fn place(&self, request: &PlacementRequest) -> BackendResult<PlacedObject> {
        request
            .validate()
            .map_err(|err| BackendError::InvalidRequest(err.to_string()))?;

        let object = PlacedObject {
            id: ObjectId::new(Uuid::new_v4().to_string()),
            coordinate: request.coordinate,
            kind: request.kind,
            asset: request.asset.clone(),
            owner: request.owner.clone(),
            created_at: epoch_seconds(),
        };
        self.repo().insert_object(&object)?;
        info!(
            "event=backend_place module=backend status=ok object_id={} kind={}",
            object.id,
            object.kind.as_str()
        );
        Ok(object)
    }

    fn list(&self) -> BackendResult<Vec<PlacedObject>> {
        Ok(self.repo().list_objects()?)
    }

    fn delete(&self, id: &ObjectId, owner: &DeviceIdentity) -> BackendResult<()> {
        match self.repo().delete_owned_object(id, owner) {
            Ok(()) => {
                info!("event=backend_delete module=backend status=ok object_id={id}");
                Ok(())
            }
            Err(err) => {
                warn!("event=backend_delete module=backend status=error object_id={id} error={err}");
                Err(err.into())
            }
        }
    }

    fn upload(&self, upload: &AssetUpload) -> BackendResult<UploadedAsset> {
        if upload.bytes.is_empty() {
            return Err(BackendError::InvalidRequest(format!(
                "upload `{}` is empty",
                upload.file_name
            )));
        }

        std::fs::create_dir_all(&self.upload_dir)?;
        let stored_name = match file_extension(&upload.file_name) {
            Some(extension) => format!("{}.{extension}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        std::fs::write(self.upload_dir.join(&stored_name), &upload.bytes)?;

        info!(
            "event=backend_upload module=backend status=ok bytes={} media_type={}",
            upload.bytes.len(),
            upload.media_type
        );
        Ok(UploadedAsset {
            url: format!("{UPLOAD_URL_PREFIX}{stored_name}"),
            media_type: upload.media_type.clone(),
        })
    }
}

/// Lowercased extension of a user-supplied file name, if it looks sane.
fn file_extension(file_name: &str) -> Option<String> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let valid = !extension.is_empty()
        && extension.len() <= MAX_EXTENSION_CHARS
        && extension.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| extension.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::file_extension;

    #[test]
    fn file_extension_is_sanitized() {
        assert_eq!(file_extension("Clip.MP4").as_deref(), Some("mp4"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("evil.../../x"), None);
        assert_eq!(file_extension("trailing."), None);
    }
}
