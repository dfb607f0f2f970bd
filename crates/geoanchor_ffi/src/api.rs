//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the persistence-backed use cases (identity, place, list, upload,
//!   delete) and the bearing math to Dart via FRB.
//! - Keep error semantics simple: every call returns an envelope with a
//!   human-readable message instead of throwing.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - `delete_object` applies the ownership gate before touching storage.

use geoanchor_core::service::placement::kind_for_media_type;
use geoanchor_core::{
    bearing, can_mutate, core_version as core_version_inner, init_logging as init_logging_inner,
    ping as ping_inner, pointer_angle, AssetUpload, DeviceIdentity, GeoCoordinate, LocalBackend,
    ObjectBackend, ObjectId, ObjectKind, PlacedObject, PlacementRequest,
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::OnceLock;

const DB_FILE_NAME: &str = "geoanchor.sqlite3";
const UPLOAD_DIR_NAME: &str = "geoanchor_uploads";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static UPLOAD_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One placed object as shown by the Dart map and AR layers.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectItem {
    pub object_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// `cube|image|video`.
    pub kind: String,
    pub asset: Option<String>,
    /// Whether this device may delete the object; drives the delete button.
    pub deletable: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectListResponse {
    pub items: Vec<ObjectItem>,
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectActionResponse {
    pub ok: bool,
    pub object_id: Option<String>,
    pub message: String,
}

impl ObjectActionResponse {
    fn success(message: impl Into<String>, object_id: String) -> Self {
        Self {
            ok: true,
            object_id: Some(object_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            object_id: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub ok: bool,
    /// Where the stored asset can be fetched, e.g. `/uploads/<uuid>.mp4`.
    pub url: Option<String>,
    /// Kind the asset will be placed as (`image|video`).
    pub kind: Option<String>,
    pub message: String,
}

impl UploadResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            url: None,
            kind: None,
            message: message.into(),
        }
    }
}

/// Returns this installation's identity token, creating it on first use.
///
/// Returns an empty string when storage cannot be opened.
#[flutter_rust_bridge::frb(sync)]
pub fn device_identity() -> String {
    match with_backend(|backend| backend.device_identity().map_err(|err| err.to_string())) {
        Ok(identity) => identity.as_str().to_string(),
        Err(err) => {
            warn!("event=ffi_identity module=ffi status=error error={err}");
            String::new()
        }
    }
}

/// Places an object owned by this device.
///
/// `kind` is `cube|image|video`; `asset` must be set for image and video and
/// absent for cubes.
#[flutter_rust_bridge::frb(sync)]
pub fn place_object(
    latitude: f64,
    longitude: f64,
    kind: String,
    asset: Option<String>,
) -> ObjectActionResponse {
    let Some(kind) = ObjectKind::parse(kind.trim()) else {
        return ObjectActionResponse::failure(format!(
            "place_object failed: unknown kind `{}`",
            kind.trim()
        ));
    };
    let asset = asset
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let result = with_backend(|backend| {
        let owner = backend.device_identity().map_err(|err| err.to_string())?;
        let request = PlacementRequest {
            coordinate: GeoCoordinate::new(latitude, longitude),
            kind,
            asset,
            owner,
        };
        backend.place(&request).map_err(|err| err.to_string())
    });

    match result {
        Ok(object) => ObjectActionResponse::success("Object placed.", object.id.to_string()),
        Err(err) => ObjectActionResponse::failure(format!("place_object failed: {err}")),
    }
}

/// Lists every shared object in creation order.
#[flutter_rust_bridge::frb(sync)]
pub fn list_objects() -> ObjectListResponse {
    let result = with_backend(|backend| {
        let identity = backend.device_identity().map_err(|err| err.to_string())?;
        let objects = backend.list().map_err(|err| err.to_string())?;
        Ok((identity, objects))
    });

    match result {
        Ok((identity, objects)) => {
            let items = objects
                .iter()
                .map(|object| to_object_item(object, &identity))
                .collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No objects.".to_string()
            } else {
                format!("Found {} object(s).", items.len())
            };
            ObjectListResponse { items, message }
        }
        Err(err) => ObjectListResponse {
            items: Vec::new(),
            message: format!("list_objects failed: {err}"),
        },
    }
}

/// Deletes an object placed by this device.
///
/// Objects owned by other devices are refused without a storage write.
#[flutter_rust_bridge::frb(sync)]
pub fn delete_object(object_id: String) -> ObjectActionResponse {
    let trimmed = object_id.trim();
    if trimmed.is_empty() {
        return ObjectActionResponse::failure("delete_object failed: object id is empty");
    }
    let id = ObjectId::new(trimmed);

    let result = with_backend(|backend| {
        let identity = backend.device_identity().map_err(|err| err.to_string())?;
        let Some(object) = backend.get(&id).map_err(|err| err.to_string())? else {
            return Err(format!("object not found: {id}"));
        };
        if !can_mutate(&object, &identity) {
            info!("event=ffi_delete module=ffi status=rejected object_id={id} error_code=not_owner");
            return Err(format!("not object owner: {id}"));
        }
        backend.delete(&id, &identity).map_err(|err| err.to_string())
    });

    match result {
        Ok(()) => ObjectActionResponse::success("Object deleted.", id.to_string()),
        Err(err) => ObjectActionResponse::failure(format!("delete_object failed: {err}")),
    }
}

/// Stores a picked image or video file.
///
/// Media types other than `image/*` and `video/*` are refused before any
/// bytes are written.
#[flutter_rust_bridge::frb(sync)]
pub fn upload_asset(file_name: String, media_type: String, bytes: Vec<u8>) -> UploadResponse {
    let Some(kind) = kind_for_media_type(&media_type) else {
        return UploadResponse::failure(format!(
            "upload_asset failed: unsupported media type `{media_type}`"
        ));
    };

    let upload = AssetUpload {
        file_name,
        media_type,
        bytes,
    };
    match with_backend(|backend| backend.upload(&upload).map_err(|err| err.to_string())) {
        Ok(uploaded) => UploadResponse {
            ok: true,
            url: Some(uploaded.url),
            kind: Some(kind.as_str().to_string()),
            message: "Asset uploaded.".to_string(),
        },
        Err(err) => UploadResponse::failure(format!("upload_asset failed: {err}")),
    }
}

/// Initial great-circle bearing in `[0, 360)`; `None` for coincident points
/// or non-finite input.
#[flutter_rust_bridge::frb(sync)]
pub fn bearing_degrees(
    from_latitude: f64,
    from_longitude: f64,
    to_latitude: f64,
    to_longitude: f64,
) -> Option<f64> {
    bearing(
        GeoCoordinate::new(from_latitude, from_longitude),
        GeoCoordinate::new(to_latitude, to_longitude),
    )
}

/// Arrow rotation in `(-180, 180]`; a missing heading means north-up.
#[flutter_rust_bridge::frb(sync)]
pub fn pointer_angle_degrees(bearing_deg: f64, heading_deg: Option<f64>) -> f64 {
    let heading = heading_deg.filter(|value| value.is_finite()).unwrap_or(0.0);
    pointer_angle(bearing_deg, heading)
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| env_path("GEOANCHOR_DB_PATH", DB_FILE_NAME))
        .clone()
}

fn resolve_upload_dir() -> PathBuf {
    UPLOAD_DIR
        .get_or_init(|| env_path("GEOANCHOR_UPLOAD_DIR", UPLOAD_DIR_NAME))
        .clone()
}

fn env_path(var: &str, default_name: &str) -> PathBuf {
    if let Ok(raw) = std::env::var(var) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(default_name)
}

fn with_backend<T>(f: impl FnOnce(&LocalBackend) -> Result<T, String>) -> Result<T, String> {
    let backend = LocalBackend::open(resolve_db_path(), resolve_upload_dir())
        .map_err(|err| format!("object DB open failed: {err}"))?;
    f(&backend)
}

fn to_object_item(object: &PlacedObject, identity: &DeviceIdentity) -> ObjectItem {
    ObjectItem {
        object_id: object.id.to_string(),
        latitude: object.coordinate.latitude,
        longitude: object.coordinate.longitude,
        kind: object.kind.as_str().to_string(),
        asset: object.asset.clone(),
        deletable: can_mutate(object, identity),
        created_at: object.created_at,
    }
}
