//! Object storage contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist placed objects in the `objects` table.
//! - Enforce owner-only deletion at the storage boundary, independently of
//!   any client-side gate.
//!
//! # Invariants
//! - Listing order is `created_at ASC, id ASC` so every client renders the
//!   shared set in the same order.
//! - A delete by a non-owner never removes the row.

use crate::model::geo::GeoCoordinate;
use crate::model::object::{DeviceIdentity, ObjectId, ObjectKind, PlacedObject};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const OBJECT_SELECT_SQL: &str = "SELECT
    id,
    latitude,
    longitude,
    type,
    asset,
    owner,
    created_at
FROM objects";

/// Repository interface for the shared object set.
pub trait ObjectRepository {
    fn insert_object(&self, object: &PlacedObject) -> RepoResult<()>;
    fn get_object(&self, id: &ObjectId) -> RepoResult<Option<PlacedObject>>;
    fn list_objects(&self) -> RepoResult<Vec<PlacedObject>>;
    /// Deletes `id` if and only if `owner` matches the stored owner.
    fn delete_owned_object(&self, id: &ObjectId, owner: &DeviceIdentity) -> RepoResult<()>;
}

/// SQLite-backed object repository.
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ObjectRepository for SqliteObjectRepository<'_> {
    fn insert_object(&self, object: &PlacedObject) -> RepoResult<()> {
        object.validate()?;

        self.conn.execute(
            "INSERT INTO objects (
                id,
                latitude,
                longitude,
                type,
                asset,
                owner,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                object.id.as_str(),
                object.coordinate.latitude,
                object.coordinate.longitude,
                object.kind.as_str(),
                object.asset.as_deref(),
                object.owner.as_str(),
                object.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_object(&self, id: &ObjectId) -> RepoResult<Option<PlacedObject>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{OBJECT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_object_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_objects(&self) -> RepoResult<Vec<PlacedObject>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{OBJECT_SELECT_SQL} ORDER BY created_at ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut objects = Vec::new();
        while let Some(row) = rows.next()? {
            objects.push(parse_object_row(row)?);
        }
        Ok(objects)
    }

    fn delete_owned_object(&self, id: &ObjectId, owner: &DeviceIdentity) -> RepoResult<()> {
        let stored_owner: Option<String> = self
            .conn
            .query_row(
                "SELECT owner FROM objects WHERE id = ?1;",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match stored_owner {
            None => Err(RepoError::NotFound(id.clone())),
            Some(stored) if stored != owner.as_str() => Err(RepoError::NotOwner(id.clone())),
            Some(_) => {
                self.conn.execute(
                    "DELETE FROM objects WHERE id = ?1 AND owner = ?2;",
                    params![id.as_str(), owner.as_str()],
                )?;
                Ok(())
            }
        }
    }
}

fn parse_object_row(row: &Row<'_>) -> RepoResult<PlacedObject> {
    let id: String = row.get("id")?;

    let type_text: String = row.get("type")?;
    let kind = ObjectKind::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid object type `{type_text}` in objects.type"))
    })?;

    let owner_text: String = row.get("owner")?;
    let owner = DeviceIdentity::parse(&owner_text).map_err(|_| {
        RepoError::InvalidData(format!("blank owner for object `{id}` in objects.owner"))
    })?;

    let object = PlacedObject {
        id: ObjectId::new(id),
        coordinate: GeoCoordinate::new(row.get("latitude")?, row.get("longitude")?),
        kind,
        asset: row.get("asset")?,
        owner,
        created_at: row.get("created_at")?,
    };
    object
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("object `{}`: {err}", object.id)))?;
    Ok(object)
}
