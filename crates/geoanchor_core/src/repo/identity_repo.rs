//! Persistent device identity storage.
//!
//! # Invariants
//! - At most one identity row exists (`slot = 1`).
//! - `load_or_create` generates a token only when none is stored; once
//!   stored it is returned unchanged for the lifetime of the database.

use crate::model::object::DeviceIdentity;
use crate::repo::{epoch_seconds, RepoError, RepoResult};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};

/// Storage contract for this installation's identity token.
pub trait DeviceIdentityStore {
    fn load(&self) -> RepoResult<Option<DeviceIdentity>>;
    fn load_or_create(&self) -> RepoResult<DeviceIdentity>;
}

/// SQLite-backed identity store.
pub struct SqliteDeviceIdentityStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeviceIdentityStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DeviceIdentityStore for SqliteDeviceIdentityStore<'_> {
    fn load(&self) -> RepoResult<Option<DeviceIdentity>> {
        let token: Option<String> = self
            .conn
            .query_row(
                "SELECT token FROM device_identity WHERE slot = 1;",
                [],
                |row| row.get(0),
            )
            .optional()?;

        token
            .map(|value| {
                DeviceIdentity::parse(&value).map_err(|_| {
                    RepoError::InvalidData("blank token in device_identity.token".to_string())
                })
            })
            .transpose()
    }

    fn load_or_create(&self) -> RepoResult<DeviceIdentity> {
        if let Some(identity) = self.load()? {
            return Ok(identity);
        }

        let candidate = DeviceIdentity::generate();
        // OR IGNORE keeps the first writer's token if two openers race.
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO device_identity (slot, token, created_at)
             VALUES (1, ?1, ?2);",
            params![candidate.as_str(), epoch_seconds()],
        )?;
        if inserted == 1 {
            info!(
                "event=identity_create module=repo status=ok identity={}",
                candidate.redacted()
            );
        }

        self.load()?.ok_or_else(|| {
            RepoError::InvalidData("device identity missing after insert".to_string())
        })
    }
}
