//! Domain model for geo-anchored objects.
//!
//! # Responsibility
//! - Define the value types shared by placement, rendering and storage.
//! - Keep wire naming (`latitude`, `longitude`, `type`) aligned with the
//!   persistence backend.
//!
//! # Invariants
//! - Every placed object is identified by a server-assigned `ObjectId`.
//! - Objects are never mutated in place; change is delete-and-recreate.
//! - `asset` is present iff the object kind is not `cube`.

pub mod geo;
pub mod object;
