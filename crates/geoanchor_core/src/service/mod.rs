//! Engine use-case services.
//!
//! # Responsibility
//! - Turn user gestures into placement requests.
//! - Keep the session's object set, both views and anchor bindings in step
//!   with the backend.
//! - Gate every mutation on ownership.

pub mod condition;
pub mod ownership;
pub mod placement;
pub mod registry;
pub mod session;
