//! Device position and direction math.
//!
//! # Responsibility
//! - Resolve a one-shot location fix with a non-fatal fallback.
//! - Compute great-circle bearings and pointer angles for the direction
//!   indicator.
//!
//! # Invariants
//! - Nothing in this module performs network or storage I/O.

pub mod bearing;
pub mod location;
