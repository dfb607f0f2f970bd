//! Flutter-facing bindings for the geo-anchor engine.

pub mod api;
