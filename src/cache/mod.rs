//! In-memory entitlement cache.

pub mod snapshot;
