//! Access policy over validated entitlements.

pub mod access;
