//! License data model and activation key encoding.

pub mod activation;
pub mod models;
