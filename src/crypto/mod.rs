//! Cryptographic primitives for license sealing and hardware fingerprints.

pub mod cipher;
pub mod digest;
pub mod provider;

pub use provider::{AesCryptoProvider, CryptoProvider};
