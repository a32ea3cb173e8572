//! Nodelock error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Message shown for every failure whose cause must stay undisclosed.
const CONTACT_SUPPORT: &str = "License validation error. Please contact technical support.";

/// Errors that can occur during license validation and activation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodelockError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An argument was empty or out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Encryption or decryption failed. The message never says why.
    #[error("Cryptographic operation failed")]
    Crypto,

    /// No security token is connected.
    #[error("Security token not detected")]
    HardwareAbsent,

    /// A token is connected but its identity could not be read.
    #[error("Cannot read security token identity")]
    HardwareReadFailure,

    /// No license is bound to this hardware id.
    #[error("License not found")]
    RecordNotFound,

    /// License expired.
    #[error("License expired on {}", .expires_at.format("%Y-%m-%d"))]
    Expired {
        /// When the license expired.
        expires_at: DateTime<Utc>,
    },

    /// Stored license key does not match the record or the device.
    #[error("License integrity check failed")]
    IntegrityFailure,

    /// The device already has a license bound to it.
    #[error("Device already activated")]
    AlreadyActivated,

    /// Activation key could not be decrypted or parsed.
    #[error("Invalid activation key")]
    MalformedActivationKey,

    /// A store already holds a record for this hardware id.
    #[error("A license record already exists for this hardware id")]
    DuplicateHardwareId,

    /// License store I/O error.
    #[error("License store error: {0}")]
    Store(String),
}

impl NodelockError {
    /// Human-readable text that is safe to show to the end user.
    ///
    /// `IntegrityFailure` and `Crypto` share one generic message so the host
    /// never learns whether the record, the key or the device was altered.
    pub fn user_message(&self) -> String {
        match self {
            NodelockError::HardwareAbsent => {
                "Security device not detected. Please connect the USB dongle.".to_string()
            }
            NodelockError::HardwareReadFailure => "Cannot read security device.".to_string(),
            NodelockError::RecordNotFound => {
                "License not found. Please activate the software.".to_string()
            }
            NodelockError::Expired { expires_at } => format!(
                "License expired on {}. Please renew your license.",
                expires_at.format("%Y-%m-%d")
            ),
            NodelockError::AlreadyActivated | NodelockError::DuplicateHardwareId => {
                "This device already has an activated license. Use the existing license or contact support to transfer it.".to_string()
            }
            NodelockError::MalformedActivationKey => "Invalid license key.".to_string(),
            NodelockError::IntegrityFailure
            | NodelockError::Crypto
            | NodelockError::Config(_)
            | NodelockError::InvalidArgument(_)
            | NodelockError::Store(_) => CONTACT_SUPPORT.to_string(),
        }
    }
}
