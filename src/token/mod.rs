//! Hardware token (dongle) access.
//!
//! Every implementation converts I/O failures into `None`/`false` and a
//! logged warning. A missing dongle is an expected state, not an error.

pub mod fake;
#[cfg(feature = "hid")]
pub mod hid;
pub mod monitor;

pub use fake::FakeToken;
#[cfg(feature = "hid")]
pub use hid::HidToken;
pub use monitor::{ConnectionEvent, PollerHandle, TokenMonitor};

/// Maximum bytes returned by a single [`HardwareToken::read`].
pub const READ_BUFFER_LEN: usize = 64;

/// Capabilities of a physical security token.
pub trait HardwareToken: Send + Sync {
    /// Whether at least one matching token is attached.
    fn is_present(&self) -> bool;

    /// Stable hashed identity of the attached token, `None` if absent or unreadable.
    fn hardware_id(&self) -> Option<String>;

    /// Read up to [`READ_BUFFER_LEN`] bytes from the token.
    fn read(&self) -> Option<Vec<u8>>;

    /// Write raw bytes to the token.
    fn write(&self, data: &[u8]) -> bool;
}

/// Build the device fingerprint string that is hashed into a hardware id.
///
/// Format: `<vendor_id>-<product_id>-<serial>-<bus_path>` (ids in decimal).
pub fn fingerprint(vendor_id: u16, product_id: u16, serial: &str, path: &str) -> String {
    format!("{}-{}-{}-{}", vendor_id, product_id, serial, path)
}
