//! USB HID dongle backend (feature `hid`).
//!
//! Devices are matched by vendor/product id. Every read or write opens a
//! short-lived `HidDevice` that is dropped (closed) before returning.

use crate::config::NodelockConfig;
use crate::crypto::digest::{sha256_hex, short_id};
use crate::token::{fingerprint, HardwareToken, READ_BUFFER_LEN};
use hidapi::{DeviceInfo, HidApi, HidError};
use std::sync::Mutex;
use tracing::{debug, warn};

/// How long a raw read waits for the dongle to answer.
const READ_TIMEOUT_MS: i32 = 1000;

/// USB HID security dongle.
pub struct HidToken {
    vendor_id: u16,
    product_id: u16,
    api: Mutex<Option<HidApi>>,
}

impl HidToken {
    /// Match devices with the given vendor/product id.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            api: Mutex::new(None),
        }
    }

    /// Match the vendor/product id from configuration.
    pub fn from_config(config: &NodelockConfig) -> Self {
        Self::new(config.vendor_id, config.product_id)
    }

    /// Run `f` with a freshly enumerated device list.
    fn with_api<T>(
        &self,
        f: impl FnOnce(&HidApi, Option<DeviceInfo>) -> Result<T, HidError>,
    ) -> Result<T, HidError> {
        let mut slot = self.api.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(HidApi::new()?);
        }
        let api = match slot.as_mut() {
            Some(api) => api,
            None => return Err(HidError::HidApiErrorEmpty),
        };
        api.refresh_devices()?;

        let device = api
            .device_list()
            .find(|d| d.vendor_id() == self.vendor_id && d.product_id() == self.product_id)
            .cloned();
        f(api, device)
    }
}

impl HardwareToken for HidToken {
    fn is_present(&self) -> bool {
        match self.with_api(|_, device| Ok(device.is_some())) {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate HID devices");
                false
            }
        }
    }

    fn hardware_id(&self) -> Option<String> {
        let result = self.with_api(|_, device| {
            Ok(device.map(|d| {
                fingerprint(
                    d.vendor_id(),
                    d.product_id(),
                    d.serial_number().unwrap_or_default(),
                    &d.path().to_string_lossy(),
                )
            }))
        });

        match result {
            Ok(Some(raw)) => {
                let id = sha256_hex(&raw).ok()?;
                debug!(hardware_id = %short_id(&id), "Hardware id computed");
                Some(id)
            }
            Ok(None) => {
                warn!("No dongle connected");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read dongle identity");
                None
            }
        }
    }

    fn read(&self) -> Option<Vec<u8>> {
        let result = self.with_api(|api, device| {
            let Some(info) = device else {
                return Ok(None);
            };
            let handle = info.open_device(api)?;
            let mut buffer = [0u8; READ_BUFFER_LEN];
            let read = handle.read_timeout(&mut buffer, READ_TIMEOUT_MS)?;
            Ok((read > 0).then(|| buffer[..read].to_vec()))
        });

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read from dongle");
            None
        })
    }

    fn write(&self, data: &[u8]) -> bool {
        let result = self.with_api(|api, device| {
            let Some(info) = device else {
                return Ok(false);
            };
            let handle = info.open_device(api)?;
            handle.write(data)?;
            Ok(true)
        });

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to write to dongle");
            false
        })
    }
}
