//! Activation and validation walkthrough.
//!
//! This example plays both sides: the vendor sealing an activation key, and
//! the installed application binding it to a (simulated) dongle, checking
//! caps and reacting to the dongle being pulled out.
//!
//! # Running
//!
//! ```bash
//! cargo run --example activation_flow
//! ```
//!
//! # Note
//!
//! In production the master key is a compile-time constant embedded in the
//! binary, and the token is `HidToken` (feature `hid`). `FakeToken` stands in
//! here so the example runs without hardware.

use chrono::{Duration as ChronoDuration, Utc};
use nodelock::{
    ActivationPayload, AesCryptoProvider, FakeToken, FileLicenseStore, HardwareToken,
    LicenseManager, LicenseType, NodelockConfig, TokenMonitor,
};
use std::sync::Arc;
use std::time::Duration;

const MASTER_KEY: &str = "example-vendor-master-key";

#[tokio::main]
async fn main() {
    // Vendor side: seal a one-year Standard license for 3 branches / 25 users.
    let activation_key = ActivationPayload::new(LicenseType::Standard)
        .with_caps(3, 25)
        .expiring(Utc::now() + ChronoDuration::days(365))
        .seal(&AesCryptoProvider, MASTER_KEY)
        .expect("seal activation key");
    println!("Activation key: {}", activation_key);

    // Customer side.
    let store_dir = tempfile::tempdir().expect("temp dir");
    let store = FileLicenseStore::with_path(store_dir.path().to_path_buf()).expect("store");

    let dongle = Arc::new(FakeToken::new("demo-dongle-serial-0001"));
    let inner: Arc<dyn HardwareToken> = dongle.clone();
    let monitor = Arc::new(TokenMonitor::new(inner));

    let config = NodelockConfig::new(MASTER_KEY);
    let poll_interval = config.poll_interval;
    let manager = match LicenseManager::new(config, monitor.clone(), Arc::new(store)) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let mut events = monitor.subscribe();
    let poller = monitor
        .spawn_poller(poll_interval)
        .expect("start dongle poller");

    let result = manager.activate(&activation_key);
    println!("Activate: {} ({})", result.valid, result.message);

    let result = manager.validate();
    if result.valid {
        println!("✓ License valid!");
        println!("  Type: {:?}", result.license_type);
        println!(
            "  Caps: {:?} branches, {:?} users",
            result.max_branches, result.max_users
        );
        println!("  Days remaining: {:?}", result.days_remaining);
    } else {
        println!("✗ {}", result.message);
    }

    println!("Can add 3rd branch: {}", manager.can_add_branch(2));
    println!("Can add 4th branch: {}", manager.can_add_branch(3));

    // A second activation on the same dongle is refused.
    let again = manager.activate(&activation_key);
    println!("Second activation: {}", again.message);

    // Pull the dongle and wait for the poller to notice.
    dongle.set_present(false);
    let unplugged = tokio::time::timeout(poll_interval * 3, async {
        while let Ok(event) = events.recv().await {
            println!("Dongle connected: {} at {}", event.connected, event.at);
            if !event.connected {
                return true;
            }
        }
        false
    })
    .await;
    if !matches!(unplugged, Ok(true)) {
        println!("No disconnect event observed");
    }

    let result = manager.validate();
    println!("Validate without dongle: {}", result.message);

    poller.shutdown();
    tokio::time::sleep(Duration::from_millis(10)).await;
}
