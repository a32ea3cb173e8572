//! Scripted token for machines without a physical dongle.
//!
//! Selected by the host's startup wiring (tests, demos, CI). The license
//! engine has no knowledge of it and treats it like real hardware.

use crate::crypto::digest::sha256_hex;
use crate::token::{HardwareToken, READ_BUFFER_LEN};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

/// In-process stand-in for a USB dongle.
#[derive(Debug)]
pub struct FakeToken {
    present: AtomicBool,
    fingerprint: RwLock<Option<String>>,
    memory: Mutex<Vec<u8>>,
    presence_checks: AtomicUsize,
    identity_reads: AtomicUsize,
}

impl FakeToken {
    /// A connected token whose identity is `sha256(fingerprint)`.
    pub fn new(fingerprint: &str) -> Self {
        Self {
            present: AtomicBool::new(true),
            fingerprint: RwLock::new(Some(fingerprint.to_string())),
            memory: Mutex::new(Vec::new()),
            presence_checks: AtomicUsize::new(0),
            identity_reads: AtomicUsize::new(0),
        }
    }

    /// A token that is not plugged in.
    pub fn absent(fingerprint: &str) -> Self {
        let token = Self::new(fingerprint);
        token.set_present(false);
        token
    }

    /// Plug in or pull out the token.
    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    /// Change the reported fingerprint. `None` simulates an unreadable token.
    pub fn set_fingerprint(&self, fingerprint: Option<&str>) {
        *self.fingerprint.write().unwrap_or_else(|e| e.into_inner()) =
            fingerprint.map(str::to_string);
    }

    /// Number of `is_present` calls so far.
    pub fn presence_checks(&self) -> usize {
        self.presence_checks.load(Ordering::SeqCst)
    }

    /// Number of `hardware_id` calls so far.
    pub fn identity_reads(&self) -> usize {
        self.identity_reads.load(Ordering::SeqCst)
    }
}

impl HardwareToken for FakeToken {
    fn is_present(&self) -> bool {
        self.presence_checks.fetch_add(1, Ordering::SeqCst);
        self.present.load(Ordering::SeqCst)
    }

    fn hardware_id(&self) -> Option<String> {
        self.identity_reads.fetch_add(1, Ordering::SeqCst);
        if !self.present.load(Ordering::SeqCst) {
            return None;
        }
        let fingerprint = self.fingerprint.read().unwrap_or_else(|e| e.into_inner());
        fingerprint.as_deref().and_then(|f| sha256_hex(f).ok())
    }

    fn read(&self) -> Option<Vec<u8>> {
        if !self.present.load(Ordering::SeqCst) {
            return None;
        }
        let memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
        if memory.is_empty() {
            return None;
        }
        Some(memory[..memory.len().min(READ_BUFFER_LEN)].to_vec())
    }

    fn write(&self, data: &[u8]) -> bool {
        if !self.present.load(Ordering::SeqCst) {
            return false;
        }
        *self.memory.lock().unwrap_or_else(|e| e.into_inner()) = data.to_vec();
        true
    }
}
