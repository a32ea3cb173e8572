//! Vendor-issued activation keys.
//!
//! An activation key is `base64(encrypt(payload, master_key))`. Two payload
//! encodings are accepted:
//!
//! ```text
//! {"license_type":"STANDARD","max_branches":1,"max_users":10,"expires_at":"2030-01-01"}
//! STANDARD-1-10-2030-01-01        (legacy, expiry may be PERPETUAL)
//! ```
//!
//! Keys issued by [`ActivationPayload::seal`] always use the JSON form. The
//! legacy form is split on the first three `-` only, so the expiry field may
//! itself contain dashes.

use crate::crypto::CryptoProvider;
use crate::protocol::models::LicenseType;
use crate::NodelockError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Expiry sentinel for licenses that never expire.
pub const PERPETUAL: &str = "PERPETUAL";

/// Structured activation payload, as sealed by the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationPayload {
    /// License type.
    pub license_type: LicenseType,

    /// Branch cap (type default when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_branches: Option<u32>,

    /// User cap (type default when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_users: Option<u32>,

    /// Expiry as RFC 3339, `YYYY-MM-DD` or `PERPETUAL`.
    /// Absent means the type's default term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl ActivationPayload {
    /// Payload with the type's default caps and term.
    pub fn new(license_type: LicenseType) -> Self {
        Self {
            license_type,
            max_branches: None,
            max_users: None,
            expires_at: None,
        }
    }

    /// Set explicit caps.
    pub fn with_caps(mut self, max_branches: u32, max_users: u32) -> Self {
        self.max_branches = Some(max_branches);
        self.max_users = Some(max_users);
        self
    }

    /// Expire at the given instant.
    pub fn expiring(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at.to_rfc3339());
        self
    }

    /// Never expire.
    pub fn perpetual(mut self) -> Self {
        self.expires_at = Some(PERPETUAL.to_string());
        self
    }

    /// Encode and encrypt into an activation key string.
    pub fn seal(
        &self,
        provider: &dyn CryptoProvider,
        master_key: &str,
    ) -> Result<String, NodelockError> {
        let json = serde_json::to_string(self)
            .map_err(|e| NodelockError::InvalidArgument(format!("Failed to encode payload: {}", e)))?;
        provider.encrypt(&json, master_key)
    }

    /// Apply type defaults and check ranges.
    fn resolve(&self, now: DateTime<Utc>) -> Result<ActivationGrant, NodelockError> {
        let max_branches = self
            .max_branches
            .unwrap_or_else(|| self.license_type.default_max_branches());
        let max_users = self
            .max_users
            .unwrap_or_else(|| self.license_type.default_max_users());

        let expires_at = match self.expires_at.as_deref() {
            Some(raw) => parse_expiry(raw)?,
            None => self.license_type.default_term().map(|term| now + term),
        };

        ActivationGrant::checked(self.license_type, max_branches, max_users, expires_at)
    }
}

/// Entitlement granted by a decoded activation key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationGrant {
    /// License type.
    pub license_type: LicenseType,
    /// Branch cap.
    pub max_branches: u32,
    /// User cap.
    pub max_users: u32,
    /// Expiry (None = perpetual).
    pub expires_at: Option<DateTime<Utc>>,
}

impl ActivationGrant {
    fn checked(
        license_type: LicenseType,
        max_branches: u32,
        max_users: u32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, NodelockError> {
        if max_branches == 0 || max_users == 0 {
            return Err(NodelockError::MalformedActivationKey);
        }
        Ok(Self {
            license_type,
            max_branches,
            max_users,
            expires_at,
        })
    }
}

/// Decrypt and parse an activation key.
///
/// Every failure maps to `MalformedActivationKey`.
pub fn decode_activation_key(
    key: &str,
    provider: &dyn CryptoProvider,
    master_key: &str,
    now: DateTime<Utc>,
) -> Result<ActivationGrant, NodelockError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(NodelockError::MalformedActivationKey);
    }

    let plaintext = provider
        .decrypt(key, master_key)
        .map_err(|_| NodelockError::MalformedActivationKey)?;

    parse_payload(plaintext.trim(), now)
}

/// Parse a decrypted payload in either encoding.
pub fn parse_payload(plaintext: &str, now: DateTime<Utc>) -> Result<ActivationGrant, NodelockError> {
    if plaintext.starts_with('{') {
        let payload: ActivationPayload =
            serde_json::from_str(plaintext).map_err(|_| NodelockError::MalformedActivationKey)?;
        return payload.resolve(now);
    }

    let mut parts = plaintext.splitn(4, '-');
    let (Some(kind), Some(branches), Some(users), Some(expiry)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(NodelockError::MalformedActivationKey);
    };

    let license_type: LicenseType = kind.parse()?;
    let max_branches: u32 = branches
        .trim()
        .parse()
        .map_err(|_| NodelockError::MalformedActivationKey)?;
    let max_users: u32 = users
        .trim()
        .parse()
        .map_err(|_| NodelockError::MalformedActivationKey)?;
    let expires_at = parse_expiry(expiry)?;

    ActivationGrant::checked(license_type, max_branches, max_users, expires_at)
}

/// Parse an expiry field. `PERPETUAL` yields `None`.
fn parse_expiry(raw: &str) -> Result<Option<DateTime<Utc>>, NodelockError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case(PERPETUAL) {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Some(naive.and_utc()));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or(NodelockError::MalformedActivationKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{cipher, AesCryptoProvider};
    use chrono::TimeZone;

    const MASTER: &str = "vendor-master-key";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_legacy_payload_with_iso_date() {
        let grant = parse_payload("STANDARD-1-10-2030-01-01", now()).unwrap();
        assert_eq!(grant.license_type, LicenseType::Standard);
        assert_eq!(grant.max_branches, 1);
        assert_eq!(grant.max_users, 10);
        assert_eq!(
            grant.expires_at,
            Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_legacy_payload_perpetual() {
        let grant = parse_payload("ENTERPRISE-5-50-PERPETUAL", now()).unwrap();
        assert_eq!(grant.license_type, LicenseType::Enterprise);
        assert_eq!(grant.expires_at, None);
    }

    #[test]
    fn test_legacy_payload_rfc3339_expiry() {
        let grant = parse_payload("trial-1-3-2026-07-01T00:00:00Z", now()).unwrap();
        assert_eq!(grant.license_type, LicenseType::Trial);
        assert_eq!(
            grant.expires_at,
            Some(Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_legacy_payload_rejects_garbage() {
        for bad in [
            "STANDARD-1-10",
            "GOLD-1-10-PERPETUAL",
            "STANDARD-x-10-PERPETUAL",
            "STANDARD-1--1-PERPETUAL",
            "STANDARD-0-10-PERPETUAL",
            "STANDARD-1-10-next tuesday",
            "",
        ] {
            assert_eq!(
                parse_payload(bad, now()),
                Err(NodelockError::MalformedActivationKey),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_json_payload_defaults() {
        let grant = parse_payload(r#"{"license_type":"TRIAL"}"#, now()).unwrap();
        assert_eq!(grant.max_branches, 1);
        assert_eq!(grant.max_users, 3);
        assert_eq!(grant.expires_at, Some(now() + chrono::Duration::days(30)));

        let grant = parse_payload(r#"{"license_type":"STANDARD"}"#, now()).unwrap();
        assert_eq!(grant.expires_at, None);
    }

    #[test]
    fn test_json_payload_explicit_fields() {
        let grant = parse_payload(
            r#"{"license_type":"ENTERPRISE","max_branches":4,"max_users":40,"expires_at":"PERPETUAL"}"#,
            now(),
        )
        .unwrap();
        assert_eq!(grant.max_branches, 4);
        assert_eq!(grant.max_users, 40);
        assert_eq!(grant.expires_at, None);
    }

    #[test]
    fn test_json_payload_malformed() {
        assert_eq!(
            parse_payload(r#"{"license_type":"GOLD"}"#, now()),
            Err(NodelockError::MalformedActivationKey)
        );
        assert_eq!(
            parse_payload(r#"{"license_type":"STANDARD","max_users":-1}"#, now()),
            Err(NodelockError::MalformedActivationKey)
        );
        assert_eq!(
            parse_payload("{not json", now()),
            Err(NodelockError::MalformedActivationKey)
        );
    }

    #[test]
    fn test_seal_then_decode() {
        let provider = AesCryptoProvider;
        let expiry = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let key = ActivationPayload::new(LicenseType::Standard)
            .with_caps(1, 10)
            .expiring(expiry)
            .seal(&provider, MASTER)
            .unwrap();

        let grant = decode_activation_key(&key, &provider, MASTER, now()).unwrap();
        assert_eq!(grant.license_type, LicenseType::Standard);
        assert_eq!(grant.expires_at, Some(expiry));
    }

    #[test]
    fn test_decode_legacy_key() {
        let provider = AesCryptoProvider;
        let key = cipher::encrypt("STANDARD-2-20-PERPETUAL", MASTER).unwrap();
        let grant = decode_activation_key(&key, &provider, MASTER, now()).unwrap();
        assert_eq!(grant.max_branches, 2);
        assert_eq!(grant.max_users, 20);
    }

    #[test]
    fn test_decode_wrong_master_key() {
        let provider = AesCryptoProvider;
        let key = ActivationPayload::new(LicenseType::Standard)
            .seal(&provider, MASTER)
            .unwrap();
        assert_eq!(
            decode_activation_key(&key, &provider, "another-key", now()),
            Err(NodelockError::MalformedActivationKey)
        );
    }

    #[test]
    fn test_decode_not_a_key() {
        let provider = AesCryptoProvider;
        for bad in ["", "   ", "hello", "AAAA"] {
            assert_eq!(
                decode_activation_key(bad, &provider, MASTER, now()),
                Err(NodelockError::MalformedActivationKey)
            );
        }
    }
}
