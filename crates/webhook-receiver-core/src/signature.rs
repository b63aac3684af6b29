//! Stripe webhook signature handling.
//!
//! Stripe signs each delivery with HMAC-SHA256 over `"{timestamp}.{raw body}"`
//! and sends the result in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1492774577,v1=5257a869e7ec...,v0=6ffbb59b2300...
//! ```
//!
//! Every `v1` entry is a candidate signature. During a signing-secret rotation
//! Stripe sends one `v1` entry per active secret, so a delivery is authentic
//! if any entry matches. `v0` entries (test-mode legacy scheme) are ignored.
//!
//! Comparison is performed in constant time using the `subtle` crate.

use crate::secrets::SecretValue;
use crate::Timestamp;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::{fmt, str::FromStr, time::Duration};
use subtle::{Choice, ConstantTimeEq};

type HmacSha256 = Hmac<Sha256>;

/// Name of the signature header (lower-cased)
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Signature scheme this verifier accepts
pub const EXPECTED_SCHEME: &str = "v1";

/// Default replay tolerance between the signed timestamp and receipt
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

// ============================================================================
// Header parsing
// ============================================================================

/// Parsed `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl SignatureHeader {
    /// Parse a raw header value
    ///
    /// Unknown keys and entries without `=` are skipped. The last `t` entry
    /// wins if several are present.
    ///
    /// # Errors
    ///
    /// - `SignatureError::MissingTimestamp` if there is no `t` entry
    /// - `SignatureError::InvalidTimestamp` if `t` is not an integer
    /// - `SignatureError::NoSignatures` if there is no `v1` entry
    pub fn parse(value: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for pair in value.split(',') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };

            match key {
                "t" => {
                    let parsed = val.parse::<i64>().map_err(|_| {
                        SignatureError::InvalidTimestamp {
                            value: val.chars().take(20).collect(),
                        }
                    })?;
                    timestamp = Some(parsed);
                }
                EXPECTED_SCHEME => signatures.push(val.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;

        if signatures.is_empty() {
            return Err(SignatureError::NoSignatures {
                scheme: EXPECTED_SCHEME.to_string(),
            });
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }

    /// Signed timestamp in seconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Candidate `v1` signatures (hex encoded)
    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }
}

impl FromStr for SignatureHeader {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SignatureHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.timestamp)?;
        for signature in &self.signatures {
            write!(f, ",{}={}", EXPECTED_SCHEME, signature)?;
        }
        Ok(())
    }
}

// ============================================================================
// Signing
// ============================================================================

fn compute_mac(secret: &[u8], timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| SignatureError::InvalidKey {
        message: e.to_string(),
    })?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Compute the hex-encoded `v1` signature for a payload
pub fn compute_signature(
    secret: &[u8],
    timestamp: i64,
    payload: &[u8],
) -> Result<String, SignatureError> {
    compute_mac(secret, timestamp, payload).map(hex::encode)
}

/// Produce the header a sender would attach to `payload`
///
/// Used for local testing and by the CLI `sign` command.
pub fn sign_payload(
    secret: &[u8],
    timestamp: i64,
    payload: &[u8],
) -> Result<SignatureHeader, SignatureError> {
    Ok(SignatureHeader {
        timestamp,
        signatures: vec![compute_signature(secret, timestamp, payload)?],
    })
}

// ============================================================================
// Verification
// ============================================================================

/// Verifies Stripe signatures and the replay tolerance window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureVerifier {
    tolerance: Duration,
}

impl SignatureVerifier {
    /// Create a verifier with the given tolerance
    ///
    /// A zero tolerance disables the timestamp check.
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    /// Configured tolerance
    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Check that at least one `v1` entry matches the payload
    ///
    /// Every candidate is compared, matched or not, so the time taken does
    /// not depend on which entry matched.
    pub fn verify_signature(
        &self,
        header: &SignatureHeader,
        payload: &[u8],
        secret: &SecretValue,
    ) -> Result<(), SignatureError> {
        let expected = compute_mac(secret.expose_bytes(), header.timestamp, payload)?;

        let mut matched = Choice::from(0u8);
        for candidate in &header.signatures {
            if let Ok(bytes) = hex::decode(candidate) {
                if bytes.len() == expected.len() {
                    matched |= expected.as_slice().ct_eq(bytes.as_slice());
                }
            }
        }

        if bool::from(matched) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Check that the signed timestamp is within tolerance of `now`
    pub fn check_timestamp(
        &self,
        header: &SignatureHeader,
        now: Timestamp,
    ) -> Result<(), SignatureError> {
        if self.tolerance.is_zero() {
            return Ok(());
        }

        let outside = || SignatureError::TimestampOutsideTolerance {
            signed_at: header.timestamp,
            now: now.unix_seconds(),
            tolerance_seconds: self.tolerance.as_secs(),
        };

        let signed_at = Timestamp::from_unix_seconds(header.timestamp).ok_or_else(outside)?;

        if now.abs_diff(signed_at) > self.tolerance {
            return Err(outside());
        }

        Ok(())
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Signature header and verification failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Stripe-Signature header is missing")]
    MissingHeader,

    #[error("Stripe-Signature header has no timestamp")]
    MissingTimestamp,

    #[error("Stripe-Signature timestamp is not an integer: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("Stripe-Signature header has no '{scheme}' signatures")]
    NoSignatures { scheme: String },

    #[error("No signature matches the expected signature for the payload")]
    Mismatch,

    #[error(
        "Timestamp {signed_at} is outside the {tolerance_seconds}s tolerance (now: {now})"
    )]
    TimestampOutsideTolerance {
        signed_at: i64,
        now: i64,
        tolerance_seconds: u64,
    },

    #[error("Secret cannot be used as HMAC key: {message}")]
    InvalidKey { message: String },
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
