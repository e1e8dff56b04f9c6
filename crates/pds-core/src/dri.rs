//! DRI (data reference identifier) codec
//!
//! A DRI is the content address of a stored payload:
//!
//! ```text
//! 'z' || base58btc( 0x12 || 0x20 || sha2-256(payload) )
//! ```
//!
//! - `0x12` is the multihash code for sha2-256
//! - `0x20` is the digest length (32 bytes)
//! - `z` is the multibase prefix for base58btc
//!
//! Remote backends mint identifiers with the same framing, so the layout
//! is an interoperability contract and must not change.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{PdsError, Result};

/// Multihash code for sha2-256
pub const SHA2_256_CODE: u8 = 0x12;

/// Digest length for sha2-256
pub const SHA2_256_LEN: u8 = 0x20;

/// Multibase prefix for base58btc
pub const BASE58BTC_PREFIX: char = 'z';

/// Sentinel that marks a string value as a reference to another record
pub const REFERENCE_TAG: &str = "DRI:";

const ENVELOPE_LEN: usize = 2 + SHA2_256_LEN as usize;

/// Content-derived identifier for a stored payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dri(String);

impl Dri {
    /// Compute the DRI of a byte payload
    pub fn encode(payload: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(payload.as_ref());

        let mut envelope = Vec::with_capacity(ENVELOPE_LEN);
        envelope.push(SHA2_256_CODE);
        envelope.push(SHA2_256_LEN);
        envelope.extend_from_slice(&digest);

        let mut encoded = String::with_capacity(50);
        encoded.push(BASE58BTC_PREFIX);
        encoded.push_str(&bs58::encode(envelope).into_string());
        Self(encoded)
    }

    /// Compute the DRI of a text payload (UTF-8 bytes)
    pub fn encode_str(payload: &str) -> Self {
        Self::encode(payload.as_bytes())
    }

    /// Parse and validate an identifier minted by this codec or a remote backend
    pub fn parse(value: &str) -> Result<Self> {
        decode_envelope(value)?;
        Ok(Self(value.to_string()))
    }

    /// Wrap an identifier returned by a backend without validating it
    ///
    /// Backends are trusted to return identifiers they can resolve, even if
    /// they do not use this codec's framing.
    pub fn from_backend(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The sha2-256 digest carried by this identifier
    pub fn digest(&self) -> Result<[u8; 32]> {
        let envelope = decode_envelope(&self.0)?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&envelope[2..]);
        Ok(digest)
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render as a tagged reference (`DRI:<dri>`) for embedding in records
    pub fn to_reference(&self) -> String {
        format!("{}{}", REFERENCE_TAG, self.0)
    }

    /// Extract the identifier from a tagged reference string
    pub fn from_reference(value: &str) -> Option<Self> {
        value
            .strip_prefix(REFERENCE_TAG)
            .filter(|rest| !rest.is_empty())
            .map(|rest| Self(rest.to_string()))
    }
}

impl fmt::Display for Dri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Dri {
    type Err = PdsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for Dri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Dri> for String {
    fn from(dri: Dri) -> Self {
        dri.0
    }
}

/// Decode and check the multibase/multihash framing of an identifier
fn decode_envelope(value: &str) -> Result<Vec<u8>> {
    let body = value.strip_prefix(BASE58BTC_PREFIX).ok_or_else(|| {
        PdsError::MalformedInput(format!("DRI must start with '{}': {}", BASE58BTC_PREFIX, value))
    })?;

    let envelope = bs58::decode(body)
        .into_vec()
        .map_err(|e| PdsError::MalformedInput(format!("Invalid base58btc in DRI: {}", e)))?;

    if envelope.len() != ENVELOPE_LEN {
        return Err(PdsError::MalformedInput(format!(
            "Invalid DRI envelope length: {}, expected {}",
            envelope.len(),
            ENVELOPE_LEN
        )));
    }
    if envelope[0] != SHA2_256_CODE || envelope[1] != SHA2_256_LEN {
        return Err(PdsError::MalformedInput(format!(
            "Unsupported multihash header: {:#04x} {:#04x}",
            envelope[0], envelope[1]
        )));
    }

    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_deterministic() {
        let a = Dri::encode_str("payload");
        let b = Dri::encode_str("payload");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_payloads_differ() {
        assert_ne!(Dri::encode_str("a"), Dri::encode_str("b"));
    }

    #[test]
    fn test_known_vector_empty() {
        assert_eq!(
            Dri::encode(b"").as_str(),
            "zQmdfTbBqBPQ7VNxZEYEj14VmRuZBkqFbiwReogJgS1zR1n"
        );
    }

    #[test]
    fn test_parse_roundtrip_and_digest() {
        let dri = Dri::encode_str("hello");
        let parsed = Dri::parse(dri.as_str()).unwrap();
        assert_eq!(parsed, dri);

        let digest = parsed.digest().unwrap();
        assert_eq!(digest.as_slice(), Sha256::digest(b"hello").as_slice());
    }

    #[test]
    fn test_parse_rejects_bad_prefix() {
        let dri = Dri::encode_str("hello");
        let without_prefix = &dri.as_str()[1..];
        assert!(matches!(Dri::parse(without_prefix), Err(PdsError::MalformedInput(_))));
    }

    #[test]
    fn test_parse_rejects_wrong_hash_code() {
        let mut envelope = vec![0x13, 0x20];
        envelope.extend_from_slice(&[0u8; 32]);
        let bogus = format!("z{}", bs58::encode(envelope).into_string());
        assert!(Dri::parse(&bogus).is_err());
    }

    #[test]
    fn test_parse_rejects_truncated() {
        let bogus = format!("z{}", bs58::encode([0x12, 0x20, 1, 2, 3]).into_string());
        assert!(Dri::parse(&bogus).is_err());
    }

    #[test]
    fn test_reference_tagging() {
        let dri = Dri::encode_str("x");
        let reference = dri.to_reference();
        assert!(reference.starts_with("DRI:z"));
        assert_eq!(Dri::from_reference(&reference), Some(dri));
        assert_eq!(Dri::from_reference("DRI:"), None);
        assert_eq!(Dri::from_reference("plain"), None);
    }

    #[test]
    fn test_serde_is_plain_string() {
        let dri = Dri::encode_str("x");
        let json = serde_json::to_string(&dri).unwrap();
        assert_eq!(json, format!("\"{}\"", dri));
    }
}
