use anyhow::{anyhow, Context, Result};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::ed25519::verify_ed25519_signature_hex;

/// Detached signature shipped inside a release.
///
/// The signature covers the UTF-8 bytes of `content_hash`, which binds it to
/// the exact file set of the package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseSignature {
    #[serde(rename = "contentHash")]
    pub content_hash: String,
    pub signature: String,
}

impl ReleaseSignature {
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("failed to parse release signature")
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize release signature")
    }

    /// Checks that the signature names `expected_hash` and was produced by
    /// the holder of `public_key`.
    pub fn verify(&self, expected_hash: &str, public_key: &VerifyingKey) -> Result<()> {
        if !self.content_hash.eq_ignore_ascii_case(expected_hash) {
            return Err(anyhow!(
                "release signature covers content hash {} but package hash is {}",
                self.content_hash,
                expected_hash
            ));
        }

        let verified =
            verify_ed25519_signature_hex(self.content_hash.as_bytes(), public_key, &self.signature)?;
        if !verified {
            return Err(anyhow!("release signature does not match the public key"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};

    use super::*;

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7_u8; 32])
    }

    fn signed(content_hash: &str, key: &SigningKey) -> ReleaseSignature {
        ReleaseSignature {
            content_hash: content_hash.to_string(),
            signature: hex::encode(key.sign(content_hash.as_bytes()).to_bytes()),
        }
    }

    #[test]
    fn verify_accepts_matching_hash_and_key() {
        let key = signing_key();
        let signature = signed("abc123", &key);
        signature
            .verify("abc123", &key.verifying_key())
            .expect("signature must verify");
    }

    #[test]
    fn verify_rejects_other_content_hash() {
        let key = signing_key();
        let signature = signed("abc123", &key);
        assert!(signature.verify("def456", &key.verifying_key()).is_err());
    }

    #[test]
    fn verify_rejects_foreign_key() {
        let signature = signed("abc123", &signing_key());
        let other = SigningKey::from_bytes(&[9_u8; 32]);
        assert!(signature.verify("abc123", &other.verifying_key()).is_err());
    }

    #[test]
    fn parse_round_trip_keeps_fields() {
        let signature = signed("abc123", &signing_key());
        let raw = signature.to_json_string().expect("must serialize");
        assert!(raw.contains("\"contentHash\""));
        let parsed = ReleaseSignature::from_json_str(&raw).expect("must parse");
        assert_eq!(parsed, signature);
    }
}
