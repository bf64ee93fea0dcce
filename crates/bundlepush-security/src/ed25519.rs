use anyhow::{anyhow, Context, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Decodes a hex-encoded 32-byte Ed25519 public key.
pub fn decode_public_key_hex(public_key_hex: &str) -> Result<VerifyingKey> {
    let public_key_bytes =
        hex::decode(public_key_hex.trim()).context("failed to decode Ed25519 public key hex")?;
    let public_key_len = public_key_bytes.len();
    let public_key_array: [u8; 32] = public_key_bytes.try_into().map_err(|_| {
        anyhow!("invalid Ed25519 public key length: expected 32 bytes, got {public_key_len}")
    })?;

    VerifyingKey::from_bytes(&public_key_array).context("invalid Ed25519 public key bytes")
}

/// Returns `Ok(false)` for a well-formed signature that does not match.
pub fn verify_ed25519_signature_hex(
    payload: &[u8],
    public_key: &VerifyingKey,
    signature_hex: &str,
) -> Result<bool> {
    let signature_bytes =
        hex::decode(signature_hex.trim()).context("failed to decode Ed25519 signature hex")?;
    let signature_len = signature_bytes.len();
    let signature_array: [u8; 64] = signature_bytes.try_into().map_err(|_| {
        anyhow!("invalid Ed25519 signature length: expected 64 bytes, got {signature_len}")
    })?;
    let signature = Signature::from_bytes(&signature_array);

    Ok(public_key.verify(payload, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC_KEY_HEX: &str =
        "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const EMPTY_PAYLOAD_SIGNATURE_HEX: &str = concat!(
        "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155",
        "5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
    );

    #[test]
    fn verify_accepts_rfc8032_vector() {
        let key = decode_public_key_hex(PUBLIC_KEY_HEX).expect("key must decode");
        let verified = verify_ed25519_signature_hex(b"", &key, EMPTY_PAYLOAD_SIGNATURE_HEX)
            .expect("verification must complete");
        assert!(verified);
    }

    #[test]
    fn verify_returns_false_for_tampered_payload() {
        let key = decode_public_key_hex(PUBLIC_KEY_HEX).expect("key must decode");
        let verified = verify_ed25519_signature_hex(b"tampered", &key, EMPTY_PAYLOAD_SIGNATURE_HEX)
            .expect("verification must complete");
        assert!(!verified);
    }

    #[test]
    fn verify_errors_for_malformed_signature() {
        let key = decode_public_key_hex(PUBLIC_KEY_HEX).expect("key must decode");
        assert!(verify_ed25519_signature_hex(b"", &key, "zz").is_err());
        assert!(verify_ed25519_signature_hex(b"", &key, "00").is_err());
    }

    #[test]
    fn decode_public_key_rejects_bad_hex_and_length() {
        assert!(decode_public_key_hex("zz").is_err());
        assert!(decode_public_key_hex("00").is_err());
        assert!(decode_public_key_hex(&format!(" {PUBLIC_KEY_HEX} ")).is_ok());
    }
}
