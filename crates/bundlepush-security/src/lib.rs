mod checksum;
mod ed25519;
mod release_signature;

pub use checksum::{sha256_file_hex, sha256_hex};
pub use ed25519::{decode_public_key_hex, verify_ed25519_signature_hex};
pub use release_signature::ReleaseSignature;
