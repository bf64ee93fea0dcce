use std::fs;
use std::path::Path;

use bundlepush_security::{decode_public_key_hex, sha256_file_hex, sha256_hex, ReleaseSignature};
use tracing::{debug, warn};

use crate::assemble::UpdateKind;
use crate::error::{chain_message, storage_error, Result, StorageContext, UpdateError};
use crate::fs_utils::relative_files;
use crate::layout::{StoreLayout, PACKAGE_METADATA_FILE_NAME};

/// Detached release signature at the root of a signed package.
pub const SIGNATURE_FILE_NAME: &str = ".bundlepushrelease";

/// Which checks a package must pass before it may be installed.
///
/// | signature | key | plan |
/// |---|---|---|
/// | yes | yes | [`HashAndSignature`](Self::HashAndSignature) |
/// | yes | no | [`HashOnlyUnverifiedSignature`](Self::HashOnlyUnverifiedSignature) |
/// | no | yes | [`MissingSignature`](Self::MissingSignature) |
/// | no | no, diff | [`HashOnly`](Self::HashOnly) |
/// | no | no, full | [`Skip`](Self::Skip) |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPlan {
    HashAndSignature,
    HashOnlyUnverifiedSignature,
    MissingSignature,
    HashOnly,
    Skip,
}

pub fn plan_verification(
    signature_present: bool,
    key_configured: bool,
    update_kind: UpdateKind,
) -> VerificationPlan {
    if update_kind == UpdateKind::RawBundle {
        return VerificationPlan::Skip;
    }

    match (signature_present, key_configured) {
        (true, true) => VerificationPlan::HashAndSignature,
        (true, false) => VerificationPlan::HashOnlyUnverifiedSignature,
        (false, true) => VerificationPlan::MissingSignature,
        (false, false) if update_kind == UpdateKind::Diff => VerificationPlan::HashOnly,
        (false, false) => VerificationPlan::Skip,
    }
}

/// Deterministic hash of a package tree.
///
/// Each file contributes `"<relative path>:<sha256>"`; the sorted entries
/// are serialized as a compact JSON array and hashed again. The signature
/// file, the store's metadata record and archive-tool debris are excluded.
pub fn compute_content_hash(package_dir: &Path) -> Result<String> {
    let mut entries = Vec::new();
    for (relative, path) in relative_files(package_dir)? {
        if is_excluded_from_hash(&relative) {
            continue;
        }
        let file_hash = sha256_file_hex(&path)
            .map_err(|err| storage_error(format!("failed to hash {}", path.display()), err))?;
        entries.push(format!("{relative}:{file_hash}"));
    }
    entries.sort();

    let manifest = serde_json::to_string(&entries).map_err(|err| {
        UpdateError::InvalidUpdate(format!("failed to serialize content manifest: {err}"))
    })?;
    Ok(sha256_hex(manifest.as_bytes()))
}

fn is_excluded_from_hash(relative: &str) -> bool {
    relative == SIGNATURE_FILE_NAME
        || relative == PACKAGE_METADATA_FILE_NAME
        || relative.starts_with("__MACOSX/")
        || relative == ".DS_Store"
        || relative.ends_with("/.DS_Store")
}

pub fn verify_content_hash(package_dir: &Path, expected_hash: &str) -> Result<()> {
    let actual = compute_content_hash(package_dir)?;
    if !actual.eq_ignore_ascii_case(expected_hash) {
        return Err(UpdateError::Integrity {
            expected: expected_hash.to_string(),
            actual,
        });
    }
    debug!(hash = %actual, "content hash verified");
    Ok(())
}

/// Validates a configured public key. An unusable key is a configuration
/// error, not a verification failure.
pub fn validate_public_key(public_key: &str) -> Result<()> {
    decode_public_key_hex(public_key)
        .map(|_| ())
        .map_err(|err| UpdateError::MalformedInput(format!("public key: {}", chain_message(&err))))
}

fn verify_signature(package_dir: &Path, expected_hash: &str, public_key: &str) -> Result<()> {
    let key = decode_public_key_hex(public_key)
        .map_err(|err| UpdateError::MalformedInput(format!("public key: {}", chain_message(&err))))?;
    let path = package_dir.join(SIGNATURE_FILE_NAME);
    let raw = fs::read_to_string(&path)
        .storage_context(|| format!("failed to read {}", path.display()))?;
    let signature = ReleaseSignature::from_json_str(&raw)
        .map_err(|err| UpdateError::Signature(chain_message(&err)))?;
    signature
        .verify(expected_hash, &key)
        .map_err(|err| UpdateError::Signature(chain_message(&err)))?;
    debug!("release signature verified");
    Ok(())
}

/// Runs the checks the package must pass and reports which plan applied.
pub fn verify_package(
    package_dir: &Path,
    expected_hash: &str,
    update_kind: UpdateKind,
    public_key: Option<&str>,
) -> Result<VerificationPlan> {
    let signature_present = package_dir.join(SIGNATURE_FILE_NAME).is_file();
    let plan = plan_verification(signature_present, public_key.is_some(), update_kind);
    execute_plan(plan, package_dir, expected_hash, public_key)?;
    Ok(plan)
}

/// Re-checks an installed package against the hash it is stored under.
/// The hash is always recomputed, whatever kind of update produced it.
pub fn verify_installed_package(
    layout: &StoreLayout,
    package_hash: &str,
    public_key: Option<&str>,
) -> Result<VerificationPlan> {
    let package_dir = layout.package_dir(package_hash);
    if !package_dir.is_dir() {
        return Err(UpdateError::InvalidUpdate(format!(
            "package {package_hash} is not installed"
        )));
    }
    verify_package(&package_dir, package_hash, UpdateKind::Diff, public_key)
}

fn execute_plan(
    plan: VerificationPlan,
    package_dir: &Path,
    expected_hash: &str,
    public_key: Option<&str>,
) -> Result<()> {
    match (plan, public_key) {
        (VerificationPlan::HashAndSignature, Some(public_key)) => {
            verify_content_hash(package_dir, expected_hash)?;
            verify_signature(package_dir, expected_hash, public_key)
        }
        (VerificationPlan::HashAndSignature, None) => Err(UpdateError::MalformedInput(
            "signature verification requested without a public key".to_string(),
        )),
        (VerificationPlan::HashOnlyUnverifiedSignature, _) => {
            warn!(
                "release signature present but no public key is configured; \
                 signature verification skipped"
            );
            verify_content_hash(package_dir, expected_hash)
        }
        (VerificationPlan::MissingSignature, _) => Err(UpdateError::InvalidUpdate(
            "a public key is configured but the update carries no release signature".to_string(),
        )),
        (VerificationPlan::HashOnly, _) => verify_content_hash(package_dir, expected_hash),
        (VerificationPlan::Skip, _) => {
            debug!("no verification required for this update");
            Ok(())
        }
    }
}
