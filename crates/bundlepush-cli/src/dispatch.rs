use std::fs;

use anyhow::{anyhow, Context, Result};
use bundlepush_core::PackageMetadata;
use bundlepush_store::{
    clear_updates, compute_content_hash, current_bundle_path, current_package, download_package,
    install_package, previous_package, read_status, replace_current_bundle, rollback_package,
    verify_installed_package, DefaultPackageSource, DownloadRequest, InstallOutcome, StatusRecord,
    UpdaterConfig, VerificationPlan, ZipExtractor,
};
use serde_json::Value;
use tracing::debug;

use crate::render::TerminalRenderer;
use crate::{Cli, Commands, GlobalArgs};

/// Keys owned by the store; values passed through `--metadata` must not
/// shadow them.
const RESERVED_METADATA_KEYS: [&str; 3] = ["packageHash", "downloadUrl", "relativeBundlePath"];

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli.global)?;
    config.validate()?;
    let layout = config.layout()?;
    let renderer = TerminalRenderer::current();
    debug!(root = %layout.root().display(), "resolved package store");

    match cli.command {
        Commands::Status { json } => {
            let status = read_status(&layout)?;
            if json {
                println!("{}", status.to_json_string()?);
                return Ok(());
            }
            let current = current_package(&layout)?;
            let previous = previous_package(&layout)?;
            renderer.print_section("status");
            renderer.print_lines(&format_status_lines(
                &status,
                current.as_ref(),
                previous.as_ref(),
            ));
        }
        Commands::Download {
            hash,
            url,
            metadata,
        } => {
            let update = build_update_record(&hash, &url, metadata.as_deref())?;
            let source = DefaultPackageSource::new();
            let progress = renderer.start_progress("download");
            let result = download_package(
                &layout,
                &source,
                &ZipExtractor,
                &DownloadRequest {
                    update: &update,
                    expected_bundle_file_name: &config.bundle_file_name,
                    public_key: config.public_key(),
                },
                |event| progress.update(event),
            );
            let stored = match result {
                Ok(stored) => {
                    progress.finish_success();
                    stored
                }
                Err(err) => {
                    progress.finish_abandon();
                    return Err(err).with_context(|| format!("failed to download package {hash}"));
                }
            };
            renderer.print_status(
                "ok",
                &format!(
                    "downloaded {} (bundle: {})",
                    stored.package_hash,
                    stored.relative_bundle_path.as_deref().unwrap_or("-")
                ),
            );
        }
        Commands::Install {
            hash,
            discard_pending,
        } => {
            let outcome = install_package(&layout, &hash, discard_pending)
                .with_context(|| format!("failed to install package {hash}"))?;
            renderer.print_status("ok", &format_install_outcome(&hash, &outcome));
        }
        Commands::Rollback => {
            let restored = rollback_package(&layout).context("rollback failed")?;
            renderer.print_status("ok", &format!("rolled back to {restored}"));
        }
        Commands::Clear => {
            clear_updates(&layout)?;
            renderer.print_status("ok", &format!("cleared {}", layout.root().display()));
        }
        Commands::Verify { hash } => {
            let plan = verify_installed_package(&layout, &hash, config.public_key())
                .with_context(|| format!("package {hash} failed verification"))?;
            renderer.print_status("ok", &format_verification(&hash, plan));
        }
        Commands::Hash { dir } => {
            let hash = compute_content_hash(&dir)
                .with_context(|| format!("failed to hash {}", dir.display()))?;
            println!("{hash}");
        }
        Commands::BundlePath => {
            let path = current_bundle_path(&layout, &config.bundle_file_name)?
                .ok_or_else(|| anyhow!("no package is installed"))?;
            println!("{}", path.display());
        }
        Commands::ReplaceBundle { url } => {
            let source = DefaultPackageSource::new();
            let path = replace_current_bundle(&layout, &source, &url, &config.bundle_file_name)?;
            renderer.print_status("ok", &format!("replaced {}", path.display()));
        }
    }

    Ok(())
}

/// Loads the config file when one is given and applies flag overrides.
pub(crate) fn resolve_config(global: &GlobalArgs) -> Result<UpdaterConfig> {
    let mut config = match &global.config {
        Some(path) => UpdaterConfig::load(path)?,
        None => UpdaterConfig::default(),
    };
    if let Some(base_dir) = &global.base_dir {
        config.base_dir = Some(base_dir.clone());
    }
    if global.test_mode {
        config.test_mode = true;
    }
    if let Some(public_key) = &global.public_key {
        config.public_key = Some(public_key.clone());
    }
    if let Some(bundle_file_name) = &global.bundle_file_name {
        config.bundle_file_name = bundle_file_name.clone();
    }
    Ok(config)
}

/// Builds the release record handed to the store. `metadata_json` may be an
/// inline JSON object or `@path` to a file holding one.
pub(crate) fn build_update_record(
    hash: &str,
    url: &str,
    metadata_json: Option<&str>,
) -> Result<PackageMetadata> {
    let mut record = PackageMetadata::new(hash, url);
    let Some(raw) = metadata_json else {
        return Ok(record);
    };

    let raw = match raw.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read release metadata {path}"))?,
        None => raw.to_string(),
    };
    let value: Value = serde_json::from_str(&raw).context("release metadata is not valid JSON")?;
    let Value::Object(mut attributes) = value else {
        return Err(anyhow!("release metadata must be a JSON object"));
    };
    for key in RESERVED_METADATA_KEYS {
        attributes.remove(key);
    }
    record.extra = attributes;
    Ok(record)
}

pub(crate) fn format_status_lines(
    status: &StatusRecord,
    current: Option<&PackageMetadata>,
    previous: Option<&PackageMetadata>,
) -> Vec<String> {
    vec![
        format_package_line("current", status.current_package.as_deref(), current),
        format_package_line("previous", status.previous_package.as_deref(), previous),
    ]
}

fn format_package_line(
    role: &str,
    hash: Option<&str>,
    metadata: Option<&PackageMetadata>,
) -> String {
    let Some(hash) = hash else {
        return format!("{role}: none");
    };
    let label = metadata
        .and_then(|record| record.attribute("label"))
        .and_then(Value::as_str)
        .map(|label| format!(" {label}"))
        .unwrap_or_default();
    let bundle = metadata
        .and_then(|record| record.relative_bundle_path.as_deref())
        .unwrap_or("?");
    format!("{role}: {hash}{label} (bundle: {bundle})")
}

pub(crate) fn format_install_outcome(hash: &str, outcome: &InstallOutcome) -> String {
    match outcome {
        InstallOutcome::AlreadyCurrent => format!("{hash} is already current"),
        InstallOutcome::Installed { previous: Some(previous) } => {
            format!("installed {hash} (rollback target: {previous})")
        }
        InstallOutcome::Installed { previous: None } => format!("installed {hash}"),
        InstallOutcome::ReplacedPending => {
            format!("installed {hash} (previous pending package discarded)")
        }
    }
}

pub(crate) fn format_verification(hash: &str, plan: VerificationPlan) -> String {
    match plan {
        VerificationPlan::HashAndSignature => {
            format!("{hash}: content hash and release signature verified")
        }
        VerificationPlan::HashOnlyUnverifiedSignature => {
            format!("{hash}: content hash verified, signature not checked (no public key)")
        }
        VerificationPlan::HashOnly => format!("{hash}: content hash verified"),
        VerificationPlan::MissingSignature | VerificationPlan::Skip => {
            format!("{hash}: nothing to verify")
        }
    }
}
