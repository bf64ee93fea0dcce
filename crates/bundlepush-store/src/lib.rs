//! On-device package store for over-the-air bundle updates.
//!
//! A cycle runs [`download_package`] (download, assemble, verify, write
//! metadata) and then [`install_package`], which commits the switch by
//! writing the status record. The status record is the only commit point:
//! every directory change happens before it is written, so an interrupted
//! cycle leaves either the old state or the new one.
//!
//! The store does not lock. Callers must serialize `download_package`,
//! `install_package` and `rollback_package` against one [`StoreLayout`].

mod assemble;
mod config;
mod download;
mod error;
mod fs_utils;
mod install;
mod layout;
mod metadata;
mod pipeline;
mod source;
mod verify;

pub use assemble::{
    assemble_package, find_bundle_file, ArchiveExtractor, AssembledPackage, AssemblyRequest,
    UpdateKind, ZipExtractor,
};
pub use bundlepush_core::{PackageMetadata, PayloadKind, StatusRecord};
pub use config::{UpdaterConfig, DEFAULT_BUNDLE_FILE_NAME};
pub use download::{
    download_to_staging, stream_to_writer, DownloadProgress, DownloadedPayload,
    DOWNLOAD_BUFFER_SIZE,
};
pub use error::{Result, StorageContext, UpdateError};
pub use install::{clear_updates, install_package, rollback_package, InstallOutcome};
pub use layout::{
    default_base_dir, validate_bundle_file_name, validate_package_hash, StoreLayout,
    DOWNLOAD_STAGING_FILE_NAME, PACKAGE_METADATA_FILE_NAME, STATUS_FILE_NAME, STORE_FOLDER_NAME,
    TEST_STORE_FOLDER_NAME, UNZIPPED_DIR_NAME,
};
pub use metadata::{
    current_bundle_path, current_package, current_package_dir, current_package_hash,
    previous_package, previous_package_hash, read_package_metadata, read_status,
    write_package_metadata, write_status,
};
pub use pipeline::{download_package, replace_current_bundle, DownloadRequest};
pub use source::{parse_download_url, DefaultPackageSource, PackageSource, Transfer};
pub use verify::{
    compute_content_hash, plan_verification, validate_public_key, verify_content_hash,
    verify_installed_package, verify_package, VerificationPlan, SIGNATURE_FILE_NAME,
};
