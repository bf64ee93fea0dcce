mod diff_manifest;
mod metadata;
mod payload;
mod status;

pub use diff_manifest::{DiffManifest, DIFF_MANIFEST_FILE_NAME};
pub use metadata::PackageMetadata;
pub use payload::{HeaderSniffer, PayloadKind, ZIP_LOCAL_FILE_HEADER_MAGIC};
pub use status::StatusRecord;

#[cfg(test)]
mod tests;
