use serde_json::json;

use super::*;

#[test]
fn parse_status_record_with_both_pointers() {
    let raw = r#"{ "currentPackage": "abc", "previousPackage": "def" }"#;
    let status = StatusRecord::from_json_str(raw).expect("status should parse");
    assert_eq!(status.current_package.as_deref(), Some("abc"));
    assert_eq!(status.previous_package.as_deref(), Some("def"));
    assert!(!status.is_empty());
}

#[test]
fn empty_status_record_serializes_without_keys() {
    let serialized = StatusRecord::default()
        .to_json_string()
        .expect("must serialize");
    assert_eq!(serialized.trim(), "{}");
    let parsed = StatusRecord::from_json_str(&serialized).expect("must parse back");
    assert!(parsed.is_empty());
}

#[test]
fn status_record_rejects_non_object_payload() {
    assert!(StatusRecord::from_json_str("not json").is_err());
    assert!(StatusRecord::from_json_str("[1, 2]").is_err());
}

#[test]
fn package_metadata_keeps_unknown_fields() {
    let raw = r#"{
        "packageHash": "h1",
        "downloadUrl": "https://example.test/h1.zip",
        "label": "v7",
        "appVersion": "1.2.0",
        "isMandatory": true
    }"#;

    let metadata = PackageMetadata::from_json_str(raw).expect("metadata should parse");
    assert_eq!(metadata.package_hash, "h1");
    assert!(metadata.relative_bundle_path.is_none());
    assert_eq!(metadata.attribute("label"), Some(&json!("v7")));

    let rewritten = metadata
        .clone()
        .with_relative_bundle_path("assets/index.bundle")
        .to_json_string()
        .expect("must serialize");
    let reparsed = PackageMetadata::from_json_str(&rewritten).expect("must parse back");
    assert_eq!(
        reparsed.relative_bundle_path.as_deref(),
        Some("assets/index.bundle")
    );
    assert_eq!(reparsed.attribute("isMandatory"), Some(&json!(true)));
    assert_eq!(reparsed.attribute("appVersion"), Some(&json!("1.2.0")));
}

#[test]
fn package_metadata_requires_package_hash() {
    assert!(PackageMetadata::from_json_str(r#"{ "downloadUrl": "x" }"#).is_err());
    assert!(PackageMetadata::from_json_str(r#"{ "packageHash": "  " }"#).is_err());
}

#[test]
fn sniffer_classifies_zip_magic_as_container() {
    let mut sniffer = HeaderSniffer::new();
    sniffer.feed(&[0x50, 0x4B, 0x03, 0x04, 0x14, 0x00]);
    assert!(sniffer.is_complete());
    assert_eq!(sniffer.kind(), PayloadKind::Container);
}

#[test]
fn sniffer_classifies_json_like_payload_as_raw_bundle() {
    let mut sniffer = HeaderSniffer::new();
    sniffer.feed(b"{\"a\":1}");
    assert_eq!(sniffer.kind(), PayloadKind::RawBundle);
}

#[test]
fn sniffer_accumulates_header_across_small_chunks() {
    let mut sniffer = HeaderSniffer::new();
    sniffer.feed(&[0x50]);
    assert!(!sniffer.is_complete());
    sniffer.feed(&[]);
    sniffer.feed(&[0x4B, 0x03]);
    sniffer.feed(&[0x04, 0xFF, 0xFF]);
    assert_eq!(sniffer.header(), &ZIP_LOCAL_FILE_HEADER_MAGIC);
    assert_eq!(sniffer.kind(), PayloadKind::Container);

    sniffer.feed(&[0x00, 0x00, 0x00, 0x00]);
    assert_eq!(sniffer.kind(), PayloadKind::Container);
}

#[test]
fn sniffer_treats_short_payload_as_raw_bundle() {
    let mut sniffer = HeaderSniffer::new();
    sniffer.feed(&[0x50, 0x4B, 0x03]);
    assert!(!sniffer.is_complete());
    assert_eq!(sniffer.kind(), PayloadKind::RawBundle);
}

#[test]
fn parse_diff_manifest_with_retained_and_deleted_files() {
    let raw = r#"{ "retainedFiles": ["assets/logo.png"], "deletedFiles": ["old.js"] }"#;
    let manifest = DiffManifest::from_json_str(raw).expect("manifest should parse");
    assert_eq!(
        manifest.retained_files,
        Some(vec!["assets/logo.png".to_string()])
    );
    assert!(manifest.is_deleted("old.js"));
    assert!(manifest.is_deleted("./old.js"));
    assert!(!manifest.is_deleted("assets/logo.png"));
}

#[test]
fn parse_legacy_diff_manifest_with_deleted_files_only() {
    let manifest =
        DiffManifest::from_json_str(r#"{ "deletedFiles": [] }"#).expect("manifest should parse");
    assert!(manifest.retained_files.is_none());
    assert!(manifest.deleted_files.is_empty());
}

#[test]
fn diff_manifest_rejects_escaping_paths() {
    for raw in [
        r#"{ "retainedFiles": ["../secrets"] }"#,
        r#"{ "deletedFiles": ["/etc/passwd"] }"#,
        r#"{ "retainedFiles": [""] }"#,
    ] {
        assert!(
            DiffManifest::from_json_str(raw).is_err(),
            "manifest should be rejected: {raw}"
        );
    }
}
