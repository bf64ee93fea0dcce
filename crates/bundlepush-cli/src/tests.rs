use super::*;
use std::sync::atomic::{AtomicU64, Ordering};

use bundlepush_store::{
    current_bundle_path, read_status, InstallOutcome, PackageMetadata, StatusRecord, StoreLayout,
    VerificationPlan,
};
use clap::error::ErrorKind;
use clap::CommandFactory;
use reqwest::Url;

use crate::dispatch::{
    build_update_record, format_install_outcome, format_status_lines, format_verification,
    resolve_config, run_cli,
};
use crate::render::{render_progress_line, render_status_line, resolve_output_style, OutputStyle};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_dir() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "bundlepush-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    std::fs::create_dir_all(&dir).expect("must create test dir");
    dir
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments must parse")
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn install_accepts_discard_pending_flag() {
    let cli = parse(&["bundlepush", "install", "abc123", "--discard-pending"]);
    match cli.command {
        Commands::Install {
            hash,
            discard_pending,
        } => {
            assert_eq!(hash, "abc123");
            assert!(discard_pending);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn global_flags_are_accepted_after_subcommand() {
    let cli = parse(&[
        "bundlepush",
        "status",
        "--base-dir",
        "/data/app",
        "--test-mode",
        "--bundle-file-name",
        "main.jsbundle",
    ]);
    assert_eq!(cli.global.base_dir, Some(PathBuf::from("/data/app")));
    assert!(cli.global.test_mode);
    assert_eq!(cli.global.bundle_file_name.as_deref(), Some("main.jsbundle"));
}

#[test]
fn download_requires_hash_and_url() {
    let err = Cli::try_parse_from(["bundlepush", "download", "--hash", "h1"])
        .expect_err("missing url must fail");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "installed h2"),
        "installed h2"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "installed h2"),
        "[OK] installed h2"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "signature not checked"),
        "[WARN] signature not checked"
    );
}

#[test]
fn resolve_output_style_follows_stdout_tty() {
    assert_eq!(resolve_output_style(true), OutputStyle::Rich);
    assert_eq!(resolve_output_style(false), OutputStyle::Plain);
}

#[test]
fn progress_line_is_only_rendered_for_rich_output() {
    assert!(render_progress_line(OutputStyle::Plain, "download", 2048, None).is_none());
    let line = render_progress_line(
        OutputStyle::Rich,
        "download",
        2048,
        Some(std::time::Duration::from_millis(1500)),
    )
    .expect("rich output must render");
    assert!(line.contains("download"));
    assert!(line.contains("KiB"));
    assert!(line.ends_with(" in 1.500s"));
}

#[test]
fn update_record_merges_release_attributes() {
    let record = build_update_record(
        "h1",
        "https://updates.test/h1.zip",
        Some(r#"{ "label": "v7", "isMandatory": true, "packageHash": "forged" }"#),
    )
    .expect("must build record");

    assert_eq!(record.package_hash, "h1");
    assert_eq!(record.download_url, "https://updates.test/h1.zip");
    assert_eq!(record.attribute("label"), Some(&serde_json::json!("v7")));
    assert_eq!(record.attribute("isMandatory"), Some(&serde_json::json!(true)));
    assert!(record.attribute("packageHash").is_none());
}

#[test]
fn update_record_reads_attributes_from_file() {
    let dir = test_dir();
    let path = dir.join("release.json");
    std::fs::write(&path, br#"{ "label": "v8" }"#).expect("must write release file");

    let record = build_update_record(
        "h1",
        "https://updates.test/h1.zip",
        Some(&format!("@{}", path.display())),
    )
    .expect("must build record");
    assert_eq!(record.attribute("label"), Some(&serde_json::json!("v8")));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn update_record_rejects_non_object_attributes() {
    let err = build_update_record("h1", "https://updates.test/h1", Some("[1, 2]"))
        .expect_err("array must be rejected");
    assert!(err.to_string().contains("JSON object"));
    assert!(build_update_record("h1", "https://updates.test/h1", Some("{ nope")).is_err());
}

#[test]
fn status_lines_describe_both_slots() {
    let status = StatusRecord {
        current_package: Some("h2".to_string()),
        previous_package: None,
    };
    let mut current = PackageMetadata::new("h2", "https://updates.test/h2")
        .with_relative_bundle_path("dist/index.bundle");
    current
        .extra
        .insert("label".to_string(), serde_json::json!("v2"));

    assert_eq!(
        format_status_lines(&status, Some(&current), None),
        vec![
            "current: h2 v2 (bundle: dist/index.bundle)".to_string(),
            "previous: none".to_string(),
        ]
    );
}

#[test]
fn install_and_verification_messages() {
    assert_eq!(
        format_install_outcome(
            "h2",
            &InstallOutcome::Installed {
                previous: Some("h1".to_string())
            }
        ),
        "installed h2 (rollback target: h1)"
    );
    assert_eq!(
        format_install_outcome("h2", &InstallOutcome::AlreadyCurrent),
        "h2 is already current"
    );
    assert_eq!(
        format_verification("h2", VerificationPlan::HashOnly),
        "h2: content hash verified"
    );
}

#[test]
fn flags_override_config_file_values() {
    let dir = test_dir();
    let config_path = dir.join("bundlepush.toml");
    std::fs::write(
        &config_path,
        "base_dir = \"/from/file\"\nbundle_file_name = \"main.jsbundle\"\n",
    )
    .expect("must write config");

    let cli = parse(&[
        "bundlepush",
        "--config",
        config_path.to_str().expect("utf-8 path"),
        "--base-dir",
        "/from/flag",
        "--test-mode",
        "status",
    ]);
    let config = resolve_config(&cli.global).expect("must resolve config");
    assert_eq!(config.base_dir, Some(PathBuf::from("/from/flag")));
    assert!(config.test_mode);
    assert_eq!(config.bundle_file_name, "main.jsbundle");

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn download_install_and_rollback_through_cli() {
    let dir = test_dir();
    let base_dir = dir.join("device");
    let base = base_dir.to_str().expect("utf-8 path");
    let release_v1 = dir.join("v1.bundle");
    let release_v2 = dir.join("v2.bundle");
    std::fs::write(&release_v1, b"{\"version\":1}").expect("must write v1");
    std::fs::write(&release_v2, b"{\"version\":2}").expect("must write v2");

    for (hash, path) in [("h1", &release_v1), ("h2", &release_v2)] {
        let url = Url::from_file_path(path).expect("file url");
        run_cli(parse(&[
            "bundlepush",
            "--base-dir",
            base,
            "download",
            "--hash",
            hash,
            "--url",
            url.as_str(),
        ]))
        .expect("download must succeed");
        run_cli(parse(&["bundlepush", "--base-dir", base, "install", hash]))
            .expect("install must succeed");
    }

    let layout = StoreLayout::new(&base_dir);
    assert_eq!(
        read_status(&layout).expect("must read status"),
        StatusRecord {
            current_package: Some("h2".to_string()),
            previous_package: Some("h1".to_string()),
        }
    );

    run_cli(parse(&["bundlepush", "--base-dir", base, "rollback"])).expect("rollback");
    let bundle = current_bundle_path(&layout, "index.bundle")
        .expect("must resolve")
        .expect("bundle must exist");
    assert_eq!(
        std::fs::read(bundle).expect("must read bundle"),
        b"{\"version\":1}"
    );

    let err = run_cli(parse(&["bundlepush", "--base-dir", base, "rollback"]))
        .expect_err("second rollback has no target");
    assert!(format!("{err:#}").contains("rollback"));

    run_cli(parse(&["bundlepush", "--base-dir", base, "clear"])).expect("clear");
    assert_eq!(
        read_status(&layout).expect("must read status"),
        StatusRecord::default()
    );

    let _ = std::fs::remove_dir_all(dir);
}
