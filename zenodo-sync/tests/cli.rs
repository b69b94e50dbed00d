use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::tempdir;

fn write_fixtures(dir: &std::path::Path) -> (String, String, String) {
    let pdf_path = dir.join("a.pdf");
    fs::write(&pdf_path, b"fake pdf bytes").unwrap();

    let papers_path = dir.join("papers.json");
    fs::write(
        &papers_path,
        format!(
            r#"[{{"title": "A", "year": "2020", "author": ["Doe, Jane"], "ee": "{}"}}]"#,
            pdf_path.display()
        ),
    )
    .unwrap();

    let conferences_path = dir.join("conferences.json");
    fs::write(
        &conferences_path,
        r#"{"2020": {"conference_title": "ISMIR 2020", "partof_title": "Proceedings of ISMIR 2020"}}"#,
    )
    .unwrap();

    (
        papers_path.display().to_string(),
        conferences_path.display().to_string(),
        dir.join("out.json").display().to_string(),
    )
}

#[test]
fn missing_arguments_print_usage() {
    let mut cmd = Command::cargo_bin("zenodo-sync").expect("binary exists");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn rejects_unknown_stage() {
    let dir = tempdir().unwrap();
    let (papers, conferences, output) = write_fixtures(dir.path());
    let mut cmd = Command::cargo_bin("zenodo-sync").expect("binary exists");
    cmd.args([&papers, &conferences, &output, "--stage", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage"));
}

/// Dry run makes no remote calls at all for fresh papers, so the whole flow
/// works offline: the decision logic runs and the output file is written.
#[test]
#[serial]
fn dry_run_writes_output_without_network() {
    let dir = tempdir().unwrap();
    let (papers, conferences, output) = write_fixtures(dir.path());

    let mut cmd = Command::cargo_bin("zenodo-sync").expect("binary exists");
    cmd.current_dir(dir.path())
        .env("ZENODO_TOKEN_SANDBOX", "fake-token-for-dry-run")
        .args([
            &papers,
            &conferences,
            &output,
            "--stage",
            "sandbox",
            "--dry-run",
        ])
        .assert()
        .success();

    let written = fs::read_to_string(&output).expect("output file written");
    assert!(written.contains("\"title\": \"A\""));
    // Dry run must not invent remote identifiers.
    assert!(!written.contains("zenodo_id"));
}

/// A missing credential for the requested stage is fatal at process start,
/// before any paper is processed.
#[test]
#[serial]
fn missing_token_fails_the_run_eagerly() {
    let dir = tempdir().unwrap();
    let (papers, conferences, output) = write_fixtures(dir.path());

    let mut cmd = Command::cargo_bin("zenodo-sync").expect("binary exists");
    cmd.current_dir(dir.path())
        .env_remove("ZENODO_TOKEN_SANDBOX")
        .args([&papers, &conferences, &output, "--stage", "sandbox"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ZENODO_TOKEN_SANDBOX"));

    assert!(
        !std::path::Path::new(&output).exists(),
        "no output should be written when the run fails eagerly"
    );
}
