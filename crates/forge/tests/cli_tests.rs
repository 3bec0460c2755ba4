//! Tests for the text-forge binary: outputs, exit codes and JSON mode.


use assert_cmd::Command;
use harness::{sample_book, TestBook};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;

fn forge(book: &TestBook) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("text-forge"));
    cmd.current_dir(book.root());
    cmd
}

const TEMPLATE: &str = "title: [title]\nedition: [edition]\ndate: [date]\nrights: [rights]\n";

#[test]
fn test_combine_to_stdout() {
    let book = sample_book();
    book.config_path();

    forge(&book)
        .args(["combine", "--no-git-dates"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Test Fixtures {#index-md}"))
        .stdout(predicate::str::contains("[Chapter 1](#chapter1-md)"));
}

#[test]
fn test_combine_to_file() {
    let book = sample_book();
    book.config_path();

    forge(&book)
        .args(["combine", "--no-git-dates", "-o", "build/text_combined.txt"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Combined 3 chapters"));

    let text = book.read("build/text_combined.txt");
    assert!(text.contains("/// chapter-dates\nСоздано: 2024-01-15"));
}

#[test]
fn test_quiet_suppresses_progress() {
    let book = sample_book();
    book.config_path();

    forge(&book)
        .args(["-q", "combine", "--no-git-dates", "-o", "out.txt"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_explicit_config_path() {
    let book = sample_book();
    let config = book.config_path();
    let out = book.root().join("combined.md");

    Command::new(assert_cmd::cargo::cargo_bin!("text-forge"))
        .arg("combine")
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(&out)
        .arg("--no-git-dates")
        .assert()
        .success();

    assert!(out.exists());
}

#[test]
fn test_missing_config_field_exits_with_2() {
    let book = TestBook::new().chapter("index.md", "# Home\n");
    fs::write(
        book.root().join("mkdocs.yml"),
        "docs_dir: docs\nnav:\n  - index.md\n",
    )
    .unwrap();

    forge(&book)
        .arg("combine")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("site_url"));
}

#[test]
fn test_missing_chapter_exits_with_3_and_writes_nothing() {
    let book = TestBook::new()
        .chapter("index.md", "# Home\n")
        .nav("  - index.md\n  - ghost.md\n");
    book.config_path();

    forge(&book)
        .args(["combine", "--no-git-dates", "-o", "out.txt"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("ghost.md"));

    assert!(!book.root().join("out.txt").exists());
}

#[test]
fn test_duplicate_anchor_exits_with_4() {
    let book = TestBook::new()
        .chapter("a/b.md", "# B\n")
        .chapter("a-b.md", "# AB\n");
    book.config_path();

    forge(&book)
        .args(["combine", "--no-git-dates"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("a-b-md"));
}

#[test]
fn test_unterminated_frontmatter_exits_with_4() {
    let book = TestBook::new().chapter("a.md", "---\ncreated: 2024-01-01\n# A\n");
    book.config_path();

    forge(&book)
        .args(["combine", "--no-git-dates"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("a.md"));
}

#[test]
fn test_dangling_link_warns_and_succeeds() {
    let book = TestBook::new().chapter("a.md", "# A\n\n[later](later.md)\n");
    book.config_path();

    let output = forge(&book)
        .args(["combine", "--no-git-dates", "-o", "out.txt"])
        .output()
        .unwrap();
    assert!(output.status.success());

    // Reported exactly once
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stderr.matches("later.md").count(), 1, "{}", stderr);
    assert!(book.read("out.txt").contains("[later](#later-md)"));
}

#[test]
fn test_combine_json_report() {
    let book = sample_book();
    book.config_path();

    let output = forge(&book)
        .args(["combine", "--no-git-dates", "-o", "out.txt", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["metadata"]["command"], "combine");
    assert_eq!(json["data"]["chapters"].as_array().unwrap().len(), 3);
    assert_eq!(json["data"]["chapters"][1]["anchor_id"], "chapter1-md");
}

#[test]
fn test_json_requires_output_file() {
    let book = sample_book();
    book.config_path();

    forge(&book).args(["combine", "--json"]).assert().failure();
}

#[test]
fn test_json_error_on_failure() {
    let book = TestBook::new().nav("  - ghost.md\n");
    book.config_path();

    let output = forge(&book)
        .args(["prepare", "--no-git-dates", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "MISSING_FILE");
    assert_eq!(json["metadata"]["command"], "prepare");
}

#[test]
fn test_normalize_to_stdout() {
    let book = TestBook::new();
    fs::write(
        book.root().join("combined.md"),
        "Intro\n/// quote\n![x](x.png){: width=50% }\n///\n",
    )
    .unwrap();

    forge(&book)
        .args(["normalize", "combined.md"])
        .assert()
        .success()
        .stdout("Intro\n\n::: quote\n![x](x.png){width=\"50%\"}\n:::\n");
}

#[test]
fn test_normalize_uses_configured_captions() {
    let book = sample_book();
    book.config_path();
    fs::write(
        book.root().join("combined.md"),
        "/// situation\nText\n///\n",
    )
    .unwrap();

    forge(&book)
        .args(["normalize", "combined.md", "--config", "mkdocs.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("###### Situation {.block-caption}"));
}

#[test]
fn test_normalize_unterminated_block_exits_with_4() {
    let book = TestBook::new();
    fs::write(book.root().join("combined.md"), "Intro\n\n/// quote\nText\n").unwrap();

    forge(&book)
        .args(["normalize", "combined.md"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("line 3"));
}

#[test]
fn test_meta_fills_template() {
    let book = sample_book();
    book.config_path();
    fs::write(book.root().join("meta.template.yml"), TEMPLATE).unwrap();

    forge(&book)
        .args([
            "meta",
            "--template",
            "meta.template.yml",
            "--output",
            "book_meta.yml",
            "--edition",
            "v1.0.0, 29 January 2026",
            "--date",
            "2026-01-29",
        ])
        .assert()
        .success();

    assert_eq!(
        book.read("book_meta.yml"),
        concat!(
            "title: Test Book\nedition: v1.0.0, 29 January 2026\ndate: 2026-01-29\n",
            "rights: <a href=\"https://example.com/book\">https://example.com/book</a>\n",
        )
    );
}

#[test]
fn test_meta_unknown_placeholder_exits_with_4() {
    let book = sample_book();
    book.config_path();
    fs::write(book.root().join("meta.template.yml"), "title: [title]\nisbn: [isbn]\n").unwrap();

    forge(&book)
        .args(["meta", "-t", "meta.template.yml", "-o", "book_meta.yml"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("[isbn]"));

    assert!(!book.root().join("book_meta.yml").exists());
}

#[test]
fn test_meta_invalid_date_is_generic_error() {
    let book = sample_book();
    book.config_path();
    fs::write(book.root().join("meta.template.yml"), TEMPLATE).unwrap();

    forge(&book)
        .args(["meta", "-t", "meta.template.yml", "-o", "m.yml", "--date", "29.01.2026"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--date"));
}

#[test]
fn test_prepare_writes_build_inputs() {
    let book = sample_book();
    book.config_path();
    fs::write(book.root().join("meta.template.yml"), TEMPLATE).unwrap();

    forge(&book)
        .args([
            "prepare",
            "--no-git-dates",
            "--build-dir",
            "build",
            "--template",
            "meta.template.yml",
        ])
        .assert()
        .success();

    let combined = book.read("build/text_combined.txt");
    let pandoc = book.read("build/pandoc.md");
    let meta = book.read("build/book_meta.yml");

    assert!(combined.contains("/// situation"));
    assert!(pandoc.contains("::: situation"));
    assert!(!pandoc.lines().any(|l| l.starts_with("///")));
    assert!(meta.starts_with("title: Test Book\n"));
}

#[test]
fn test_prepare_json_lists_generic_types() {
    let book = sample_book();
    book.config_path();

    let output = forge(&book)
        .args(["prepare", "--no-git-dates", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["data"]["chapters"], 3);
    assert_eq!(json["data"]["blocks"], 4);
    assert_eq!(json["data"]["generic_types"], serde_json::json!(["quote"]));
    assert!(json["data"]["metadata"].is_null());
}

#[test]
fn test_info_lists_exit_codes() {
    let book = TestBook::new();

    forge(&book)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("text-forge"))
        .stdout(predicate::str::contains("Exit Codes:"));
}
