use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use snap_engine::fixtures::{inspect_output, rect, SourcePdfBuilder};
use std::fs;
use std::path::Path;

fn highlighted_pdf() -> SourcePdfBuilder {
    SourcePdfBuilder::new()
        .page()
        .highlight([50.0, 700.0, 150.0, 720.0], &[[50.0, 710.0, 150.0, 720.0], [50.0, 700.0, 150.0, 710.0]])
        .page()
        .annotation("Link", [0.0, 0.0, 20.0, 20.0])
}

fn output_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("output dir should exist")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn processes_pdf_files_of_any_case_and_skips_others() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    fs::create_dir(&input).expect("input dir");
    highlighted_pdf().write_to(&input.join("report.pdf")).expect("fixture");
    highlighted_pdf().write_to(&input.join("notes.PDF")).expect("fixture");
    fs::write(input.join("readme.txt"), "not a pdf").expect("fixture");

    let stdout = cargo_bin_cmd!("highlight-snap")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .env("HIGHLIGHT_SNAP_BACKEND", "placeholder")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    insta::assert_snapshot!(String::from_utf8_lossy(&stdout), @r###"
    Started processing file: notes.PDF
    Finished processing file: notes.PDF
    Started processing file: report.pdf
    Finished processing file: report.pdf
    "###);
    assert_eq!(output_names(&output), vec!["notes_out.pdf", "report_out.pdf"]);
}

#[test]
fn output_holds_one_page_per_highlighted_source_page() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    highlighted_pdf().write_to(&temp.path().join("paper.pdf")).expect("fixture");
    let output = temp.path().join("snapshots");

    cargo_bin_cmd!("highlight-snap")
        .arg("--input")
        .arg(temp.path())
        .arg("--output")
        .arg(&output)
        .env("HIGHLIGHT_SNAP_BACKEND", "placeholder")
        .assert()
        .success();

    let pages = inspect_output(&fs::read(output.join("paper_out.pdf")).expect("output exists"));
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].size, (101.0, 45.0));
    assert_eq!(pages[0].labels, vec!["Page: 1".to_owned()]);
    assert_eq!(pages[0].images, vec![rect(0.0, 30.0, 100.0, 40.0), rect(0.0, 20.0, 100.0, 30.0)]);
}

#[test]
fn empty_input_directory_reports_no_files() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let output = temp.path().join("out");

    cargo_bin_cmd!("highlight-snap")
        .arg("-i")
        .arg(temp.path())
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::eq("No pdf files found in the specified input directory.\n"));

    assert!(!output.exists());
}

#[test]
fn missing_output_argument_prints_usage_and_fails() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("highlight-snap")
        .arg("-i")
        .arg(temp.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("--output <DIR>"))
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn help_succeeds() {
    cargo_bin_cmd!("highlight-snap")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--input <DIR>"));
}

#[test]
fn invalid_pdf_is_reported_and_run_continues() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    fs::create_dir(&input).expect("input dir");
    fs::write(input.join("a-broken.pdf"), b"this is not a pdf").expect("fixture");
    highlighted_pdf().write_to(&input.join("b-good.pdf")).expect("fixture");

    cargo_bin_cmd!("highlight-snap")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .env("HIGHLIGHT_SNAP_BACKEND", "placeholder")
        .assert()
        .success()
        .stdout(predicate::str::contains("Finished processing file: b-good.pdf"))
        .stderr(predicate::str::contains("Failed to process file: a-broken.pdf"))
        .stderr(predicate::str::contains("open stage failed"));

    assert_eq!(output_names(&output), vec!["b-good_out.pdf"]);
}

#[test]
fn unknown_backend_is_rejected() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    highlighted_pdf().write_to(&temp.path().join("paper.pdf")).expect("fixture");

    cargo_bin_cmd!("highlight-snap")
        .arg("-i")
        .arg(temp.path())
        .arg("-o")
        .arg(temp.path().join("out"))
        .env("HIGHLIGHT_SNAP_BACKEND", "ghostscript")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown HIGHLIGHT_SNAP_BACKEND value"));
}
