use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[test]
fn encode_and_decode_safe_mathml() -> Result<(), Box<dyn std::error::Error>> {
    #[allow(deprecated)]
    Command::cargo_bin("mathviewer")?
        .args(["encode", r#"<math><mo>&amp;</mo></math>"#])
        .assert()
        .success()
        .stdout("«math»«mo»§amp;«/mo»«/math»\n");

    #[allow(deprecated)]
    Command::cargo_bin("mathviewer")?
        .args(["decode", "«math»«mi»x«/mi»«/math»"])
        .assert()
        .success()
        .stdout("<math><mi>x</mi></math>\n");

    #[allow(deprecated)]
    Command::cargo_bin("mathviewer")?
        .arg("decode")
        .write_stdin("«math»«mo»<«/mo»«/math»\n")
        .arg("--blackboard")
        .assert()
        .success()
        .stdout("<math><mo>&lt;</mo></math>\n");
    Ok(())
}

#[test]
fn metrics_of_svg_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let svg = dir.path().join("formula.svg");
    fs::write(
        &svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" height="24" width="43" wrs:baseline="16"></svg>"#,
    )?;

    #[allow(deprecated)]
    let assert = Command::cargo_bin("mathviewer")?
        .arg("metrics")
        .arg(&svg)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value["width"], 43.0);
    assert_eq!(value["height"], 24.0);
    assert_eq!(value["baseline"], 16.0);
    Ok(())
}

#[test]
fn metrics_without_width_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let svg = dir.path().join("empty.svg");
    fs::write(&svg, "<svg></svg>")?;

    #[allow(deprecated)]
    Command::cargo_bin("mathviewer")?
        .arg("metrics")
        .arg(&svg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No metrics found"));
    Ok(())
}

#[test]
fn to_latex_extracts_annotations() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let page = dir.path().join("page.html");
    fs::write(
        &page,
        r#"<p>Area <math><semantics><mi>r</mi><annotation encoding="LaTeX">\pi r^2</annotation></semantics></math></p>"#,
    )?;

    #[allow(deprecated)]
    Command::cargo_bin("mathviewer")?
        .current_dir(dir.path())
        .arg("to-latex")
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains(r"<p>Area $$\pi r^2$$</p>"));
    Ok(())
}

#[test]
fn to_latex_honors_config_parse_modes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let page = dir.path().join("page.html");
    let html = r#"<math><semantics><mi>r</mi><annotation encoding="LaTeX">r</annotation></semantics></math>"#;
    fs::write(&page, html)?;
    fs::write(dir.path().join("viewer.yml"), "parse_modes: []\n")?;

    #[allow(deprecated)]
    Command::cargo_bin("mathviewer")?
        .current_dir(dir.path())
        .args(["--config", "viewer.yml", "to-latex"])
        .arg(&page)
        .assert()
        .success()
        .stdout(format!("{html}\n"));
    Ok(())
}

#[test]
fn invalid_config_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("mathviewer.yml"), "dpi: [not a number]\n")?;
    fs::write(dir.path().join("page.html"), "<p></p>")?;

    #[allow(deprecated)]
    Command::cargo_bin("mathviewer")?
        .current_dir(dir.path())
        .args(["to-latex", "page.html"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
    Ok(())
}
