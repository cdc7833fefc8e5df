use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn command_holdout_exclude() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = cargo_bin_cmd!("ptrait");
    let output = cmd
        .arg("holdout")
        .arg("tests/ptrait/tree.nwk")
        .arg("tests/ptrait/traits.tsv")
        .arg("--max-dist")
        .arg("0.5")
        .arg("--increment")
        .arg("0.25")
        .arg("--outdir")
        .arg(temp.path())
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    // A, B and C at distances 0 and 0.25; D has no traits
    assert_eq!(stdout.lines().count(), 6);
    assert!(stdout.contains("exclude_tips_by_distance--0--A\n"));
    assert!(stdout.contains("exclude_tips_by_distance--0.25--C\n"));
    assert!(!stdout.contains("--D\n"));

    let tree = fs::read_to_string(temp.path().join("test_tree--exclude_tips_by_distance--0--A.nwk"))?;
    assert_eq!(tree, "(B:2,(C:3,D:1)F:1)root;\n");

    let table = fs::read_to_string(
        temp.path()
            .join("test_trait_table--exclude_tips_by_distance--0--A.tsv"),
    )?;
    assert_eq!(table, "id\tK1\tK2\nB\t3\t2\nC\t5\t5\n");

    let expected =
        fs::read_to_string(temp.path().join("exp_traits--exclude_tips_by_distance--0--A.tsv"))?;
    assert_eq!(expected, "id\tK1\tK2\nA\t1\t0\n");

    Ok(())
}

#[test]
fn command_holdout_randomize() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = cargo_bin_cmd!("ptrait");
    cmd.arg("holdout")
        .arg("tests/ptrait/tree.nwk")
        .arg("tests/ptrait/traits.tsv")
        .arg("-m")
        .arg("randomize")
        .arg("-i")
        .arg("A")
        .arg("--max-dist")
        .arg("3")
        .arg("--increment")
        .arg("2")
        .arg("--outdir")
        .arg(temp.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("randomize_tip_labels_by_distance--0--A"))
        .stdout(predicate::str::contains("randomize_tip_labels_by_distance--2--A"));

    let tree = fs::read_to_string(
        temp.path()
            .join("test_tree--randomize_tip_labels_by_distance--2--A.nwk"),
    )?;
    // A and B swap labels at most; C and D are out of reach
    assert!(tree.contains("C:3"));
    assert!(tree.contains("D:1"));
    assert_eq!(tree.matches("A:1").count() + tree.matches("B:1").count(), 2);

    Ok(())
}

#[test]
fn command_holdout_unknown_organism() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = cargo_bin_cmd!("ptrait");
    cmd.arg("holdout")
        .arg("tests/ptrait/tree.nwk")
        .arg("tests/ptrait/traits.tsv")
        .arg("-i")
        .arg("D")
        .arg("--outdir")
        .arg(temp.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("'D' is not present"));

    Ok(())
}

#[test]
fn command_holdout_empty_range() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = cargo_bin_cmd!("ptrait");
    cmd.arg("holdout")
        .arg("tests/ptrait/tree.nwk")
        .arg("tests/ptrait/traits.tsv")
        .arg("--min-dist")
        .arg("0.1")
        .arg("--max-dist")
        .arg("0.1")
        .arg("--outdir")
        .arg(temp.path());
    cmd.assert().success().stdout(predicate::str::is_empty());

    Ok(())
}
