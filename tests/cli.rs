use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn summary_only_runs_the_whole_timeline() {
    let mut cmd = Command::cargo_bin("miniature-chase").expect("binary exists");
    cmd.arg("--summary-only").arg("--fps").arg("30");
    cmd.assert()
        .success()
        .stdout(contains("JAX & NINO - Miniature Morning Chase"))
        .stdout(contains("Built diorama with"))
        .stdout(contains("JAX: \"Come on, Nino!"))
        .stdout(contains("NINO: \"Wait! This bag is too heavy!\""))
        .stdout(contains("t=8.00s"))
        .stdout(contains("Final state:"))
        .stdout(contains(" - jax pos=(3.30, 0.09, 0.35)"))
        .stdout(contains(" - nino pos=(3.05, 0.12, -0.30)"));
}

#[test]
fn seed_changes_nothing_that_moves() {
    let run = |seed: &str| {
        let output = Command::cargo_bin("miniature-chase")
            .expect("binary exists")
            .args(["--summary-only", "--seed", seed])
            .output()
            .expect("binary runs");
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
        stdout
            .lines()
            .filter(|line| line.starts_with(" - jax") || line.starts_with(" - nino"))
            .map(str::to_owned)
            .collect::<Vec<_>>()
    };
    assert_eq!(run("1"), run("99"));
}

#[test]
fn unknown_argument_is_rejected() {
    let mut cmd = Command::cargo_bin("miniature-chase").expect("binary exists");
    cmd.arg("--loop");
    cmd.assert()
        .failure()
        .stderr(contains("Usage: miniature-chase"));
}
