use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("harvester")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("harvester")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("harvester"));
}

#[test]
fn rejects_invalid_video_reference() {
    Command::cargo_bin("harvester")
        .unwrap()
        .env("XDG_CONFIG_HOME", std::env::temp_dir())
        .args(["fetch", "definitely not a video id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid video reference"));
}
