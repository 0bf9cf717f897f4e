//! End-to-end tests for the polypath binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn polypath(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("polypath").unwrap();
    cmd.env("POLYPATH_CONFIG", config_dir.path().join("config.toml"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    polypath(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("walk"))
        .stdout(predicate::str::contains("schemes"))
        .stdout(predicate::str::contains("glob"));
}

#[test]
fn test_put_then_cat() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.txt");

    polypath(&dir)
        .arg("put")
        .arg(&file)
        .write_stdin("first\n")
        .assert()
        .success();
    polypath(&dir)
        .args(["put", "--append"])
        .arg(&file)
        .write_stdin("second\n")
        .assert()
        .success();

    polypath(&dir)
        .arg("cat")
        .arg(&file)
        .assert()
        .success()
        .stdout("first\nsecond\n");
}

#[test]
fn test_ls_walk_and_glob() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("tree");
    fs::create_dir_all(root.join("d")).unwrap();
    fs::write(root.join("a.txt"), "alpha\n").unwrap();
    fs::write(root.join("b.log"), "bravo\n").unwrap();
    fs::write(root.join("d/c.txt"), "charlie\n").unwrap();

    polypath(&dir)
        .arg("ls")
        .arg(&root)
        .assert()
        .success()
        .stdout("a.txt\nb.log\nd\n");

    polypath(&dir)
        .arg("walk")
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt"))
        .stdout(predicate::str::contains("c.txt"));

    polypath(&dir)
        .args(["glob", "--recursive"])
        .arg(&root)
        .arg("*.txt")
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt"))
        .stdout(predicate::str::contains("c.txt"))
        .stdout(predicate::str::contains("b.log").not());
}

#[test]
fn test_copy_move_and_remove_tree() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("nested")).unwrap();
    fs::write(src.join("nested/file.txt"), "payload").unwrap();

    let copy = dir.path().join("copy");
    polypath(&dir)
        .arg("cp")
        .arg(&src)
        .arg(&copy)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--recursive"));
    polypath(&dir)
        .args(["cp", "-r"])
        .arg(&src)
        .arg(&copy)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(copy.join("nested/file.txt")).unwrap(),
        "payload"
    );

    let moved = dir.path().join("moved");
    polypath(&dir).arg("mv").arg(&copy).arg(&moved).assert().success();
    assert!(!copy.exists());
    assert!(moved.join("nested/file.txt").exists());

    polypath(&dir).arg("rm").arg(&moved).assert().failure();
    polypath(&dir)
        .args(["rm", "-r"])
        .arg(&moved)
        .assert()
        .success();
    assert!(!moved.exists());
}

#[test]
fn test_copy_into_memory_scheme() {
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("local.txt");
    fs::write(&local, "through memory").unwrap();

    // The store dies with the process; only the upload itself is observable
    polypath(&dir)
        .arg("cp")
        .arg(&local)
        .arg("memory://bucket/copied.txt")
        .assert()
        .success();
}

#[test]
fn test_stat_json() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("data.bin");
    fs::write(&file, [0u8; 42]).unwrap();

    let output = polypath(&dir)
        .args(["stat", "--json"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["size"], 42);
    assert_eq!(value["is_dir"], false);
    assert_eq!(value["class"], "LocalPath");
    assert_eq!(value["backend"], "file");
}

#[test]
fn test_mkdir_requires_parents() {
    let dir = TempDir::new().unwrap();
    let deep = dir.path().join("a/b/c");

    polypath(&dir).arg("mkdir").arg(&deep).assert().code(2);
    polypath(&dir)
        .args(["mkdir", "-p"])
        .arg(&deep)
        .assert()
        .success();
    assert!(deep.is_dir());
    polypath(&dir)
        .args(["mkdir", "-p"])
        .arg(&deep)
        .assert()
        .success();
}

#[test]
fn test_schemes_include_builtins_and_clouds() {
    let dir = TempDir::new().unwrap();
    polypath(&dir)
        .arg("schemes")
        .assert()
        .success()
        .stdout(predicate::str::contains("memory"))
        .stdout(predicate::str::contains("S3Path / AsyncS3Path"))
        .stdout(predicate::str::contains("azure"));
}

#[test]
fn test_error_exit_codes() {
    let dir = TempDir::new().unwrap();
    polypath(&dir)
        .arg("cat")
        .arg(dir.path().join("missing.txt"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Not found"));

    polypath(&dir)
        .args(["cat", "ftp://host/file"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unsupported URI scheme"));
}

#[test]
fn test_config_init_and_show() {
    let dir = TempDir::new().unwrap();
    polypath(&dir)
        .args(["config", "--init"])
        .assert()
        .success();
    assert!(dir.path().join("config.toml").exists());

    polypath(&dir)
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("store_cache_size = 16"));
    polypath(&dir).args(["config", "--init"]).assert().failure();
}
