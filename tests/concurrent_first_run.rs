//! Many workers starting at once against an empty runtime directory must
//! all end up with the one secret that landed on disk.

use scionlab_secret::{obtain_secret, Provisioned, SecretProvisioner};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

const WORKERS: usize = 16;

fn secret_path(dir: &TempDir) -> PathBuf {
    dir.path().join("SECRET.key")
}

#[test]
fn test_threads_converge_on_one_secret() {
    for _round in 0..10 {
        let dir = TempDir::new().unwrap();
        let path = secret_path(&dir);
        let barrier = Arc::new(Barrier::new(WORKERS));

        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    SecretProvisioner::new(&path).obtain().unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let values: HashSet<String> = results
            .iter()
            .map(|(secret, _)| secret.expose().to_string())
            .collect();
        assert_eq!(values.len(), 1, "workers disagree on the secret");

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(values.contains(&on_disk));

        let generated = results
            .iter()
            .filter(|(_, how)| *how == Provisioned::Generated)
            .count();
        assert_eq!(generated, 1, "exactly one worker persists");

        // only the secret itself, no temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

#[test]
fn test_restart_returns_same_secret() {
    let dir = TempDir::new().unwrap();
    let path = secret_path(&dir);
    let first = obtain_secret(&path).unwrap();
    for _ in 0..5 {
        assert_eq!(obtain_secret(&path).unwrap(), first);
    }
}

#[test]
fn test_processes_converge_on_one_secret() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("run")).unwrap();

    let children: Vec<_> = (0..8)
        .map(|_| {
            Command::new(env!("CARGO_BIN_EXE_scionlab-secret"))
                .arg("--base-dir")
                .arg(dir.path())
                .arg("--non-interactive")
                .args(["provision", "--print", "--confirm"])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .unwrap()
        })
        .collect();

    let mut values = HashSet::new();
    for child in children {
        let output = child.wait_with_output().unwrap();
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        values.insert(String::from_utf8(output.stdout).unwrap());
    }
    assert_eq!(values.len(), 1);

    let on_disk = fs::read_to_string(dir.path().join("run").join("SECRET.key")).unwrap();
    assert!(values.contains(&on_disk));
    assert!(on_disk.len() >= 50);
}

#[test]
fn test_missing_run_dir_fails_loudly() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_scionlab-secret"))
        .arg("--base-dir")
        .arg(dir.path())
        .arg("provision")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SECRET.key"), "stderr: {}", stderr);
}
