use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const PASSWORD: &str = "secret1";

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_notevault"))
}

/// An isolated HOME with its own XDG config and data directories.
struct Env {
    root: TempDir,
}

impl Env {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir should succeed");
        for dir in ["home", "config", "data"] {
            std::fs::create_dir_all(root.path().join(dir)).expect("create dir");
        }
        Self { root }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(bin());
        cmd.args(args)
            .env("HOME", self.path().join("home"))
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("XDG_DATA_HOME", self.path().join("data"))
            .env("TERM", "dumb")
            .env("NO_COLOR", "1")
            .env_remove("NOTEVAULT_PATH")
            .env_remove("NOTEVAULT_CONFIG")
            .env_remove("NOTEVAULT_BACKUP_PASSWORD")
            .env_remove("NOTEVAULT_PIN")
            .env_remove("NOTEVAULT_NEW_PIN")
            .env_remove("NOTEVAULT_LOG")
            .stdin(Stdio::null());
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("run notevault")
    }

    fn run_with(&self, args: &[&str], vars: &[(&str, &str)]) -> Output {
        let mut cmd = self.command(args);
        for (key, value) in vars {
            cmd.env(key, value);
        }
        cmd.output().expect("run notevault")
    }

    fn init(&self) {
        let out = self.run(&["init", "--secrets", "keyfile", "--no-input"]);
        assert_success(&out);
    }
}

fn assert_success(out: &Output) {
    assert!(
        out.status.success(),
        "command failed: {}\nstdout: {}\nstderr: {}",
        out.status,
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
}

fn json(out: &Output) -> serde_json::Value {
    assert_success(out);
    serde_json::from_slice(&out.stdout).expect("stdout should be JSON")
}

#[test]
fn test_init_writes_config_and_vault() {
    let env = Env::new();
    env.init();

    let config = env.path().join("config").join("notevault").join("config.toml");
    let contents = std::fs::read_to_string(&config).expect("config should exist");
    assert!(contents.contains("backend = \"keyfile\""));

    let vault = env.path().join("data").join("notevault").join("vault");
    assert!(vault.join("vault.db.age").exists());

    let again = env.run(&["init", "--secrets", "keyfile", "--no-input"]);
    assert_eq!(again.status.code(), Some(4));
}

#[test]
fn test_missing_vault_is_not_found() {
    let env = Env::new();
    let out = env.run(&["note", "list"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&out.stderr).contains("notevault init"));
}

#[test]
fn test_notes_and_attachments_survive_backup_and_restore() {
    let env = Env::new();
    env.init();

    assert_success(&env.run(&["note", "add", "First", "--body", "hello there"]));
    let notes = json(&env.run(&["--json", "note", "list"]));
    let notes = notes.as_array().expect("array");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["title"], "First");
    let id = notes[0]["id"].as_i64().expect("id").to_string();

    let show = env.run(&["note", "show", &id]);
    assert_success(&show);
    assert!(String::from_utf8_lossy(&show.stdout).contains("hello there"));

    let source = env.path().join("hello.txt");
    std::fs::write(&source, b"0123456789").expect("write source");
    let added = json(&env.run(&["--json", "file", "add", source.to_str().unwrap()]));
    assert_eq!(added["name"], "hello.txt");
    assert_eq!(added["size"], 10);
    let file_id = added["file_id"].as_str().expect("file id").to_string();

    let copy = env.path().join("copy.txt");
    assert_success(&env.run(&["file", "get", &file_id, "-o", copy.to_str().unwrap()]));
    assert_eq!(std::fs::read(&copy).expect("read copy"), b"0123456789");

    let backup = env.path().join("vault.nvbak");
    let outcome = json(&env.run_with(
        &["--json", "backup", backup.to_str().unwrap()],
        &[("NOTEVAULT_BACKUP_PASSWORD", PASSWORD)],
    ));
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["notes"], 1);
    assert_eq!(outcome["files"], 1);
    assert!(backup.exists());

    let other = Env::new();
    other.init();
    let outcome = json(&other.run_with(
        &["--json", "restore", backup.to_str().unwrap()],
        &[("NOTEVAULT_BACKUP_PASSWORD", PASSWORD)],
    ));
    assert_eq!(outcome["notes"], 1);
    assert_eq!(outcome["files"], 1);
    assert_eq!(outcome["files_failed"], 0);

    let notes = json(&other.run(&["--json", "note", "list"]));
    assert_eq!(notes[0]["title"], "First");
    assert_eq!(notes[0]["content"], "hello there");

    let files = json(&other.run(&["--json", "file", "list"]));
    assert_eq!(files[0]["name"], "hello.txt");
    assert_success(&other.run(&["check"]));
}

#[test]
fn test_weak_backup_password_is_invalid_input() {
    let env = Env::new();
    env.init();

    let backup = env.path().join("weak.nvbak");
    let out = env.run_with(
        &["backup", backup.to_str().unwrap()],
        &[("NOTEVAULT_BACKUP_PASSWORD", "abc")],
    );
    assert_eq!(out.status.code(), Some(4));
    assert!(!backup.exists());
}

#[test]
fn test_missing_password_without_tty_is_invalid_input() {
    let env = Env::new();
    env.init();
    let backup = env.path().join("nopw.nvbak");
    let out = env.run(&["backup", backup.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(4));
}

#[test]
fn test_damaged_archive_is_rejected() {
    let env = Env::new();
    env.init();

    let archive = env.path().join("junk.nvbak");
    std::fs::write(&archive, b"definitely not ok").expect("write junk");
    let out = env.run_with(
        &["restore", archive.to_str().unwrap()],
        &[("NOTEVAULT_BACKUP_PASSWORD", PASSWORD)],
    );
    assert_eq!(out.status.code(), Some(7));

    let notes = json(&env.run(&["--json", "note", "list"]));
    assert_eq!(notes.as_array().expect("array").len(), 0);
}

#[test]
fn test_restore_from_missing_file_is_not_found() {
    let env = Env::new();
    env.init();
    let missing = env.path().join("nope.nvbak");
    let out = env.run_with(
        &["restore", missing.to_str().unwrap()],
        &[("NOTEVAULT_BACKUP_PASSWORD", PASSWORD)],
    );
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn test_pin_gates_attachment_commands() {
    let env = Env::new();
    env.init();

    assert_success(&env.run_with(&["pin", "set"], &[("NOTEVAULT_NEW_PIN", "2468")]));

    let wrong = env.run_with(&["file", "list"], &[("NOTEVAULT_PIN", "1357")]);
    assert_eq!(wrong.status.code(), Some(5));

    let right = env.run_with(&["--json", "file", "list"], &[("NOTEVAULT_PIN", "2468")]);
    assert_eq!(json(&right).as_array().expect("array").len(), 0);

    let verify = env.run_with(&["pin", "verify"], &[("NOTEVAULT_PIN", "0000")]);
    assert_eq!(verify.status.code(), Some(5));

    // Notes are not behind the PIN
    assert_success(&env.run(&["note", "list"]));

    assert_success(&env.run_with(&["pin", "clear"], &[("NOTEVAULT_PIN", "2468")]));
    assert_success(&env.run(&["file", "list"]));
}

#[test]
fn test_pin_unlock_is_reused_until_the_pin_changes() {
    let env = Env::new();
    env.init();
    assert_success(&env.run_with(&["pin", "set"], &[("NOTEVAULT_NEW_PIN", "2468")]));

    // No PIN available and no grant yet
    assert_eq!(env.run(&["file", "list"]).status.code(), Some(4));

    assert_success(&env.run_with(&["file", "list"], &[("NOTEVAULT_PIN", "2468")]));
    let grant = env.path().join("data").join("notevault").join("vault").join(".pin-grant");
    assert!(grant.exists());
    assert_success(&env.run(&["file", "list"]));

    // A forged grant file does not open the gate
    std::fs::write(&grant, "v1.0.99999999999999.00").unwrap();
    assert_eq!(env.run(&["file", "list"]).status.code(), Some(4));

    assert_success(&env.run_with(&["file", "list"], &[("NOTEVAULT_PIN", "2468")]));
    assert_success(&env.run_with(
        &["pin", "set"],
        &[("NOTEVAULT_PIN", "2468"), ("NOTEVAULT_NEW_PIN", "1357")],
    ));
    assert!(!grant.exists());
    assert_eq!(env.run(&["file", "list"]).status.code(), Some(4));
}

#[test]
fn test_zero_grant_ttl_asks_every_time() {
    let env = Env::new();
    env.init();
    let config = env.path().join("config").join("notevault").join("config.toml");
    let contents = std::fs::read_to_string(&config).unwrap();
    assert!(contents.contains("grant_ttl_seconds = 300"));
    std::fs::write(&config, contents.replace("grant_ttl_seconds = 300", "grant_ttl_seconds = 0"))
        .unwrap();

    assert_success(&env.run_with(&["pin", "set"], &[("NOTEVAULT_NEW_PIN", "2468")]));
    assert_success(&env.run_with(&["file", "list"], &[("NOTEVAULT_PIN", "2468")]));
    assert_eq!(env.run(&["file", "list"]).status.code(), Some(4));
}

#[test]
fn test_unknown_note_is_not_found() {
    let env = Env::new();
    env.init();
    assert_eq!(env.run(&["note", "show", "999"]).status.code(), Some(3));
    assert_eq!(env.run(&["note", "delete", "999"]).status.code(), Some(3));
}

#[test]
fn test_completions_generate() {
    let env = Env::new();
    let out = env.run(&["completions", "bash"]);
    assert_success(&out);
    assert!(String::from_utf8_lossy(&out.stdout).contains("notevault"));
}
