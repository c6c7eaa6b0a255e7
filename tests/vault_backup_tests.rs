use predicates::prelude::*;
use std::fs;
use test_env::{focus_cmd, run_json, run_ok, setup_test_env};
use tempfile::TempDir;

const PASS: &str = "correct horse";

fn seed_tasks(temp_dir: &TempDir) {
    run_ok(temp_dir, &["add", "Ship release", "priority=UI", "due=+1d"]);
    run_ok(temp_dir, &["add", "Read book", "priority=NUNI"]);
    run_ok(temp_dir, &["remind", "add", "1", "+2h", "--email", "me@example.com"]);
}

fn export_recovery_code(temp_dir: &TempDir) -> String {
    run_ok(temp_dir, &["vault", "recovery", "--export", "--passphrase", PASS])
        .trim()
        .to_string()
}

#[test]
fn test_vault_init_and_status() {
    let (temp_dir, _guard) = setup_test_env();

    focus_cmd(&temp_dir)
        .args(["vault", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not initialized"));

    run_ok(&temp_dir, &["vault", "init", "--passphrase", PASS]);
    focus_cmd(&temp_dir)
        .args(["vault", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized (passphrase)"));

    focus_cmd(&temp_dir)
        .args(["vault", "init", "--passphrase", PASS])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_vault_init_prompts_must_match() {
    let (temp_dir, _guard) = setup_test_env();

    focus_cmd(&temp_dir)
        .args(["vault", "init"])
        .write_stdin("one phrase\nanother phrase\n")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Passphrases do not match"));
}

#[test]
fn test_vault_passphrase_from_environment() {
    let (temp_dir, _guard) = setup_test_env();

    focus_cmd(&temp_dir)
        .args(["vault", "init"])
        .env("FOCUS_VAULT_PASSPHRASE", PASS)
        .assert()
        .success();
    run_ok(&temp_dir, &["vault", "unlock", "--passphrase", PASS]);
}

#[test]
fn test_unlock_with_wrong_passphrase() {
    let (temp_dir, _guard) = setup_test_env();
    run_ok(&temp_dir, &["vault", "init", "--passphrase", PASS]);

    focus_cmd(&temp_dir)
        .args(["vault", "unlock", "--passphrase", "wrong horse"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("wrong passphrase"));
}

#[test]
fn test_backup_round_trip_with_passphrase() {
    let (temp_dir, _guard) = setup_test_env();
    seed_tasks(&temp_dir);
    run_ok(&temp_dir, &["vault", "init", "--passphrase", PASS]);

    let backup = temp_dir.path().join("focus.backup");
    focus_cmd(&temp_dir)
        .args(["backup", "export", backup.to_str().unwrap(), "--passphrase", PASS])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backed up 2 task(s) and 1 reminder(s)"));

    let text = fs::read_to_string(&backup).unwrap();
    assert!(text.contains("focus-matrix-backup"));
    assert!(!text.contains("Ship release"));

    run_ok(&temp_dir, &["clear", "-y"]);
    focus_cmd(&temp_dir)
        .args(["backup", "import", backup.to_str().unwrap(), "--passphrase", PASS, "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 2 tasks and 1 reminder."));

    let tasks = run_json(&temp_dir, &["list", "--json"]);
    let titles: Vec<&str> = tasks.as_array().unwrap().iter().map(|t| t["title"].as_str().unwrap()).collect();
    assert!(titles.contains(&"Ship release"));
    assert!(titles.contains(&"Read book"));
    let reminders = run_json(&temp_dir, &["remind", "list", "--json"]);
    assert_eq!(reminders[0]["task_title"], "Ship release");
    assert_eq!(reminders[0]["email"], "me@example.com");
}

#[test]
fn test_backup_restores_into_logged_in_account() {
    let (temp_dir, _guard) = setup_test_env();
    seed_tasks(&temp_dir);
    run_ok(&temp_dir, &["vault", "init", "--passphrase", PASS]);
    let backup = temp_dir.path().join("focus.backup");
    run_ok(&temp_dir, &["backup", "export", backup.to_str().unwrap(), "--passphrase", PASS]);

    run_ok(&temp_dir, &["register", "Ada", "ada@example.com", "--password", "secret123"]);
    run_ok(&temp_dir, &["login", "ada@example.com", "--password", "secret123"]);
    focus_cmd(&temp_dir)
        .args(["backup", "import", backup.to_str().unwrap(), "--passphrase", PASS, "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 2 tasks and 1 reminder."));
    assert_eq!(run_json(&temp_dir, &["list", "--json"]).as_array().unwrap().len(), 2);
    assert_eq!(run_json(&temp_dir, &["remind", "list", "--json"])[0]["task_title"], "Ship release");

    run_ok(&temp_dir, &["logout"]);
    assert_eq!(run_json(&temp_dir, &["list", "--json"]).as_array().unwrap().len(), 2);
}

#[test]
fn test_backup_import_wrong_passphrase() {
    let (temp_dir, _guard) = setup_test_env();
    seed_tasks(&temp_dir);
    run_ok(&temp_dir, &["vault", "init", "--passphrase", PASS]);
    let backup = temp_dir.path().join("focus.backup");
    run_ok(&temp_dir, &["backup", "export", backup.to_str().unwrap(), "--passphrase", PASS]);

    focus_cmd(&temp_dir)
        .args(["backup", "import", backup.to_str().unwrap(), "--passphrase", "nope", "-y"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("wrong passphrase"));
    assert_eq!(run_json(&temp_dir, &["list", "--json"]).as_array().unwrap().len(), 2);
}

#[test]
fn test_backup_export_needs_vault() {
    let (temp_dir, _guard) = setup_test_env();
    seed_tasks(&temp_dir);

    let backup = temp_dir.path().join("focus.backup");
    focus_cmd(&temp_dir)
        .args(["backup", "export", backup.to_str().unwrap(), "--passphrase", PASS])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn test_backup_import_missing_file() {
    let (temp_dir, _guard) = setup_test_env();

    focus_cmd(&temp_dir)
        .args(["backup", "import", "/no/such/backup", "--passphrase", PASS, "-y"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_recovery_code_restores_on_fresh_ledger() {
    let (temp_dir, _guard) = setup_test_env();
    seed_tasks(&temp_dir);
    run_ok(&temp_dir, &["vault", "init", "--passphrase", PASS]);
    let code = export_recovery_code(&temp_dir);
    assert!(!code.is_empty());

    let backup = temp_dir.path().join("focus.backup");
    run_ok(&temp_dir, &["backup", "export", backup.to_str().unwrap(), "--passphrase", PASS]);

    // A second ledger that only knows the recovery code
    let other = TempDir::new().unwrap();
    let other_db = other.path().join("other.db");
    fs::create_dir_all(other.path().join(".focus")).unwrap();
    fs::write(other.path().join(".focus").join("rc"), format!("data.location={}\n", other_db.display())).unwrap();

    focus_cmd(&other)
        .args(["vault", "recovery", "--import", &code])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vault set up from recovery code"));
    focus_cmd(&other)
        .args(["vault", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(recovery)"));
    focus_cmd(&other)
        .args(["backup", "import", backup.to_str().unwrap(), "--recovery-code", &code, "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 2 tasks"));

    let out = other.path().join("again.backup");
    run_ok(&other, &["backup", "export", out.to_str().unwrap(), "--recovery-code", &code]);
}

#[test]
fn test_rotated_key_keeps_old_backups_readable() {
    let (temp_dir, _guard) = setup_test_env();
    seed_tasks(&temp_dir);
    run_ok(&temp_dir, &["vault", "init", "--passphrase", PASS]);
    let old_code = export_recovery_code(&temp_dir);

    let before = temp_dir.path().join("before.backup");
    run_ok(&temp_dir, &["backup", "export", before.to_str().unwrap(), "--passphrase", PASS]);

    run_ok(&temp_dir, &["vault", "rotate", "--passphrase", PASS, "--new", "battery staple"]);
    focus_cmd(&temp_dir)
        .args(["vault", "unlock", "--passphrase", PASS])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wrong passphrase"));
    run_ok(&temp_dir, &["vault", "unlock", "--passphrase", "battery staple"]);

    focus_cmd(&temp_dir)
        .args(["vault", "recovery", "--import", &old_code])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid recovery code"));

    focus_cmd(&temp_dir)
        .args(["backup", "import", before.to_str().unwrap(), "--passphrase", PASS, "-y"])
        .assert()
        .success();
}

#[test]
fn test_wipe_removes_vault() {
    let (temp_dir, _guard) = setup_test_env();
    run_ok(&temp_dir, &["vault", "init", "--passphrase", PASS]);

    focus_cmd(&temp_dir)
        .args(["vault", "wipe"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled"));
    run_ok(&temp_dir, &["vault", "wipe", "-y"]);
    focus_cmd(&temp_dir)
        .args(["vault", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not initialized"));
}

#[test]
fn test_drive_requires_token() {
    let (temp_dir, _guard) = setup_test_env();

    focus_cmd(&temp_dir)
        .args(["drive", "push", "--folder", "abc", "--passphrase", PASS])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no Drive access token"));
    focus_cmd(&temp_dir)
        .args(["team", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no Drive access token"));
}
