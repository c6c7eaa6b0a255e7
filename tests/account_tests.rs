use predicates::prelude::*;
use test_env::{focus_cmd, run_json, run_ok, setup_test_env};
use tempfile::TempDir;

fn register(temp_dir: &TempDir, name: &str, email: &str) {
    run_ok(temp_dir, &["register", name, email, "--password", "secret123"]);
}

fn login(temp_dir: &TempDir, email: &str) {
    run_ok(temp_dir, &["login", email, "--password", "secret123"]);
}

#[test]
fn test_first_user_is_admin() {
    let (temp_dir, _guard) = setup_test_env();

    focus_cmd(&temp_dir)
        .args(["register", "Ada", "ada@example.com", "--password", "secret123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("first account"));
    register(&temp_dir, "Ben", "ben@example.com");
    login(&temp_dir, "ada@example.com");

    let users = run_json(&temp_dir, &["admin", "users", "--json"]);
    assert_eq!(users["stats"]["total"], 2);
    assert_eq!(users["stats"]["admins"], 1);
    let list = users["users"].as_array().unwrap();
    assert_eq!(list[0]["email"], "ada@example.com");
    assert_eq!(list[0]["role"], "admin");
    assert_eq!(list[1]["role"], "user");
    assert!(list[0].get("password_hash").is_none());
}

#[test]
fn test_register_rejects_bad_input() {
    let (temp_dir, _guard) = setup_test_env();

    focus_cmd(&temp_dir)
        .args(["register", "Ada", "not-an-email", "--password", "secret123"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid email address"));
    focus_cmd(&temp_dir)
        .args(["register", "Ada", "ada@example.com", "--password", "123"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("at least 6 characters"));

    register(&temp_dir, "Ada", "ada@example.com");
    focus_cmd(&temp_dir)
        .args(["register", "Other", "ADA@example.com", "--password", "secret123"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_register_prompts_twice() {
    let (temp_dir, _guard) = setup_test_env();

    focus_cmd(&temp_dir)
        .args(["register", "Ada", "ada@example.com"])
        .write_stdin("secret123\nsecret124\n")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Passwords do not match"));
    focus_cmd(&temp_dir)
        .args(["register", "Ada", "ada@example.com"])
        .write_stdin("secret123\nsecret123\n")
        .assert()
        .success();
}

#[test]
fn test_login_logout_whoami() {
    let (temp_dir, _guard) = setup_test_env();
    register(&temp_dir, "Ada", "ada@example.com");

    focus_cmd(&temp_dir)
        .args(["login", "ada@example.com", "--password", "wrong-pass"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid email or password"));

    focus_cmd(&temp_dir)
        .args(["whoami"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"));

    login(&temp_dir, "ada@example.com");
    let me = run_json(&temp_dir, &["whoami", "--json"]);
    assert_eq!(me["name"], "Ada");
    assert!(me["last_login_ts"].as_i64().is_some());

    focus_cmd(&temp_dir)
        .args(["logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out ada@example.com"));
    assert!(run_json(&temp_dir, &["whoami", "--json"]).is_null());
}

#[test]
fn test_tasks_are_scoped_per_user() {
    let (temp_dir, _guard) = setup_test_env();
    register(&temp_dir, "Ada", "ada@example.com");
    register(&temp_dir, "Ben", "ben@example.com");

    run_ok(&temp_dir, &["add", "Anonymous task"]);
    login(&temp_dir, "ada@example.com");
    run_ok(&temp_dir, &["add", "Ada task"]);
    let ada = run_json(&temp_dir, &["list", "--json"]);
    assert_eq!(ada.as_array().unwrap().len(), 1);
    assert_eq!(ada[0]["title"], "Ada task");

    login(&temp_dir, "ben@example.com");
    assert!(run_json(&temp_dir, &["list", "--json"]).as_array().unwrap().is_empty());
    focus_cmd(&temp_dir)
        .args(["show", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Task 2 not found"));

    run_ok(&temp_dir, &["logout"]);
    let anon = run_json(&temp_dir, &["list", "--json"]);
    assert_eq!(anon.as_array().unwrap().len(), 1);
    assert_eq!(anon[0]["title"], "Anonymous task");
}

#[test]
fn test_profile_and_password_change() {
    let (temp_dir, _guard) = setup_test_env();
    register(&temp_dir, "Ada", "ada@example.com");

    focus_cmd(&temp_dir)
        .args(["profile", "--name", "Ada L"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));

    login(&temp_dir, "ada@example.com");
    run_ok(&temp_dir, &["profile", "--name", "Ada L", "--email", "ada.l@example.com"]);
    let me = run_json(&temp_dir, &["whoami", "--json"]);
    assert_eq!(me["name"], "Ada L");
    assert_eq!(me["email"], "ada.l@example.com");

    focus_cmd(&temp_dir)
        .args(["passwd", "--current", "nope", "--new", "newsecret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Current password is incorrect"));
    run_ok(&temp_dir, &["passwd", "--current", "secret123", "--new", "newsecret"]);
    run_ok(&temp_dir, &["login", "ada.l@example.com", "--password", "newsecret"]);
}

#[test]
fn test_admin_requires_admin_role() {
    let (temp_dir, _guard) = setup_test_env();
    register(&temp_dir, "Ada", "ada@example.com");
    register(&temp_dir, "Ben", "ben@example.com");
    login(&temp_dir, "ben@example.com");

    focus_cmd(&temp_dir)
        .args(["admin", "users"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("requires an administrator"));
}

#[test]
fn test_admin_toggle_blocks_login() {
    let (temp_dir, _guard) = setup_test_env();
    register(&temp_dir, "Ada", "ada@example.com");
    register(&temp_dir, "Ben", "ben@example.com");
    login(&temp_dir, "ada@example.com");

    focus_cmd(&temp_dir)
        .args(["admin", "toggle", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now inactive"));
    focus_cmd(&temp_dir)
        .args(["admin", "toggle", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot deactivate your own account"));

    focus_cmd(&temp_dir)
        .args(["login", "ben@example.com", "--password", "secret123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("inactive"));
}

#[test]
fn test_admin_modify_and_delete() {
    let (temp_dir, _guard) = setup_test_env();
    register(&temp_dir, "Ada", "ada@example.com");
    register(&temp_dir, "Ben", "ben@example.com");

    login(&temp_dir, "ben@example.com");
    run_ok(&temp_dir, &["add", "Ben's task"]);

    login(&temp_dir, "ada@example.com");
    run_ok(&temp_dir, &["admin", "modify", "2", "--role", "admin"]);
    let filtered = run_json(&temp_dir, &["admin", "users", "--role", "admin", "--json"]);
    assert_eq!(filtered["users"].as_array().unwrap().len(), 2);

    focus_cmd(&temp_dir)
        .args(["admin", "modify", "1", "--role", "user"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot demote your own account"));

    focus_cmd(&temp_dir)
        .args(["admin", "delete", "2", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted user 2"));
    let users = run_json(&temp_dir, &["admin", "users", "--json"]);
    assert_eq!(users["stats"]["total"], 1);
}
