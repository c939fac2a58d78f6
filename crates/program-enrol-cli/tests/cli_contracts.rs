#![allow(clippy::single_match_else, clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rusqlite::Connection;
use serde_json::{json, Value};
use ulid::Ulid;

fn progenrol_binary_path() -> PathBuf {
    match std::env::var("CARGO_BIN_EXE_progenrol") {
        Ok(value) => PathBuf::from(value),
        Err(_) => {
            let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../target/debug/progenrol");
            if !path.exists() {
                let status = Command::new("cargo")
                    .args(["build", "-p", "program-enrol-cli", "--bin", "progenrol"])
                    .status();
                match status {
                    Ok(value) if value.success() => {}
                    Ok(value) => panic!("failed to build progenrol binary (status={value})"),
                    Err(err) => panic!("failed to invoke cargo build: {err}"),
                }
            }
            path
        }
    }
}

fn temp_path(label: &str, extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!("progenrol-{label}-{}.{extension}", Ulid::new()))
}

fn run_with(db_path: &Path, global: &[&str], args: &[&str]) -> Output {
    let mut command = Command::new(progenrol_binary_path());
    command.arg("--db").arg(db_path);
    command.args(global);
    command.args(args);
    command.env("RUST_LOG", "off");

    match command.output() {
        Ok(output) => output,
        Err(err) => panic!("failed to run progenrol command {:?}: {err}", args),
    }
}

fn run_ok(db_path: &Path, global: &[&str], args: &[&str]) -> Value {
    let output = run_with(db_path, global, args);
    assert!(
        output.status.success(),
        "command {:?} failed: stderr={}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    stdout_json(&output)
}

fn stdout_json(output: &Output) -> Value {
    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(value) => value,
        Err(err) => panic!(
            "failed to parse stdout as JSON: {err}\nstdout={}\nstderr={}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ),
    }
}

fn seed_fixture(db_path: &Path) {
    for args in [
        &["course", "add", "--id", "10", "--shortname", "program"][..],
        &["course", "add", "--id", "20", "--shortname", "child"][..],
        &["course", "add", "--id", "30", "--shortname", "child-2"][..],
        &[
            "user",
            "add",
            "--id",
            "101",
            "--username",
            "alice",
            "--email",
            "alice@example.org",
        ][..],
        &[
            "user",
            "add",
            "--id",
            "102",
            "--username",
            "bob",
            "--email",
            "bob@example.org",
        ][..],
        &[
            "course-link",
            "set",
            "--course",
            "20",
            "--link",
            "920",
            "--platform",
            "academie",
        ][..],
    ] {
        run_ok(db_path, &[], args);
    }
}

fn role_rows(db_path: &Path, user: i64, course: i64) -> Vec<(String, String, i64)> {
    let conn = match Connection::open(db_path) {
        Ok(value) => value,
        Err(err) => panic!("failed to open db for inspection: {err}"),
    };
    let mut stmt = match conn.prepare(
        "SELECT r.shortname, ra.component, ra.itemid
         FROM role_assignments ra
         JOIN role r ON r.id = ra.roleid
         JOIN context c ON c.id = ra.contextid
         WHERE ra.userid = ?1 AND c.contextlevel = 50 AND c.instanceid = ?2
         ORDER BY ra.id ASC",
    ) {
        Ok(value) => value,
        Err(err) => panic!("failed to prepare inspection query: {err}"),
    };
    let rows = match stmt.query_map([user, course], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    }) {
        Ok(value) => value,
        Err(err) => panic!("failed to run inspection query: {err}"),
    };
    rows.map(|row| match row {
        Ok(value) => value,
        Err(err) => panic!("failed to read inspection row: {err}"),
    })
    .collect()
}

fn instance_id(value: &Value) -> i64 {
    match value["id"].as_i64() {
        Some(id) => id,
        None => panic!("missing instance id in {value}"),
    }
}

#[test]
fn help_contract_lists_expected_subcommands() {
    let output = match Command::new(progenrol_binary_path()).arg("--help").output() {
        Ok(value) => value,
        Err(err) => panic!("failed to run help command: {err}"),
    };

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for required in [
        "course",
        "user",
        "course-link",
        "method",
        "enrol",
        "unenrol",
        "instance",
        "form",
        "event",
        "host-events",
    ] {
        assert!(
            stdout.contains(required),
            "expected help output to contain subcommand {required}; output={stdout}"
        );
    }
}

#[test]
fn bulk_copy_then_event_propagation_end_to_end() {
    let db_path = temp_path("e2e", "sqlite3");
    seed_fixture(&db_path);

    run_ok(
        &db_path,
        &[],
        &["enrol", "manual", "--course", "10", "--user", "101", "--role", "student"],
    );
    run_ok(
        &db_path,
        &[],
        &[
            "enrol",
            "manual",
            "--course",
            "10",
            "--user",
            "102",
            "--role",
            "editingteacher",
        ],
    );

    let created = run_ok(
        &db_path,
        &[],
        &["instance", "add", "--course", "20", "--parent", "10"],
    );
    assert_eq!(created["name"], json!("Programme (10)"));
    let id = instance_id(&created);

    let shown = run_ok(&db_path, &[], &["instance", "show", "--id", &id.to_string()]);
    assert_eq!(shown["users"], json!([101, 102]));
    assert_eq!(
        role_rows(&db_path, 101, 20),
        vec![("student".to_string(), "enrol_program".to_string(), id)]
    );
    assert_eq!(
        role_rows(&db_path, 102, 20),
        vec![("teacher".to_string(), "enrol_program".to_string(), id)]
    );

    let second = run_ok(
        &db_path,
        &[],
        &["instance", "add", "--course", "30", "--parent", "10"],
    );
    let removed = run_ok(
        &db_path,
        &[],
        &["unenrol", "manual", "--course", "10", "--user", "101"],
    );
    assert_eq!(removed["propagation"]["status"], json!("applied"));
    assert_eq!(
        removed["propagation"]["instances"],
        json!([id, instance_id(&second)])
    );
    assert!(role_rows(&db_path, 101, 20).is_empty());
    assert!(role_rows(&db_path, 101, 30).is_empty());

    let listed = run_ok(&db_path, &[], &["instance", "list", "--course", "20"]);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let _ = std::fs::remove_file(&db_path);
}

#[test]
fn empty_parent_form_is_rejected_without_writing() {
    let db_path = temp_path("form", "sqlite3");
    seed_fixture(&db_path);

    let outcome = run_ok(
        &db_path,
        &[],
        &["form", "submit", "--course", "20", "--customint1", ""],
    );
    assert_eq!(outcome["outcome"], json!("invalid"));
    assert_eq!(outcome["errors"]["customint1"], json!("required"));

    let invalid = run_ok(
        &db_path,
        &[],
        &["form", "submit", "--course", "20", "--customint1", "abc"],
    );
    assert_eq!(invalid["errors"]["customint1"], json!("invalidcourseid"));

    let listed = run_ok(&db_path, &[], &["instance", "list", "--course", "20"]);
    assert_eq!(listed, json!([]));

    let created = run_ok(
        &db_path,
        &[],
        &["form", "submit", "--course", "20", "--customint1", "10"],
    );
    assert_eq!(created["outcome"], json!("created"));
    assert_eq!(created["instance"]["course_id"], json!(20));

    let definition = run_ok(&db_path, &[], &["form", "show"]);
    assert_eq!(definition["use_standard_editing_ui"], json!(true));
    assert_eq!(definition["allow_unenrol_user"], json!(true));
    assert_eq!(definition["status_options"][1], json!(["disabled", "No"]));
    assert_eq!(definition["fields"][1]["name"], json!("customint1"));
    assert_eq!(definition["fields"][1]["required"], json!(true));

    let duplicate = run_ok(
        &db_path,
        &[],
        &["form", "submit", "--course", "20", "--customint1", "10"],
    );
    assert_eq!(duplicate["outcome"], json!("invalid"));
    assert_eq!(duplicate["errors"]["customint1"], json!("instanceexists"));
    let listed = run_ok(&db_path, &[], &["instance", "list", "--course", "20"]);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let _ = std::fs::remove_file(&db_path);
}

#[test]
fn raw_event_dispatch_decodes_and_propagates() {
    let db_path = temp_path("event", "sqlite3");
    seed_fixture(&db_path);
    run_ok(
        &db_path,
        &[],
        &["instance", "add", "--course", "20", "--parent", "10"],
    );

    let added = run_ok(
        &db_path,
        &[],
        &[
            "event",
            "dispatch",
            "--json",
            r#"{"eventname":"\\core\\event\\user_enrolment_created","relateduserid":101,"courseid":10}"#,
        ],
    );
    assert_eq!(added["event"]["kind"], json!("member_added"));
    assert_eq!(added["propagation"]["status"], json!("applied"));

    let assigned = run_ok(
        &db_path,
        &[],
        &[
            "event",
            "dispatch",
            "--json",
            r#"{"eventname":"\\core\\event\\role_assigned","relateduserid":101,"courseid":10,"objectid":3}"#,
        ],
    );
    assert_eq!(assigned["propagation"]["role"], json!(4));
    assert_eq!(
        role_rows(&db_path, 101, 20),
        vec![(
            "teacher".to_string(),
            "enrol_program".to_string(),
            match added["propagation"]["instances"][0].as_i64() {
                Some(value) => value,
                None => panic!("missing instance id"),
            }
        )]
    );

    let ignored = run_ok(
        &db_path,
        &[],
        &[
            "event",
            "dispatch",
            "--json",
            r#"{"eventname":"\\core\\event\\course_viewed","courseid":10}"#,
        ],
    );
    assert_eq!(ignored["status"], json!("ignored"));

    let missing_user = run_ok(
        &db_path,
        &[],
        &[
            "event",
            "dispatch",
            "--json",
            r#"{"eventname":"\\core\\event\\user_enrolment_deleted","courseid":10}"#,
        ],
    );
    assert_eq!(missing_user["event"]["user"], Value::Null);
    assert_eq!(missing_user["propagation"]["status"], json!("no_instances"));

    let missing_role = run_with(
        &db_path,
        &[],
        &[
            "event",
            "dispatch",
            "--json",
            r#"{"eventname":"\\core\\event\\role_assigned","relateduserid":101,"courseid":10}"#,
        ],
    );
    assert!(!missing_role.status.success());
    let stderr = String::from_utf8_lossy(&missing_role.stderr);
    assert!(stderr.contains("objectid"), "stderr={stderr}");

    let _ = std::fs::remove_file(&db_path);
}

#[test]
fn disabled_method_leaves_children_untouched() {
    let db_path = temp_path("disabled", "sqlite3");
    seed_fixture(&db_path);
    let created = run_ok(
        &db_path,
        &[],
        &["instance", "add", "--course", "20", "--parent", "10"],
    );
    run_ok(
        &db_path,
        &[],
        &["method", "set", "--name", "program", "--state", "disabled"],
    );

    let enrolled = run_ok(
        &db_path,
        &[],
        &["enrol", "manual", "--course", "10", "--user", "101", "--role", "student"],
    );
    assert_eq!(
        enrolled["propagation"],
        json!([{"status": "method_disabled"}, {"status": "method_disabled"}])
    );

    let shown = run_ok(
        &db_path,
        &[],
        &["instance", "show", "--id", &instance_id(&created).to_string()],
    );
    assert_eq!(shown["users"], json!([]));

    let _ = std::fs::remove_file(&db_path);
}

#[test]
fn mirrored_delete_writes_one_host_event() {
    let db_path = temp_path("mirror", "sqlite3");
    let config_path = temp_path("mirror-config", "json");
    if let Err(err) = std::fs::write(&config_path, r#"{"host_integration":{"mode":"enabled"}}"#) {
        panic!("failed to write settings fixture: {err}");
    }
    let config = match config_path.to_str() {
        Some(value) => value.to_string(),
        None => panic!("temp config path must be valid UTF-8"),
    };
    let mirrored = ["--config", config.as_str()];

    seed_fixture(&db_path);
    run_ok(
        &db_path,
        &mirrored,
        &["enrol", "manual", "--course", "10", "--user", "102", "--role", "editingteacher"],
    );
    let created = run_ok(
        &db_path,
        &mirrored,
        &["instance", "add", "--course", "20", "--parent", "10"],
    );

    let added = run_ok(
        &db_path,
        &[],
        &["host-events", "list", "--event-type", "add_program_member"],
    );
    assert_eq!(added[0]["courseid"], json!(10));
    assert_eq!(added[0]["courseidlink"], json!(920));
    assert_eq!(added[0]["platform"], json!("academie"));
    assert_eq!(added[0]["email"], json!("bob@example.org"));
    assert_eq!(added[0]["rolename"], json!("teacher"));

    let report = run_ok(
        &db_path,
        &mirrored,
        &["instance", "delete", "--id", &instance_id(&created).to_string()],
    );
    assert_eq!(report["unenrolled"], json!([102]));
    assert_eq!(report["host_event"]["event_type"], json!("delete_program"));

    let deletions = run_ok(
        &db_path,
        &[],
        &["host-events", "list", "--event-type", "delete_program"],
    );
    assert_eq!(deletions.as_array().map(Vec::len), Some(1));
    assert!(deletions[0].get("email").is_none());

    let _ = std::fs::remove_file(&db_path);
    let _ = std::fs::remove_file(&config_path);
}

#[test]
fn acting_user_needs_config_capability() {
    let db_path = temp_path("caps", "sqlite3");
    seed_fixture(&db_path);

    let denied = run_with(
        &db_path,
        &["--as-user", "101"],
        &["instance", "add", "--course", "20", "--parent", "10"],
    );
    assert!(!denied.status.success());
    let stderr = String::from_utf8_lossy(&denied.stderr);
    assert!(stderr.contains("permission denied"), "stderr={stderr}");

    run_ok(
        &db_path,
        &[],
        &["enrol", "manual", "--course", "20", "--user", "101", "--role", "editingteacher"],
    );
    let allowed = run_ok(
        &db_path,
        &["--as-user", "101"],
        &["instance", "add", "--course", "20", "--parent", "10"],
    );
    assert_eq!(allowed["course_id"], json!(20));

    let _ = std::fs::remove_file(&db_path);
}
