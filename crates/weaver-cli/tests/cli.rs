use assert_cmd::Command;
use predicates::prelude::*;

fn weaver() -> Command {
    Command::cargo_bin("weaver").unwrap()
}

const VALID_CONFIG: &str = r#"
site_code: AUNTH
fabric_type: it
controller:
  host: 10.0.0.1
  username: admin
  secret: s3cret
tenants:
  - name: common
vrfs:
  - name: prod_vrf
    tenant: common
bridge_domains:
  - name: web_bd
    tenant: common
    vrf: prod_vrf
"#;

fn write_config(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn validate_accepts_a_valid_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_config(&dir, "fabric.yaml", VALID_CONFIG);

    weaver()
        .args(["validate"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn validate_rejects_a_dangling_reference() {
    let dir = tempfile::TempDir::new().unwrap();
    let bad = VALID_CONFIG.replace("tenant: common", "tenant: ghost");
    let path = write_config(&dir, "fabric.yaml", &bad);

    weaver()
        .args(["validate"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("non-existent tenant"));
}

#[test]
fn validate_emits_json_result() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_config(&dir, "fabric.yaml", VALID_CONFIG);

    let output = weaver()
        .args(["--json", "validate"])
        .arg(&path)
        .assert()
        .success();
    let json: serde_json::Value =
        serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert!(json["errors"].as_array().unwrap().is_empty());
}

#[test]
fn validate_honors_allow_site_overrides() {
    let dir = tempfile::TempDir::new().unwrap();
    let eu = VALID_CONFIG.replace("site_code: AUNTH", "site_code: EUFRA");
    let path = write_config(&dir, "fabric.yaml", &eu);

    // Not in the built-in list.
    weaver()
        .args(["validate"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("site code"));

    // Allowed when the operator supplies the site, as the server would with
    // the same flag.
    weaver()
        .args(["validate", "--allow-site", "EUFRA"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn plan_lists_tasks_in_phase_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_config(&dir, "fabric.yaml", VALID_CONFIG);

    weaver()
        .args(["plan"])
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("create_tenant_common")
                .and(predicate::str::contains("create_vrf_prod_vrf"))
                .and(predicate::str::contains("create_bd_web_bd"))
                .and(predicate::str::contains("3 tasks")),
        );
}

#[test]
fn plan_refuses_an_invalid_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let bad = VALID_CONFIG.replace("site_code: AUNTH", "site_code: NOPE");
    let path = write_config(&dir, "fabric.yaml", &bad);

    weaver()
        .args(["plan"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn plan_reads_json_configs_too() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = serde_json::json!({
        "site_code": "AUSTH",
        "fabric_type": "ot",
        "controller": {"host": "10.0.0.1", "username": "admin", "secret": "s3cret"},
        "tenants": [{"name": "plant"}]
    });
    let path = write_config(&dir, "fabric.json", &config.to_string());

    let output = weaver()
        .args(["--json", "plan"])
        .arg(&path)
        .assert()
        .success();
    let tasks: serde_json::Value =
        serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(tasks.as_array().unwrap().len(), 1);
    assert_eq!(tasks[0]["name"], "create_tenant_plant");
}

#[test]
fn missing_file_fails_with_a_path_in_the_error() {
    weaver()
        .args(["validate", "/nonexistent/fabric.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/fabric.yaml"));
}
