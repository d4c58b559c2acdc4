use std::fs;
use std::path::Path;

use assert_cmd::Command;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn seed_project(root: &Path) {
    write(
        root,
        "manifest.yaml",
        r#"
vars:
  apiHost: { descr: "target host", value: "https://api.test" }
  userName: { descr: "login user", value: "u" }
  userPass: { descr: "login password", value: "p" }
"#,
    );
    write(
        root,
        "v2/vhost.yaml",
        r#"
host_variable: apiHost
header:
  info: { title: "Example API", version: "1.0" }
"#,
    );
    write(
        root,
        "v2/login.yaml",
        r#"
method: POST
path: /oauth/token
auth: { user: "$userName", pass: "$userPass" }
responses:
  "200":
    descr: token issued
    body:
      access_token: { __: "(s)the bearer token", var_set: { name: token } }
"#,
    );
    write(
        root,
        "v2/whoami.yaml",
        r#"
method: GET
path: /whoami
headers: { Authorization: "Bearer $token" }
responses:
  "200":
    descr: current user
    body:
      user: "(s)the user name"
"#,
    );
}

#[test]
fn missing_arguments_exit_with_usage_code() {
    Command::cargo_bin("hdt")
        .unwrap()
        .arg("compile")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn compile_prints_the_dependency_tree() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());

    let assert = Command::cargo_bin("hdt")
        .unwrap()
        .args(["compile", "--indir"])
        .arg(dir.path())
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("0: <root>"), "stdout: {stdout}");
    assert!(stdout.contains("v2/login"), "stdout: {stdout}");
    // whoami depends on login's token, so it is nested one level deeper.
    assert!(stdout.contains("    0.0.0: v2/whoami"), "stdout: {stdout}");
}

#[test]
fn compile_reports_missing_producers() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());
    write(
        dir.path(),
        "v2/orphan.yaml",
        r#"
method: GET
path: /orphan/$neverProduced
responses:
  "200": { descr: "never works", ignore_body: true }
"#,
    );

    Command::cargo_bin("hdt")
        .unwrap()
        .args(["compile", "--indir"])
        .arg(dir.path())
        .assert()
        .failure()
        .code(3);
}

#[test]
fn gendoc_writes_one_swagger_document_per_vhost() {
    let dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    seed_project(dir.path());

    Command::cargo_bin("hdt")
        .unwrap()
        .args(["gendoc", "--indir"])
        .arg(dir.path())
        .arg("--outdir")
        .arg(out.path())
        .assert()
        .success();

    let doc: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(out.path().join("swagger-v2.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(doc["swagger"], "2.0");
    assert_eq!(doc["info"]["title"], "Example API");
    let op = &doc["paths"]["/oauth/token"]["post"];
    assert_eq!(op["responses"]["200"]["description"], "token issued");
    assert_eq!(
        op["responses"]["200"]["schema"]["properties"]["access_token"]["type"],
        "string"
    );
}

#[test]
fn private_descriptors_are_planned_but_not_documented() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());
    write(
        dir.path(),
        "v2/internal.yaml",
        r#"
private: true
method: GET
path: /internal
responses:
  "200": { descr: "internal", ignore_body: true }
"#,
    );

    Command::cargo_bin("hdt")
        .unwrap()
        .args(["gendoc", "--indir"])
        .arg(dir.path())
        .assert()
        .success();
    let doc: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("swagger-v2.json")).unwrap(),
    )
    .unwrap();
    assert!(doc["paths"].get("/internal").is_none());

    let assert = Command::cargo_bin("hdt")
        .unwrap()
        .args(["compile", "--indir"])
        .arg(dir.path())
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("v2/internal"), "stdout: {stdout}");
}
