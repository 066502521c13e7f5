use assert_cmd::Command;
use camino::Utf8PathBuf;
use cucumber::{World, given, then, when};
use fs_err as fs;
use statedump_bdd::{role_xml, zip_archive};
use tempfile::TempDir;

const ARCHIVE: &str = "dump.zip";
const PLAN: &str = "statedump-plan.json";
const RESULT: &str = "result.json";
const DECISIONS: &str = "decisions.json";

#[derive(Debug, Default, World)]
pub struct StatedumpWorld {
    temp: Option<TempDir>,
    root: Option<Utf8PathBuf>,
}

fn root(world: &StatedumpWorld) -> &Utf8PathBuf {
    world.root.as_ref().expect("root set")
}

fn statedump(world: &StatedumpWorld) -> Command {
    let mut cmd = Command::cargo_bin("statedump").expect("statedump binary");
    cmd.current_dir(root(world).as_str())
        .env_remove("RUST_LOG")
        .arg("--principal")
        .arg("admin");
    cmd
}

fn read_json(world: &StatedumpWorld, name: &str) -> serde_json::Value {
    let text = fs::read_to_string(root(world).join(name)).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn stored_role(world: &StatedumpWorld) -> serde_json::Value {
    let path = root(world)
        .join("statedump-store")
        .join("objects")
        .join("role")
        .join("role.json");
    serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap()
}

fn write_archive(world: &StatedumpWorld, description: &str) {
    let role = role_xml(description);
    let bytes = zip_archive(&[
        ("statedump/role.xml", role.as_str()),
        ("statedump/replacements.properties", "OPERATOR_CN=Operator\n"),
        ("statedump/logo.png", "\u{89}PNG"),
    ])
    .unwrap();
    fs::write(root(world).join(ARCHIVE), bytes).unwrap();
}

fn commit(world: &StatedumpWorld, decisions: serde_json::Value) -> assert_cmd::assert::Assert {
    fs::write(
        root(world).join(DECISIONS),
        serde_json::to_string_pretty(&decisions).unwrap(),
    )
    .unwrap();
    statedump(world)
        .args(["commit", "--archive", ARCHIVE, "--decisions", DECISIONS])
        .args(["--out", RESULT])
        .assert()
}

// ============================================================================
// Given
// ============================================================================

#[given("a statedump archive with a role, replacements and a logo")]
async fn archive_with_role(world: &mut StatedumpWorld) {
    let td = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
    world.temp = Some(td);
    world.root = Some(root);
    write_archive(world, "first revision");
}

#[given("the archive has already been imported")]
async fn already_imported(world: &mut StatedumpWorld) {
    statedump(world)
        .args(["import", "--archive", ARCHIVE])
        .assert()
        .success();
}

#[given(expr = "the archive now carries the role description {string}")]
async fn archive_revised(world: &mut StatedumpWorld, description: String) {
    write_archive(world, &description);
}

// ============================================================================
// When
// ============================================================================

#[when("I run statedump plan")]
async fn run_plan(world: &mut StatedumpWorld) {
    statedump(world)
        .args(["plan", "--archive", ARCHIVE])
        .assert()
        .success();
}

#[when("I run statedump commit with no decisions")]
async fn run_commit_empty(world: &mut StatedumpWorld) {
    commit(world, serde_json::json!({})).success();
}

#[when("I run statedump commit with no decisions expecting a decision error")]
async fn run_commit_refused(world: &mut StatedumpWorld) {
    commit(world, serde_json::json!({})).code(2);
}

#[when(expr = "I run statedump commit resolving {string} as {string}")]
async fn run_commit_resolved(world: &mut StatedumpWorld, key: String, resolution: String) {
    commit(
        world,
        serde_json::json!({ "resolutions": { key: resolution } }),
    )
    .success();
}

#[when("I run statedump lockdown")]
async fn run_lockdown(world: &mut StatedumpWorld) {
    statedump(world).arg("lockdown").assert().success();
}

#[when("I run statedump import with lockdown")]
async fn run_import_lockdown(world: &mut StatedumpWorld) {
    statedump(world)
        .args(["import", "--archive", ARCHIVE, "--lockdown"])
        .assert()
        .success();
}

// ============================================================================
// Then
// ============================================================================

#[then(expr = "the plan lists {int} objects and {int} conflicts")]
async fn plan_counts(world: &mut StatedumpWorld, objects: u64, conflicts: u64) {
    let plan = read_json(world, PLAN);
    assert_eq!(plan["schema"], "statedump.plan.v1");
    assert_eq!(plan["summary"]["objects_total"], objects);
    assert_eq!(plan["summary"]["conflicts"], conflicts);
}

#[then(expr = "the plan has a conflict on {string}")]
async fn plan_conflict(world: &mut StatedumpWorld, key: String) {
    let plan = read_json(world, PLAN);
    let conflicts = plan["conflicts"].as_array().expect("conflicts array");
    assert!(
        conflicts.iter().any(|c| c["key"] == key.as_str()),
        "expected a conflict on {key}, got {conflicts:?}"
    );
}

#[then(expr = "the plan notices include {string}")]
async fn plan_notice(world: &mut StatedumpWorld, notice: String) {
    let plan = read_json(world, PLAN);
    let notices = plan["notices"].as_array().expect("notices array");
    assert!(
        notices.iter().any(|n| n == notice.as_str()),
        "missing notice {notice:?} in {notices:?}"
    );
}

#[then(expr = "the result notices include {string}")]
async fn result_notice(world: &mut StatedumpWorld, notice: String) {
    let result = read_json(world, RESULT);
    let notices = result["notices"].as_array().expect("notices array");
    assert!(
        notices.iter().any(|n| n == notice.as_str()),
        "missing notice {notice:?} in {notices:?}"
    );
}

#[then(expr = "the result reports {int} applied, {int} merged and {int} skipped")]
async fn result_counts(world: &mut StatedumpWorld, applied: u64, merged: u64, skipped: u64) {
    let result = read_json(world, RESULT);
    assert_eq!(result["schema"], "statedump.result.v1");
    assert_eq!(result["summary"]["applied"], applied);
    assert_eq!(result["summary"]["merged"], merged);
    assert_eq!(result["summary"]["skipped"], skipped);
}

#[then("the store is empty")]
async fn store_empty(world: &mut StatedumpWorld) {
    assert!(!root(world).join("statedump-store").join("objects").exists());
}

#[then(expr = "the stored role has member {string}")]
async fn stored_member(world: &mut StatedumpWorld, member: String) {
    assert_eq!(stored_role(world)["fields"]["member"], member.as_str());
}

#[then(expr = "the stored role has description {string}")]
async fn stored_description(world: &mut StatedumpWorld, description: String) {
    assert_eq!(stored_role(world)["fields"]["description"], description.as_str());
}

#[then(expr = "statedump status reports {string}")]
async fn status_reports(world: &mut StatedumpWorld, expected: String) {
    let out = statedump(world).arg("status").assert().success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert_eq!(stdout.trim(), expected);
}

#[then("statedump plan is refused as locked down")]
async fn plan_refused(world: &mut StatedumpWorld) {
    statedump(world)
        .args(["plan", "--archive", ARCHIVE])
        .assert()
        .code(2);
    assert!(!root(world).join(PLAN).exists());
}

#[tokio::main]
async fn main() {
    let features_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("features");
    StatedumpWorld::cucumber().run(features_path).await;
}
