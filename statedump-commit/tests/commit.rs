//! Decision checks and write behaviour of the executor.

use camino::Utf8PathBuf;
use fs_err as fs;
use pretty_assertions::assert_eq;
use statedump_commit::{CommitError, CommitOptions, commit};
use statedump_domain::{ConfigurationStore, MemoryStore, PlanContext, StoreView};
use statedump_types::{Decisions, ObjectKey, ObjectStatus, Resolution, Secret, StoredObject};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn staged(files: &[(&str, &str)]) -> (TempDir, Utf8PathBuf) {
    let td = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
    for (name, body) in files {
        fs::write(root.join(name), body).unwrap();
    }
    (td, root)
}

fn key(s: &str) -> ObjectKey {
    s.parse().unwrap()
}

fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

fn stored(k: &str, pairs: &[(&str, &str)]) -> StoredObject {
    StoredObject::new(key(k), fields(pairs))
}

fn run(
    dir: &Utf8PathBuf,
    decisions: &Decisions,
    store: &mut dyn ConfigurationStore,
) -> Result<statedump_commit::CommitOutcome, CommitError> {
    commit(
        dir,
        &PlanContext::default(),
        decisions,
        &CommitOptions::default(),
        store,
    )
}

/// Store that accepts `limit` saves and fails the next one.
struct FlakyStore {
    inner: MemoryStore,
    limit: usize,
}

impl StoreView for FlakyStore {
    fn get(&self, key: &ObjectKey) -> anyhow::Result<Option<StoredObject>> {
        self.inner.get(key)
    }
}

impl ConfigurationStore for FlakyStore {
    fn save(&mut self, object: &StoredObject) -> anyhow::Result<()> {
        if self.inner.len() >= self.limit {
            anyhow::bail!("store unavailable");
        }
        self.inner.save(object)
    }
}

#[test]
fn fresh_import_writes_everything() {
    let (_td, dir) = staged(&[
        ("role.xml", "<role><d>1</d></role>"),
        ("replacements.properties", "HOST=ca\n"),
    ]);
    let mut store = MemoryStore::new();
    let out = run(&dir, &Decisions::new(), &mut store).unwrap();

    assert_eq!(out.applied.len(), 2);
    assert!(out.applied.iter().all(|a| a.status == ObjectStatus::Applied));
    assert!(out.notices.contains(&"Applied role/role".to_string()));
    assert!(out.notices.contains(&"Applied replacements/replacements".to_string()));
    assert_eq!(store.get(&key("role/role")).unwrap().unwrap().fields, fields(&[("d", "1")]));
}

#[test]
fn unresolved_conflict_writes_nothing() {
    let (_td, dir) = staged(&[
        ("a.xml", r#"<role name="a"><d>new</d></role>"#),
        ("b.xml", r#"<role name="b"><d>new</d></role>"#),
    ]);
    let mut store = MemoryStore::with_objects([stored("role/a", &[("d", "old")])]);
    let err = run(&dir, &Decisions::new(), &mut store).unwrap_err();

    match &err {
        CommitError::ConflictUnresolved { keys } => assert_eq!(keys, &vec![key("role/a")]),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.exit_code(), 2);
    assert_eq!(store.len(), 1);
    assert!(!store.contains(&key("role/b")).unwrap());
}

#[test]
fn missing_secret_writes_nothing() {
    let (_td, dir) = staged(&[("t.xml", r#"<cryptotoken name="hsm"><slot>1</slot></cryptotoken>"#)]);
    let mut store = MemoryStore::new();
    let err = run(&dir, &Decisions::new(), &mut store).unwrap_err();
    assert!(matches!(err, CommitError::MissingSecret { ref keys } if keys == &vec![key("cryptotoken/hsm")]));
    assert!(store.is_empty());
}

#[test]
fn fail_resolution_aborts_before_any_write() {
    let (_td, dir) = staged(&[
        ("a.xml", r#"<role name="a"/>"#),
        ("z.xml", r#"<role name="z"/>"#),
    ]);
    let mut store = MemoryStore::with_objects([stored("role/z", &[])]);
    let decisions = Decisions::new().resolve(key("role/z"), Resolution::Fail);
    let err = run(&dir, &decisions, &mut store).unwrap_err();

    assert!(matches!(err, CommitError::Aborted { ref key } if key.name == "z"));
    assert!(!store.contains(&key("role/a")).unwrap());
}

#[test]
fn skip_keeps_the_stored_object() {
    let (_td, dir) = staged(&[("role.xml", "<role><d>new</d></role>")]);
    let mut store = MemoryStore::with_objects([stored("role/role", &[("d", "old")])]);
    let decisions = Decisions::new().resolve(key("role/role"), Resolution::Skip);
    let out = run(&dir, &decisions, &mut store).unwrap();

    assert_eq!(out.applied[0].status, ObjectStatus::Skipped);
    assert!(out.notices.contains(&"Skipped role/role".to_string()));
    assert_eq!(store.get(&key("role/role")).unwrap().unwrap().fields["d"], "old");
}

#[test]
fn overwrite_replaces_regular_objects() {
    let (_td, dir) = staged(&[("role.xml", "<role><d>new</d></role>")]);
    let mut store = MemoryStore::with_objects([stored("role/role", &[("d", "old"), ("extra", "x")])]);
    let decisions = Decisions::new().resolve(key("role/role"), Resolution::Overwrite);
    run(&dir, &decisions, &mut store).unwrap();

    let after = store.get(&key("role/role")).unwrap().unwrap();
    assert_eq!(after.fields, fields(&[("d", "new")]));
}

#[test]
fn merge_mode_keeps_stored_only_token_fields_and_injects_secret() {
    let (_td, dir) = staged(&[(
        "t.xml",
        r#"<cryptotoken name="hsm"><label>new</label></cryptotoken>"#,
    )]);
    let mut store = MemoryStore::with_objects([stored(
        "cryptotoken/hsm",
        &[("label", "old"), ("pin-cache", "on")],
    )]);
    let decisions = Decisions::new()
        .resolve(key("cryptotoken/hsm"), Resolution::Overwrite)
        .with_secret(key("cryptotoken/hsm"), Secret::new("1234"));
    let out = run(&dir, &decisions, &mut store).unwrap();

    assert_eq!(out.applied[0].status, ObjectStatus::Merged);
    let after = store.get(&key("cryptotoken/hsm")).unwrap().unwrap();
    assert_eq!(after.fields, fields(&[("label", "new"), ("pin-cache", "on")]));
    assert_eq!(after.secret.as_ref().map(Secret::expose), Some("1234"));
}

#[test]
fn merge_mode_off_replaces_tokens() {
    let (_td, dir) = staged(&[(
        "t.xml",
        r#"<cryptotoken name="hsm"><label>new</label></cryptotoken>"#,
    )]);
    let mut store = MemoryStore::with_objects([stored(
        "cryptotoken/hsm",
        &[("label", "old"), ("pin-cache", "on")],
    )]);
    let decisions = Decisions::new()
        .resolve(key("cryptotoken/hsm"), Resolution::Overwrite)
        .with_secret(key("cryptotoken/hsm"), Secret::new("1234"));
    let opts = CommitOptions {
        merge_crypto_tokens: false,
    };
    let out = commit(&dir, &PlanContext::default(), &decisions, &opts, &mut store).unwrap();

    assert_eq!(out.applied[0].status, ObjectStatus::Applied);
    let after = store.get(&key("cryptotoken/hsm")).unwrap().unwrap();
    assert_eq!(after.fields, fields(&[("label", "new")]));
}

#[test]
fn replacements_always_merge() {
    let (_td, dir) = staged(&[("replacements.properties", "B=2\n")]);
    let mut store = MemoryStore::with_objects([stored("replacements/replacements", &[("A", "1")])]);
    let out = run(&dir, &Decisions::new(), &mut store).unwrap();

    assert_eq!(out.applied[0].status, ObjectStatus::Merged);
    let after = store.get(&key("replacements/replacements")).unwrap().unwrap();
    assert_eq!(after.fields, fields(&[("A", "1"), ("B", "2")]));
}

#[test]
fn store_failure_reports_what_was_already_written() {
    let (_td, dir) = staged(&[
        ("a.xml", r#"<role name="a"/>"#),
        ("b.xml", r#"<role name="b"/>"#),
        ("c.xml", r#"<role name="c"/>"#),
    ]);
    let mut store = FlakyStore {
        inner: MemoryStore::new(),
        limit: 1,
    };
    let err = run(&dir, &Decisions::new(), &mut store).unwrap_err();

    match &err {
        CommitError::ApplyFailed { key: failed, applied, .. } => {
            assert_eq!(failed, &key("role/b"));
            assert_eq!(applied, &vec![key("role/a")]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.exit_code(), 1);
    // Nothing is rolled back.
    assert!(store.inner.contains(&key("role/a")).unwrap());
}

#[test]
fn decisions_are_checked_against_the_current_store() {
    let (_td, dir) = staged(&[("role.xml", "<role/>")]);
    let mut store = MemoryStore::new();
    // Planned against an empty store, but the object appeared since.
    store.save(&stored("role/role", &[])).unwrap();
    let err = run(&dir, &Decisions::new(), &mut store).unwrap_err();
    assert!(matches!(err, CommitError::ConflictUnresolved { .. }));
}
