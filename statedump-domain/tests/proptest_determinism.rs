//! Planning the same directory against the same store yields equal plans,
//! and plan lists come out sorted whatever order the files were written in.

use camino::Utf8PathBuf;
use fs_err as fs;
use proptest::prelude::*;
use statedump_domain::{MemoryStore, PlanContext, Planner};
use statedump_types::StoredObject;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn arb_objects() -> impl Strategy<Value = Vec<(String, String, bool)>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["role", "cryptotoken", "certprofile"]),
            "[a-z][a-z0-9_-]{0,8}",
            any::<bool>(),
        ),
        1..8,
    )
    .prop_map(|mut items| {
        items.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        items.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);
        items
            .into_iter()
            .map(|(kind, name, stored)| (kind.to_string(), name, stored))
            .collect()
    })
}

proptest! {
    #[test]
    fn plans_are_deterministic(objects in arb_objects()) {
        let td = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();

        let mut existing = Vec::new();
        // Write in reverse so directory order differs from key order.
        for (idx, (kind, name, in_store)) in objects.iter().enumerate().rev() {
            let xml = format!(r#"<{kind} name="{name}"><n>{idx}</n></{kind}>"#);
            fs::write(dir.join(format!("f{idx}.xml")), xml).unwrap();
            if *in_store {
                let key = format!("{kind}/{name}").parse().unwrap();
                existing.push(StoredObject::new(key, BTreeMap::new()));
            }
        }
        let store = MemoryStore::with_objects(existing);

        let planner = Planner::new();
        let ctx = PlanContext::default();
        let first = planner.plan(&dir, &ctx, &store).unwrap();
        let second = planner.plan(&dir, &ctx, &store).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let keys: Vec<_> = first.objects.iter().map(|o| o.key.clone()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(keys, sorted);
        prop_assert_eq!(first.objects.len(), objects.len());
        prop_assert_eq!(
            first.conflicts.len(),
            objects.iter().filter(|o| o.2).count()
        );
    }
}
