//! Property-based tests for the merge rule.

use std::sync::Arc;

use proptest::prelude::*;
use veilsync_storage::MemoryKeyValueStore;

use super::PolicyCache;
use crate::model::{AccessMap, AccessTable, EntityKind, Organization, PolicySnapshot};

/// Small key space so old and new maps overlap often.
fn access_map_strategy() -> impl Strategy<Value = AccessMap> {
    prop::collection::btree_map((0i64..20).prop_map(|k| k.to_string()), any::<bool>(), 0..12)
}

fn access_table_strategy() -> impl Strategy<Value = AccessTable> {
    (
        access_map_strategy(),
        access_map_strategy(),
        access_map_strategy(),
        access_map_strategy(),
    )
        .prop_map(|(groups, channels, bots, stickers)| AccessTable {
            groups,
            channels,
            bots,
            stickers,
            users: AccessMap::new(),
        })
}

fn snapshot_with(org_id: i64, access: AccessTable) -> PolicySnapshot {
    PolicySnapshot {
        organization: Some(Organization {
            id: Some(org_id),
            ..Default::default()
        }),
        access,
        ..Default::default()
    }
}

fn fresh_cache() -> PolicyCache {
    PolicyCache::new(Arc::new(MemoryKeyValueStore::new("proptest").unwrap()))
}

proptest! {
    #[test]
    fn test_same_organization_commit_backfills(
        old in access_table_strategy(),
        new in access_table_strategy(),
    ) {
        let cache = fresh_cache();
        cache.commit(snapshot_with(1, old.clone()));
        cache.commit(snapshot_with(1, new.clone()));
        let merged = cache.read().unwrap();

        for kind in EntityKind::ALL {
            let (a, b, m) = (old.map(kind), new.map(kind), merged.access.map(kind));

            for (key, value) in b {
                prop_assert_eq!(m.get(key), Some(value), "{} {} must keep new value", kind, key);
            }
            for (key, value) in a {
                if !b.contains_key(key) {
                    prop_assert_eq!(m.get(key), Some(value), "{} {} must be backfilled", kind, key);
                }
            }
            for key in m.keys() {
                prop_assert!(
                    a.contains_key(key) || b.contains_key(key),
                    "{} {} appeared from nowhere",
                    kind,
                    key
                );
            }
        }
    }

    #[test]
    fn test_organization_switch_commit_is_exact(
        old in access_table_strategy(),
        new in access_table_strategy(),
        old_org in 0i64..100,
        delta in 1i64..100,
    ) {
        let cache = fresh_cache();
        cache.commit(snapshot_with(old_org, old));
        let incoming = snapshot_with(old_org + delta, new);
        cache.commit(incoming.clone());

        prop_assert_eq!(&*cache.read().unwrap(), &incoming);
    }
}
