//! Newest-version selection.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use gembasync_common::{FileName, RemoteVersionRecord};

/// The single newest record per name, ordered by name.
pub type NewestSet = BTreeMap<FileName, RemoteVersionRecord>;

/// Whether `candidate` should replace `current` as the newest record.
///
/// Later `posted_at` wins; on equal timestamps the smaller version id wins.
fn supersedes(candidate: &RemoteVersionRecord, current: &RemoteVersionRecord) -> bool {
    match candidate.posted_at.cmp(&current.posted_at) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.version_id < current.version_id,
    }
}

/// Reduce a catalog to its newest record per name.
///
/// The result does not depend on the order of `records`.
pub fn select_newest<'a, I>(records: I) -> NewestSet
where
    I: IntoIterator<Item = &'a RemoteVersionRecord>,
{
    let mut newest = NewestSet::new();
    for record in records {
        match newest.get(&record.name) {
            Some(current) if !supersedes(record, current) => {}
            _ => {
                newest.insert(record.name.clone(), record.clone());
            }
        }
    }
    newest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use gembasync_common::VersionId;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn rec(name: &str, id: &str, secs: i64) -> RemoteVersionRecord {
        RemoteVersionRecord::new(FileName::from(name), VersionId::new(id).unwrap(), at(secs))
    }

    #[test]
    fn test_empty_catalog() {
        assert!(select_newest(&Vec::<RemoteVersionRecord>::new()).is_empty());
    }

    #[test]
    fn test_picks_latest_per_name() {
        let catalog = vec![rec("a", "v1", 1), rec("a", "v2", 2), rec("b", "w1", 3)];
        let newest = select_newest(&catalog);

        assert_eq!(newest.len(), 2);
        assert_eq!(newest[&FileName::from("a")].version_id.as_str(), "v2");
        assert_eq!(newest[&FileName::from("b")].version_id.as_str(), "w1");
    }

    #[test]
    fn test_tie_goes_to_smallest_id() {
        let newest = select_newest(&[rec("a", "v9", 5), rec("a", "v3", 5), rec("a", "v1", 4)]);
        assert_eq!(newest[&FileName::from("a")].version_id.as_str(), "v3");
    }

    #[test]
    fn test_ordered_by_name() {
        let newest = select_newest(&[rec("c", "1", 0), rec("a", "2", 0), rec("b", "3", 0)]);
        let names: Vec<&str> = newest.keys().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    fn arb_catalog() -> impl Strategy<Value = Vec<RemoteVersionRecord>> {
        prop::collection::vec(("[abc]", 0u32..50, 0i64..4), 0..20).prop_map(|rows| {
            rows.into_iter()
                .map(|(name, id, secs)| rec(&name, &format!("id{:02}", id), secs))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_order_independent(catalog in arb_catalog(), seed in any::<u64>()) {
            let mut shuffled = catalog.clone();
            // Deterministic permutation driven by the seed.
            let len = shuffled.len();
            if len > 1 {
                for i in 0..len {
                    let j = ((seed.wrapping_mul(i as u64 + 1)) % len as u64) as usize;
                    shuffled.swap(i, j);
                }
            }
            prop_assert_eq!(select_newest(&catalog), select_newest(&shuffled));
        }

        #[test]
        fn prop_selected_is_maximal(catalog in arb_catalog()) {
            let newest = select_newest(&catalog);
            for record in &catalog {
                let chosen = &newest[&record.name];
                prop_assert!(chosen.posted_at >= record.posted_at);
                if chosen.posted_at == record.posted_at {
                    prop_assert!(chosen.version_id <= record.version_id);
                }
            }
            let names: std::collections::BTreeSet<_> = catalog.iter().map(|r| &r.name).collect();
            prop_assert_eq!(names.len(), newest.len());
        }
    }
}
