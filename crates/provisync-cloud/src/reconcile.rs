//! Generic reconciliation between desired and actual collections
//!
//! Items are matched by a composite key that is stable across passes. The
//! same algorithm serves every sub-resource kind; each kind supplies its key
//! and its notion of "mutable attributes differ".

use crate::delta::Delta;
use crate::error::{CloudError, Result};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// A sub-resource that can be reconciled against its remote counterpart
pub trait Reconcilable {
    type Key: Eq + Hash + Clone + Display;

    /// Composite key identifying the same real-world resource across passes
    fn key(&self) -> Self::Key;

    /// Remote-assigned identifier, if the item has been created
    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);

    /// Whether any mutable attribute differs from `actual`
    fn differs_from(&self, actual: &Self) -> bool;

    /// Overwrite mutable attributes with those of `current`, keeping identity.
    fn apply_attributes(&mut self, current: &Self);
}

/// Fail if two items in `items` share a key.
pub fn validate_unique_keys_with<T, K, KF>(items: &[T], collection: &str, key: KF) -> Result<()>
where
    K: Eq + Hash + Display,
    KF: Fn(&T) -> K,
{
    let mut seen = HashMap::with_capacity(items.len());
    for item in items {
        let k = key(item);
        if seen.contains_key(&k) {
            return Err(CloudError::DuplicateKey {
                collection: collection.to_string(),
                key: k.to_string(),
            });
        }
        seen.insert(k, ());
    }

    Ok(())
}

pub fn validate_unique_keys<T: Reconcilable>(items: &[T], collection: &str) -> Result<()> {
    validate_unique_keys_with(items, collection, T::key)
}

/// Split `desired` into the changes needed to reach it from `actual`.
///
/// `differs` is called as `differs(desired, actual)` for items present in
/// both. Modified entries carry the desired values.
pub fn split_by_action_with<T, K, KF, DF>(
    desired: &[T],
    actual: &[T],
    key: KF,
    differs: DF,
) -> Result<Delta<T>>
where
    T: Clone,
    K: Eq + Hash + Display,
    KF: Fn(&T) -> K,
    DF: Fn(&T, &T) -> bool,
{
    validate_unique_keys_with(desired, "desired", &key)?;

    // The first remote item with a given key wins; later ones are ignored.
    let mut unconfigured: HashMap<K, usize> = HashMap::with_capacity(actual.len());
    for (index, item) in actual.iter().enumerate() {
        let k = key(item);
        if unconfigured.contains_key(&k) {
            tracing::warn!("Ignoring remote item with duplicate key {}", k);
            continue;
        }
        unconfigured.insert(k, index);
    }

    let mut delta = Delta::new();
    for configured in desired {
        // Matched items must not show up later as unconfigured.
        match unconfigured.remove(&key(configured)) {
            Some(index) => {
                if differs(configured, &actual[index]) {
                    delta.modify.push(configured.clone());
                }
            }
            None => delta.add.push(configured.clone()),
        }
    }

    // Whatever is left has no configured counterpart.
    let mut remaining: Vec<usize> = unconfigured.into_values().collect();
    remaining.sort_unstable();
    delta.remove = remaining.into_iter().map(|index| actual[index].clone()).collect();

    Ok(delta)
}

pub fn split_by_action<T>(desired: &[T], actual: &[T]) -> Result<Delta<T>>
where
    T: Reconcilable + Clone,
{
    split_by_action_with(desired, actual, T::key, T::differs_from)
}

/// Split configured items into those already present remotely and new ones.
///
/// Only meaningful right after initial deployment, when every remote item
/// came from the image.
pub fn split_by_initial_type<T>(desired: &[T], actual: &[T]) -> (Vec<T>, Vec<T>)
where
    T: Reconcilable + Clone,
{
    let actual_keys: HashMap<T::Key, ()> = actual.iter().map(|a| (a.key(), ())).collect();

    desired
        .iter()
        .cloned()
        .partition(|item| actual_keys.contains_key(&item.key()))
}

/// Copy remote identifiers onto newly created desired items.
///
/// Every item in `created` must have a counterpart in `actual` that carries
/// an identifier; a missing counterpart means the remote claimed success for
/// a creation it does not show.
pub fn capture_ids<T: Reconcilable>(created: &mut [T], actual: &[T]) -> Result<()> {
    let mut actual_by_key: HashMap<T::Key, &T> = HashMap::with_capacity(actual.len());
    for a in actual {
        actual_by_key.entry(a.key()).or_insert(a);
    }

    // Nothing is written back unless every item has an identifier.
    let mut ids = Vec::with_capacity(created.len());
    for item in created.iter() {
        let key = item.key();
        let counterpart = actual_by_key
            .get(&key)
            .ok_or_else(|| CloudError::MissingAfterCreate {
                key: key.to_string(),
            })?;

        match counterpart.id() {
            Some(id) if !id.is_empty() => ids.push(id.to_string()),
            _ => {
                return Err(CloudError::MissingIdentifier {
                    key: key.to_string(),
                });
            }
        }
    }

    for (item, id) in created.iter_mut().zip(ids) {
        tracing::debug!("Captured id '{}' for {}", id, item.key());
        item.set_id(id);
    }

    Ok(())
}

/// Apply the current configuration, in place, to previously known items.
///
/// Items no longer configured are dropped; the rest take their mutable
/// attributes from `current` and keep their identifiers.
pub fn apply_current_configuration<T: Reconcilable>(previous: &mut Vec<T>, current: &[T]) {
    let current_by_key: HashMap<T::Key, &T> = current.iter().map(|c| (c.key(), c)).collect();

    previous.retain_mut(|item| match current_by_key.get(&item.key()) {
        Some(configured) => {
            item.apply_attributes(configured);
            true
        }
        None => false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        id: Option<String>,
        bus: u32,
        unit: u32,
        size: u32,
    }

    fn item(bus: u32, unit: u32, size: u32) -> Item {
        Item {
            id: None,
            bus,
            unit,
            size,
        }
    }

    impl Reconcilable for Item {
        type Key = String;

        fn key(&self) -> String {
            format!("{}/{}", self.bus, self.unit)
        }

        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }

        fn differs_from(&self, actual: &Self) -> bool {
            self.size != actual.size
        }

        fn apply_attributes(&mut self, current: &Self) {
            self.size = current.size;
        }
    }

    #[test]
    fn test_identical_collections_produce_no_delta() {
        let items = vec![item(0, 0, 10), item(0, 1, 20), item(1, 0, 5)];
        let delta = split_by_action(&items, &items).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn test_empty_collections() {
        let items = vec![item(0, 0, 10), item(0, 1, 20)];

        let delta = split_by_action(&[], &items).unwrap();
        assert!(delta.add.is_empty());
        assert!(delta.modify.is_empty());
        assert_eq!(delta.remove, items);

        let delta = split_by_action(&items, &[]).unwrap();
        assert_eq!(delta.add, items);
        assert!(delta.modify.is_empty());
        assert!(delta.remove.is_empty());
    }

    #[test]
    fn test_disjoint_collections() {
        let desired = vec![item(0, 0, 10), item(0, 1, 20)];
        let actual = vec![item(0, 2, 10), item(1, 0, 20), item(1, 1, 30)];

        let delta = split_by_action(&desired, &actual).unwrap();
        assert_eq!(delta.add, desired);
        assert!(delta.modify.is_empty());
        assert_eq!(delta.remove, actual);
    }

    #[test]
    fn test_add_missing_disk() {
        let desired = vec![item(0, 0, 10), item(0, 1, 20)];
        let actual = vec![item(0, 0, 10)];

        let delta = split_by_action(&desired, &actual).unwrap();
        assert_eq!(delta.add, vec![item(0, 1, 20)]);
        assert!(delta.modify.is_empty());
        assert!(delta.remove.is_empty());
    }

    #[test]
    fn test_modify_carries_desired_values() {
        let desired = vec![item(0, 0, 10), item(0, 1, 20)];
        let actual = vec![item(0, 0, 15), item(0, 1, 20)];

        let delta = split_by_action(&desired, &actual).unwrap();
        assert!(delta.add.is_empty());
        assert_eq!(delta.modify, vec![item(0, 0, 10)]);
        assert!(delta.remove.is_empty());
    }

    #[test]
    fn test_mixed_delta_preserves_order() {
        let desired = vec![item(0, 3, 10), item(0, 1, 50), item(0, 0, 5), item(0, 4, 1)];
        let actual = vec![item(0, 9, 1), item(0, 0, 5), item(0, 1, 20), item(0, 7, 1)];

        let delta = split_by_action(&desired, &actual).unwrap();
        assert_eq!(delta.add, vec![item(0, 3, 10), item(0, 4, 1)]);
        assert_eq!(delta.modify, vec![item(0, 1, 50)]);
        assert_eq!(delta.remove, vec![item(0, 9, 1), item(0, 7, 1)]);
    }

    #[test]
    fn test_duplicate_desired_key_is_rejected() {
        let desired = vec![item(0, 1, 10), item(0, 1, 20)];
        let err = split_by_action(&desired, &[]).unwrap_err();
        match err {
            CloudError::DuplicateKey { collection, key } => {
                assert_eq!(collection, "desired");
                assert_eq!(key, "0/1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_actual_key_first_match_wins() {
        let desired = vec![item(0, 1, 20)];
        let actual = vec![
            Item {
                id: Some("disk-a".into()),
                ..item(0, 1, 20)
            },
            Item {
                id: Some("disk-b".into()),
                ..item(0, 1, 99)
            },
            item(0, 2, 5),
        ];

        let delta = split_by_action(&desired, &actual).unwrap();
        assert!(delta.add.is_empty());
        assert!(delta.modify.is_empty());
        assert_eq!(delta.remove, vec![item(0, 2, 5)]);

        let mut created = desired.clone();
        capture_ids(&mut created, &actual).unwrap();
        assert_eq!(created[0].id.as_deref(), Some("disk-a"));
    }

    #[test]
    fn test_split_with_custom_key_and_diff() {
        let desired = vec![("a", 1), ("b", 2)];
        let actual = vec![("b", 3), ("c", 4)];

        let delta =
            split_by_action_with(&desired, &actual, |(name, _)| *name, |d, a| d.1 != a.1).unwrap();
        assert_eq!(delta.add, vec![("a", 1)]);
        assert_eq!(delta.modify, vec![("b", 2)]);
        assert_eq!(delta.remove, vec![("c", 4)]);
    }

    #[test]
    fn test_capture_ids_round_trip() {
        let mut created = vec![item(0, 1, 20), item(0, 2, 30), item(1, 0, 40)];
        let actual: Vec<Item> = created
            .iter()
            .enumerate()
            .map(|(n, c)| Item {
                id: Some(format!("disk-{n}")),
                ..c.clone()
            })
            .chain(std::iter::once(Item {
                id: Some("image-disk".into()),
                ..item(0, 0, 10)
            }))
            .collect();

        capture_ids(&mut created, &actual).unwrap();

        let ids: Vec<&str> = created.iter().map(|c| c.id().unwrap()).collect();
        assert_eq!(ids, vec!["disk-0", "disk-1", "disk-2"]);
    }

    #[test]
    fn test_capture_ids_missing_counterpart() {
        let mut created = vec![item(0, 1, 20)];
        let actual = vec![Item {
            id: Some("disk-0".into()),
            ..item(0, 0, 10)
        }];

        let err = capture_ids(&mut created, &actual).unwrap_err();
        assert!(matches!(err, CloudError::MissingAfterCreate { key } if key == "0/1"));
        assert!(created[0].id.is_none());
    }

    #[test]
    fn test_capture_ids_requires_identifier() {
        let mut created = vec![item(0, 1, 20)];
        let actual = vec![item(0, 1, 20)];

        let err = capture_ids(&mut created, &actual).unwrap_err();
        assert!(matches!(err, CloudError::MissingIdentifier { .. }));
    }

    #[test]
    fn test_capture_ids_leaves_items_untouched_on_failure() {
        let mut created = vec![item(0, 1, 20), item(0, 2, 30)];
        let actual = vec![Item {
            id: Some("disk-1".into()),
            ..item(0, 1, 20)
        }];

        let err = capture_ids(&mut created, &actual).unwrap_err();
        assert!(matches!(err, CloudError::MissingAfterCreate { key } if key == "0/2"));
        assert!(created.iter().all(|c| c.id.is_none()));
    }

    #[test]
    fn test_split_by_initial_type() {
        let desired = vec![item(0, 0, 5), item(0, 1, 20)];
        let actual = vec![item(0, 0, 5)];

        let (image, additional) = split_by_initial_type(&desired, &actual);
        assert_eq!(image, vec![item(0, 0, 5)]);
        assert_eq!(additional, vec![item(0, 1, 20)]);
    }

    #[test]
    fn test_apply_current_configuration() {
        let mut previous = vec![
            Item {
                id: Some("disk-0".into()),
                ..item(0, 0, 10)
            },
            Item {
                id: Some("disk-1".into()),
                ..item(0, 1, 20)
            },
        ];
        let current = vec![item(0, 1, 40), item(0, 2, 5)];

        apply_current_configuration(&mut previous, &current);

        assert_eq!(
            previous,
            vec![Item {
                id: Some("disk-1".into()),
                ..item(0, 1, 40)
            }]
        );
    }
}
