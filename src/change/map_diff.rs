use std::collections::BTreeSet;

use crate::Map;

use super::{ChangeSet, Modification};

const METADATA_KEY: &str = "metadata";

/// Keys that are never part of the domain configuration and never appear in a change set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservedKeys(BTreeSet<String>);

impl ReservedKeys {
    pub fn new<I, S>(keys: I) -> ReservedKeys
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReservedKeys(keys.into_iter().map(Into::into).collect())
    }

    pub fn none() -> ReservedKeys {
        ReservedKeys(BTreeSet::new())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for ReservedKeys {
    fn default() -> Self {
        ReservedKeys::new([METADATA_KEY])
    }
}

/// Values are compared through their canonical JSON serialization. Array order
/// is therefore significant: `["a","b"]` and `["b","a"]` count as a modification.
fn canonical(value: &serde_json::Value) -> String {
    integral(value).to_string()
}

/// Largest magnitude below which every integral `f64` is exact.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// JSON has a single number type, so `1.0` is written as `1`.
fn integral(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Number(number) => match number.as_f64() {
            Some(float)
                if number.is_f64() && float.fract() == 0.0 && float.abs() < MAX_EXACT_INTEGER =>
            {
                Value::from(float as i64)
            }
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(integral).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, field)| (key.clone(), integral(field)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Computes the change set from `previous` to `current`.
///
/// An absent `previous` means no document existed yet, and every key of
/// `current` is classified as added.
pub fn diff(previous: Option<&Map>, current: &Map, reserved: &ReservedKeys) -> ChangeSet {
    let mut changes = ChangeSet::default();

    let Some(previous) = previous else {
        changes.added.extend(
            current
                .keys()
                .filter(|key| !reserved.contains(key))
                .cloned(),
        );
        return changes;
    };

    for (key, value) in current.iter() {
        if reserved.contains(key) {
            continue;
        }

        match previous.get(key) {
            None => changes.added.push(key.clone()),
            Some(old) if canonical(old) != canonical(value) => {
                changes.modified.insert(
                    key.clone(),
                    Modification {
                        old: old.clone(),
                        new: value.clone(),
                    },
                );
            }
            Some(_) => continue,
        }
    }

    changes.removed.extend(
        previous
            .keys()
            .filter(|key| !reserved.contains(key) && !current.contains_key(*key))
            .cloned(),
    );

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(value: serde_json::Value) -> Map {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn changes(
        added: &[&str],
        modified: &[(&str, serde_json::Value, serde_json::Value)],
        removed: &[&str],
    ) -> ChangeSet {
        ChangeSet {
            added: added.iter().map(|k| k.to_string()).collect(),
            modified: modified
                .iter()
                .map(|(k, old, new)| {
                    (
                        k.to_string(),
                        Modification {
                            old: old.clone(),
                            new: new.clone(),
                        },
                    )
                })
                .collect(),
            removed: removed.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn identical_states_are_empty() {
        let state = map(json!({ "a": true, "b": "x@y.com", "c": [1, 2] }));
        assert!(diff(Some(&state), &state, &ReservedKeys::default()).is_empty());
    }

    #[test]
    fn both_empty_is_empty() {
        assert!(diff(Some(&Map::new()), &Map::new(), &ReservedKeys::default()).is_empty());
    }

    #[test]
    fn disjoint_keys_are_added_and_removed() {
        let previous = map(json!({ "old_one": true, "old_two": false }));
        let current = map(json!({ "new_one": true }));

        assert_eq!(
            diff(Some(&previous), &current, &ReservedKeys::default()).normalized(),
            changes(&["new_one"], &[], &["old_one", "old_two"])
        );
    }

    #[test]
    fn single_value_change_is_modified() {
        let previous = map(json!({ "dark_mode": false, "stable": true }));
        let current = map(json!({ "dark_mode": true, "stable": true }));

        assert_eq!(
            diff(Some(&previous), &current, &ReservedKeys::default()),
            changes(&[], &[("dark_mode", json!(false), json!(true))], &[])
        );
    }

    #[test]
    fn absent_previous_matches_empty_previous() {
        let current = map(json!({ "a": true, "b": false, "metadata": { "v": 1 } }));
        let reserved = ReservedKeys::default();

        let from_absent = diff(None, &current, &reserved);
        assert_eq!(from_absent, diff(Some(&Map::new()), &current, &reserved));
        assert_eq!(from_absent, changes(&["a", "b"], &[], &[]));
    }

    #[test]
    fn metadata_never_appears() {
        let previous = map(json!({ "metadata": { "updated": 1 }, "gone": 1 }));
        let current = map(json!({ "metadata": { "updated": 2 }, "fresh": 1 }));
        assert_eq!(
            diff(Some(&previous), &current, &ReservedKeys::default()),
            changes(&["fresh"], &[], &["gone"])
        );

        let without = map(json!({}));
        assert!(diff(Some(&previous), &without, &ReservedKeys::default())
            .removed
            .iter()
            .all(|k| k != "metadata"));
    }

    #[test]
    fn reserved_keys_are_configurable() {
        let previous = map(json!({ "metadata": 1, "_rev": 1 }));
        let current = map(json!({ "metadata": 2, "_rev": 2 }));

        assert_eq!(
            diff(Some(&previous), &current, &ReservedKeys::new(["_rev"])),
            changes(&[], &[("metadata", json!(1), json!(2))], &[])
        );
        assert_eq!(
            diff(Some(&previous), &current, &ReservedKeys::none())
                .modified
                .len(),
            2
        );
    }

    #[test]
    fn array_order_is_significant() {
        let previous = map(json!({ "list": ["a", "b"] }));
        let current = map(json!({ "list": ["b", "a"] }));

        assert_eq!(
            diff(Some(&previous), &current, &ReservedKeys::default()),
            changes(&[], &[("list", json!(["a", "b"]), json!(["b", "a"]))], &[])
        );
    }

    #[test]
    fn integral_floats_equal_integers() {
        let previous = map(json!({ "limit": 1, "weights": [2, 3.5], "nested": { "n": 0 } }));
        let current = map(json!({ "limit": 1.0, "weights": [2.0, 3.5], "nested": { "n": -0.0 } }));

        assert!(diff(Some(&previous), &current, &ReservedKeys::default()).is_empty());

        let fractional = map(json!({ "limit": 1.5, "weights": [2, 3.5], "nested": { "n": 0 } }));
        assert_eq!(
            diff(Some(&previous), &fractional, &ReservedKeys::default()),
            changes(&[], &[("limit", json!(1), json!(1.5))], &[])
        );
    }

    #[test]
    fn nested_objects_compare_structurally() {
        let previous = map(json!({ "obj": { "x": 1, "y": 2 } }));
        let current = map(json!({ "obj": { "y": 2, "x": 1 } }));

        assert!(diff(Some(&previous), &current, &ReservedKeys::default()).is_empty());
    }

    #[test]
    fn type_change_is_modified() {
        let previous = map(json!({ "k": "true" }));
        let current = map(json!({ "k": true }));

        assert_eq!(
            diff(Some(&previous), &current, &ReservedKeys::default()),
            changes(&[], &[("k", json!("true"), json!(true))], &[])
        );
    }

    #[test]
    fn add_remove_and_modify_in_one_diff() {
        let previous = map(json!({
            "stable": true,
            "removed": false,
            "weather_v2": "a@x.com,b@x.com",
        }));
        let current = map(json!({
            "stable": true,
            "added": true,
            "weather_v2": "a@x.com",
        }));

        assert_eq!(
            diff(Some(&previous), &current, &ReservedKeys::default()),
            changes(
                &["added"],
                &[("weather_v2", json!("a@x.com,b@x.com"), json!("a@x.com"))],
                &["removed"]
            )
        );
    }

    #[test]
    fn diff_is_deterministic() {
        let previous = map(json!({ "a": 1, "b": 2, "c": 3 }));
        let current = map(json!({ "b": 20, "c": 3, "d": 4 }));
        let reserved = ReservedKeys::default();

        assert_eq!(
            diff(Some(&previous), &current, &reserved),
            diff(Some(&previous), &current, &reserved)
        );
    }
}
