use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Modification {
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

/// The added / removed / modified breakdown between two states of one document.
///
/// A key lands in at most one bucket, and keys whose values are unchanged land in none.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChangeSet {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: BTreeMap<String, Modification>,
    #[serde(default)]
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// The change set that undoes this one: added and removed swap, and every
    /// modification runs the other way.
    pub fn inverse(&self) -> ChangeSet {
        ChangeSet {
            added: self.removed.clone(),
            modified: self
                .modified
                .iter()
                .map(|(key, m)| {
                    (
                        key.clone(),
                        Modification {
                            old: m.new.clone(),
                            new: m.old.clone(),
                        },
                    )
                })
                .collect(),
            removed: self.added.clone(),
        }
    }

    /// Sorts `added` and `removed` so two change sets can be compared without
    /// caring about discovery order.
    pub fn normalized(mut self) -> ChangeSet {
        self.added.sort();
        self.removed.sort();
        self
    }
}
