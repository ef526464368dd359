use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Map;
use crate::change::{ChangeAction, ChangeSet, DiffEntry, DiffKind, ReservedKeys, diff};
use crate::config_type::ConfigType;
use crate::identity::Author;

/// Example: `feature_flags_1713092739000`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn derive(config_type: ConfigType, timestamp: &DateTime<Utc>) -> SnapshotId {
        SnapshotId(format!("{config_type}_{}", timestamp.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SnapshotId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// Immutable record of one committed change.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: SnapshotId,
    pub timestamp: DateTime<Utc>,
    pub author: Author,
    pub config_type: ConfigType,
    pub action: ChangeAction,
    pub description: String,

    /// Absent for the first change ever recorded for this config type.
    #[serde(
        rename = "previousSnapshot",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_state: Option<Map>,

    #[serde(rename = "currentSnapshot")]
    pub current_state: Map,

    pub changes: ChangeSet,
}

impl Snapshot {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn capture(
        config_type: ConfigType,
        action: ChangeAction,
        description: String,
        author: Author,
        previous_state: Option<Map>,
        current_state: Map,
        timestamp: DateTime<Utc>,
        reserved: &ReservedKeys,
    ) -> Snapshot {
        let changes = diff(previous_state.as_ref(), &current_state, reserved);

        Snapshot {
            id: SnapshotId::derive(config_type, &timestamp),
            timestamp,
            author,
            config_type,
            action,
            description,
            previous_state,
            current_state,
            changes,
        }
    }

    /// Flattens the change set into display rows sorted by key.
    pub fn diff_entries(&self) -> Vec<DiffEntry> {
        let mut entries: Vec<DiffEntry> = vec![];

        for key in &self.changes.added {
            entries.push(DiffEntry {
                key: key.clone(),
                kind: DiffKind::Added,
                old_value: None,
                new_value: self.current_state.get(key).cloned(),
            });
        }

        for (key, change) in &self.changes.modified {
            entries.push(DiffEntry {
                key: key.clone(),
                kind: DiffKind::Modified,
                old_value: Some(change.old.clone()),
                new_value: Some(change.new.clone()),
            });
        }

        for key in &self.changes.removed {
            entries.push(DiffEntry {
                key: key.clone(),
                kind: DiffKind::Removed,
                old_value: self
                    .previous_state
                    .as_ref()
                    .and_then(|previous| previous.get(key))
                    .cloned(),
                new_value: None,
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("A snapshot with id `{0}` is already recorded")]
pub struct DuplicateSnapshot(pub SnapshotId);

/// Every snapshot for both config types, keyed by id. Grows monotonically.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HistoryLog {
    #[serde(default)]
    snapshots: BTreeMap<SnapshotId, Snapshot>,
}

impl HistoryLog {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, id: &SnapshotId) -> Option<&Snapshot> {
        self.snapshots.get(id)
    }

    /// Adds exactly one new entry without disturbing the existing ones.
    pub fn try_insert(&mut self, snapshot: Snapshot) -> Result<(), DuplicateSnapshot> {
        if self.snapshots.contains_key(&snapshot.id) {
            return Err(DuplicateSnapshot(snapshot.id));
        }

        self.snapshots.insert(snapshot.id.clone(), snapshot);
        Ok(())
    }

    pub fn newest_first(&self) -> Vec<&Snapshot> {
        let mut snapshots: Vec<&Snapshot> = self.snapshots.values().collect();
        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        snapshots
    }

    pub fn for_config_type(&self, config_type: ConfigType) -> impl Iterator<Item = &Snapshot> {
        self.snapshots
            .values()
            .filter(move |s| s.config_type == config_type)
    }

    pub fn latest(&self, config_type: ConfigType) -> Option<&Snapshot> {
        self.for_config_type(config_type)
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
    }
}
