use serde::{Deserialize, Serialize};

/// Descriptive label attached to a snapshot. It is not checked against the
/// snapshot's change set: an `update` may add keys and a `delete` may be empty.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    #[default]
    Update,
    Delete,
    Rollback,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
            ChangeAction::Rollback => "rollback",
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
