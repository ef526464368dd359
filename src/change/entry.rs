use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
}

/// One row of a rendered diff.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DiffEntry {
    pub key: String,
    pub kind: DiffKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
}

/// Renders a config value for humans: booleans and strings as-is, arrays
/// joined with `, `, everything else as compact JSON.
pub fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(format_value)
            .collect::<Vec<String>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn format_optional(value: Option<&serde_json::Value>) -> String {
    value.map(format_value).unwrap_or_default()
}

impl std::fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DiffKind::Added => write!(
                f,
                "+{}: {}",
                self.key,
                format_optional(self.new_value.as_ref())
            ),
            DiffKind::Removed => write!(
                f,
                "-{}: {}",
                self.key,
                format_optional(self.old_value.as_ref())
            ),
            DiffKind::Modified => write!(
                f,
                "~{}: {} -> {}",
                self.key,
                format_optional(self.old_value.as_ref()),
                format_optional(self.new_value.as_ref())
            ),
        }
    }
}
