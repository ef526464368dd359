const UNKNOWN_AUTHOR: &str = "Unknown";

/// The authenticated identity performing a change, as delivered by the identity provider.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Principal {
    /// Example: `operator@example.com`
    pub display_identifier: Option<String>,
}

impl Principal {
    pub fn new(display_identifier: impl Into<String>) -> Principal {
        Principal {
            display_identifier: Some(display_identifier.into()),
        }
    }
}

/// The `author` recorded on a snapshot.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct Author(String);

impl Author {
    /// Falls back to `Unknown` when nobody is signed in or the principal has no identifier.
    pub fn from_principal(principal: Option<&Principal>) -> Author {
        principal
            .and_then(|p| p.display_identifier.as_deref())
            .filter(|id| !id.trim().is_empty())
            .map(|id| Author(id.to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Author {
    fn default() -> Self {
        Author(UNKNOWN_AUTHOR.to_string())
    }
}

impl From<String> for Author {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Author {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}
