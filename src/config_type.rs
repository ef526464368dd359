use serde::{Deserialize, Serialize};

/// Which of the two live configuration documents a change or snapshot covers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConfigType {
    /// Flag name to boolean.
    FeatureFlags,

    /// Feature name to a comma-joined list of allowed user emails.
    BetaFeatures,
}

impl ConfigType {
    pub const ALL: [ConfigType; 2] = [ConfigType::FeatureFlags, ConfigType::BetaFeatures];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::FeatureFlags => "feature_flags",
            ConfigType::BetaFeatures => "beta_features",
        }
    }

    pub fn document(&self) -> Document {
        Document::Live(*self)
    }
}

impl std::fmt::Display for ConfigType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three documents held by a config store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Document {
    Live(ConfigType),
    History,
}

impl Document {
    pub const ALL: [Document; 3] = [
        Document::Live(ConfigType::FeatureFlags),
        Document::Live(ConfigType::BetaFeatures),
        Document::History,
    ];

    /// Conceptual path of the document inside the store, e.g. `config/flags`.
    pub fn path(&self) -> &'static str {
        match self {
            Document::Live(ConfigType::FeatureFlags) => "config/flags",
            Document::Live(ConfigType::BetaFeatures) => "config/beta_features",
            Document::History => "config_history/log",
        }
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}
