use once_cell::sync::Lazy;
use regex::Regex;

use crate::Map;
use crate::change::ChangeAction;
use crate::config_type::ConfigType;

static FLAG_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("flag name pattern compiles"));

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Flag name `{0}` must contain only lowercase letters, numbers, and underscores")]
    InvalidFlagName(String),

    #[error("`{0}` already exists")]
    AlreadyExists(String),

    #[error("`{0}` does not exist")]
    NotFound(String),

    #[error("Email cannot be empty")]
    EmptyEmail,

    #[error("`{0}` is not a valid email address")]
    InvalidEmail(String),

    #[error("{email} is already in the beta feature `{feature}`")]
    AlreadyEnrolled { feature: String, email: String },

    #[error("{email} is not in the beta feature `{feature}`")]
    NotEnrolled { feature: String, email: String },
}

/// A full replacement document plus the metadata to record it with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingChange {
    pub new_state: Map,
    pub action: ChangeAction,
    pub description: String,
}

/// An operator edit against one live document. Edits never patch the store:
/// they compute the complete next document from the current one.
pub trait Edit {
    const CONFIG_TYPE: ConfigType;

    fn apply(&self, current: &Map) -> Result<PendingChange, ValidationError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlagEdit {
    Add { name: String, enabled: bool },
    Toggle { name: String },
    Rename { from: String, to: String },
    Delete { name: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BetaEdit {
    AddFeature { name: String },
    RenameFeature { from: String, to: String },
    DeleteFeature { name: String },
    AddUser { feature: String, email: String },
    RemoveUser { feature: String, email: String },
}

/// Splits a stored allow-list, dropping blanks. `"a@x.com, ,b@x.com"` yields two emails.
pub fn parse_email_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(String::from)
        .collect()
}

pub fn format_email_list(emails: &[String]) -> String {
    emails.join(",")
}

fn validate_flag_name(name: &str) -> Result<&str, ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if !FLAG_NAME.is_match(name) {
        return Err(ValidationError::InvalidFlagName(name.to_string()));
    }

    Ok(name)
}

fn validate_feature_name(name: &str) -> Result<&str, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    Ok(name)
}

fn validate_email(email: &str) -> Result<&str, ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::EmptyEmail);
    }

    if !EMAIL.is_match(email) {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }

    Ok(email)
}

fn require<'a>(current: &'a Map, key: &str) -> Result<&'a serde_json::Value, ValidationError> {
    current
        .get(key)
        .ok_or_else(|| ValidationError::NotFound(key.to_string()))
}

fn rename(current: &Map, from: &str, to: &str) -> Result<Map, ValidationError> {
    let value = require(current, from)?.clone();
    if to != from && current.contains_key(to) {
        return Err(ValidationError::AlreadyExists(to.to_string()));
    }

    let mut next = current.clone();
    next.remove(from);
    next.insert(to.to_string(), value);
    Ok(next)
}

fn members(current: &Map, feature: &str) -> Result<Vec<String>, ValidationError> {
    let value = require(current, feature)?;
    Ok(parse_email_list(value.as_str().unwrap_or_default()))
}

impl Edit for FlagEdit {
    const CONFIG_TYPE: ConfigType = ConfigType::FeatureFlags;

    fn apply(&self, current: &Map) -> Result<PendingChange, ValidationError> {
        match self {
            FlagEdit::Add { name, enabled } => {
                let name = validate_flag_name(name)?;
                if current.contains_key(name) {
                    return Err(ValidationError::AlreadyExists(name.to_string()));
                }

                let mut next = current.clone();
                next.insert(name.to_string(), (*enabled).into());

                Ok(PendingChange {
                    new_state: next,
                    action: ChangeAction::Create,
                    description: format!(
                        "Added new flag: {name} ({})",
                        if *enabled { "enabled" } else { "disabled" }
                    ),
                })
            }
            FlagEdit::Toggle { name } => {
                let enabled = !require(current, name)?.as_bool().unwrap_or(false);

                let mut next = current.clone();
                next.insert(name.clone(), enabled.into());

                Ok(PendingChange {
                    new_state: next,
                    action: ChangeAction::Update,
                    description: format!(
                        "{} {name}",
                        if enabled { "Enabled" } else { "Disabled" }
                    ),
                })
            }
            FlagEdit::Rename { from, to } => {
                let to = validate_flag_name(to)?;
                let next = rename(current, from, to)?;

                Ok(PendingChange {
                    new_state: next,
                    action: ChangeAction::Update,
                    description: if to != from.as_str() {
                        format!("Renamed flag: {from} → {to}")
                    } else {
                        format!("Updated flag: {to}")
                    },
                })
            }
            FlagEdit::Delete { name } => {
                require(current, name)?;

                let mut next = current.clone();
                next.remove(name);

                Ok(PendingChange {
                    new_state: next,
                    action: ChangeAction::Delete,
                    description: format!("Deleted flag: {name}"),
                })
            }
        }
    }
}

impl Edit for BetaEdit {
    const CONFIG_TYPE: ConfigType = ConfigType::BetaFeatures;

    fn apply(&self, current: &Map) -> Result<PendingChange, ValidationError> {
        match self {
            BetaEdit::AddFeature { name } => {
                let name = validate_feature_name(name)?;
                if current.contains_key(name) {
                    return Err(ValidationError::AlreadyExists(name.to_string()));
                }

                let mut next = current.clone();
                next.insert(name.to_string(), String::new().into());

                Ok(PendingChange {
                    new_state: next,
                    action: ChangeAction::Create,
                    description: format!("Added new beta feature: {name}"),
                })
            }
            BetaEdit::RenameFeature { from, to } => {
                let to = validate_feature_name(to)?;
                let next = rename(current, from, to)?;

                Ok(PendingChange {
                    new_state: next,
                    action: ChangeAction::Update,
                    description: if to != from.as_str() {
                        format!("Renamed beta feature: {from} → {to}")
                    } else {
                        format!("Updated beta feature: {to}")
                    },
                })
            }
            BetaEdit::DeleteFeature { name } => {
                require(current, name)?;

                let mut next = current.clone();
                next.remove(name);

                Ok(PendingChange {
                    new_state: next,
                    action: ChangeAction::Delete,
                    description: format!("Deleted beta feature: {name}"),
                })
            }
            BetaEdit::AddUser { feature, email } => {
                let email = validate_email(email)?;
                let mut emails = members(current, feature)?;
                if emails.iter().any(|e| e == email) {
                    return Err(ValidationError::AlreadyEnrolled {
                        feature: feature.clone(),
                        email: email.to_string(),
                    });
                }
                emails.push(email.to_string());

                let mut next = current.clone();
                next.insert(feature.clone(), format_email_list(&emails).into());

                Ok(PendingChange {
                    new_state: next,
                    action: ChangeAction::Update,
                    description: format!("Added user {email} to {feature}"),
                })
            }
            BetaEdit::RemoveUser { feature, email } => {
                let emails = members(current, feature)?;
                if !emails.iter().any(|e| e == email) {
                    return Err(ValidationError::NotEnrolled {
                        feature: feature.clone(),
                        email: email.clone(),
                    });
                }

                let remaining: Vec<String> = emails.into_iter().filter(|e| e != email).collect();

                let mut next = current.clone();
                next.insert(feature.clone(), format_email_list(&remaining).into());

                Ok(PendingChange {
                    new_state: next,
                    action: ChangeAction::Update,
                    description: format!("Removed user {email} from {feature}"),
                })
            }
        }
    }
}
