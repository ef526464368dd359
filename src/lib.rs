mod builder;
pub mod change;
mod clock;
mod config_type;
mod edit;
mod history;
mod identity;
pub mod snapshot;
pub mod store;
mod watch;

#[cfg(test)]
mod test;

pub use builder::Builder;
pub use change::{ChangeAction, ChangeSet, Modification, ReservedKeys, diff};
pub use clock::{Clock, SystemClock};
pub use config_type::{ConfigType, Document};
pub use edit::{
    BetaEdit, Edit, FlagEdit, PendingChange, ValidationError, format_email_list, parse_email_list,
};
pub use history::{Change, HistoryError, HistoryService};
pub use identity::{Author, Principal};
pub use snapshot::{HistoryLog, Snapshot, SnapshotId};
pub use store::ConfigStore;
pub use watch::{Poller, Subscription, SubscriptionError};

pub type Map = serde_json::Map<String, serde_json::Value>;
