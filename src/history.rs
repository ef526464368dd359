use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

use crate::Map;
use crate::change::{ChangeAction, ReservedKeys};
use crate::clock::{Clock, SystemClock};
use crate::config_type::{ConfigType, Document};
use crate::edit::{Edit, ValidationError};
use crate::identity::{Author, Principal};
use crate::snapshot::{HistoryLog, Snapshot, SnapshotId};
use crate::store::ConfigStore;
use crate::watch::{Subscription, SubscriptionError};

#[derive(thiserror::Error, Debug)]
pub enum HistoryError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Reading the current {0} document failed: {1}")]
    Read(ConfigType, #[source] E),

    #[error("Writing the {0} document failed, no history was recorded: {1}")]
    WriteLive(ConfigType, #[source] E),

    /// The live document already holds the new state; only the history entry is missing.
    #[error(
        "The {} document was updated, but recording snapshot `{}` failed: {source}",
        .snapshot.config_type,
        .snapshot.id
    )]
    AppendHistory {
        snapshot: Box<Snapshot>,
        #[source]
        source: E,
    },

    #[error("Loading the configuration history failed: {0}")]
    LoadHistory(#[source] E),

    #[error("No snapshot with id `{0}` in the configuration history")]
    UnknownSnapshot(SnapshotId),

    #[error("Subscribing to {0} failed: {1}")]
    Subscribe(Document, #[source] E),
}

/// One complete change to record: the full replacement document plus the
/// state it replaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub config_type: ConfigType,
    pub action: ChangeAction,
    pub description: String,
    pub author: Author,

    /// What the caller read immediately before deciding on `new_state`.
    /// `None` for the first write ever made to this config type.
    pub previous_state: Option<Map>,

    /// A complete document, never a partial patch.
    pub new_state: Map,
}

/// Applies changes to the live documents and keeps the history log in step.
pub struct HistoryService<S: ConfigStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    last_issued: AtomicI64,
    author: Author,
    reserved: ReservedKeys,
}

impl<S: ConfigStore, C: Clock> HistoryService<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            last_issued: AtomicI64::new(i64::MIN),
            author: Author::default(),
            reserved: ReservedKeys::default(),
        }
    }

    pub fn with_reserved_keys(mut self, reserved: ReservedKeys) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn with_principal(mut self, principal: Option<&Principal>) -> Self {
        self.set_principal(principal);
        self
    }

    /// Called on every auth-state change; later snapshots are attributed to the new principal.
    pub fn set_principal(&mut self, principal: Option<&Principal>) {
        self.author = Author::from_principal(principal);
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn reserved_keys(&self) -> &ReservedKeys {
        &self.reserved
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot ids embed the millisecond, so a millisecond is never handed out
    /// twice. Changes arriving faster than the clock ticks are spread forward.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let wanted = now.timestamp_millis();

        let last = match self.last_issued.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(wanted.max(last.saturating_add(1)))
        }) {
            Ok(last) | Err(last) => last,
        };

        let issued = wanted.max(last.saturating_add(1));
        if issued == wanted {
            return now;
        }

        DateTime::from_timestamp_millis(issued).unwrap_or(now)
    }

    #[tracing::instrument(skip(self))]
    pub async fn current_state(
        &self,
        config_type: ConfigType,
    ) -> Result<Option<Map>, HistoryError<S::Error>> {
        self.store
            .read(config_type)
            .await
            .inspect_err(|e| tracing::debug!(%e, "Reading the live document failed"))
            .map_err(|e| HistoryError::Read(config_type, e))
    }

    /// Writes `change.new_state` as the live document, then appends a snapshot
    /// describing the transition from `change.previous_state`.
    ///
    /// The read that produced `previous_state` and this write are separate
    /// store calls. A concurrent writer in between wins or loses by ordering
    /// alone, and the recorded diff is relative to the state this caller saw.
    ///
    /// If the live write fails nothing is appended. If the append fails the
    /// live document has already moved on; the snapshot is handed back in
    /// [`HistoryError::AppendHistory`] and is not retried.
    #[tracing::instrument(
        skip(self, change),
        fields(config_type = %change.config_type, action = %change.action)
    )]
    pub async fn record_change(&self, change: Change) -> Result<Snapshot, HistoryError<S::Error>> {
        let Change {
            config_type,
            action,
            description,
            author,
            previous_state,
            new_state,
        } = change;

        self.store
            .write(config_type, new_state.clone())
            .await
            .inspect_err(|e| tracing::debug!(%e, "Writing the live document failed"))
            .map_err(|e| HistoryError::WriteLive(config_type, e))?;

        let snapshot = Snapshot::capture(
            config_type,
            action,
            description,
            author,
            previous_state,
            new_state,
            self.next_timestamp(),
            &self.reserved,
        );

        if let Err(e) = self.store.append_snapshot(snapshot.clone()).await {
            tracing::warn!(
                %e,
                id = %snapshot.id,
                "The live document was updated but its history entry was not recorded"
            );

            return Err(HistoryError::AppendHistory {
                snapshot: Box::new(snapshot),
                source: e,
            });
        }

        tracing::trace!(
            id = %snapshot.id,
            added = snapshot.changes.added.len(),
            modified = snapshot.changes.modified.len(),
            removed = snapshot.changes.removed.len(),
            "Recorded change"
        );

        Ok(snapshot)
    }

    /// Reapplies `snapshot.current_state` as a new forward change. History is
    /// never rewritten; the rollback is itself a snapshot.
    #[tracing::instrument(skip(self, snapshot), fields(snapshot_id = %snapshot.id))]
    pub async fn rollback(&self, snapshot: &Snapshot) -> Result<Snapshot, HistoryError<S::Error>> {
        let previous_state = self.current_state(snapshot.config_type).await?;

        self.record_change(Change {
            config_type: snapshot.config_type,
            action: ChangeAction::Rollback,
            description: format!("Rolled back to {}", snapshot.timestamp.to_rfc3339()),
            author: self.author.clone(),
            previous_state,
            new_state: snapshot.current_state.clone(),
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn rollback_to(&self, id: &SnapshotId) -> Result<Snapshot, HistoryError<S::Error>> {
        let history = self.history().await?;
        let target = history
            .get(id)
            .ok_or_else(|| HistoryError::UnknownSnapshot(id.clone()))?;

        self.rollback(target).await
    }

    pub async fn history(&self) -> Result<HistoryLog, HistoryError<S::Error>> {
        self.store
            .load_history()
            .await
            .inspect_err(|e| tracing::debug!(%e, "Loading the history failed"))
            .map_err(HistoryError::LoadHistory)
    }

    /// Reads the live document, applies `edit` to it locally, and records the
    /// result. Validation failures stop before anything is written.
    #[tracing::instrument(skip(self), fields(config_type = %E::CONFIG_TYPE))]
    pub async fn apply_edit<E: Edit + std::fmt::Debug + Sync>(
        &self,
        edit: &E,
    ) -> Result<Snapshot, HistoryError<S::Error>> {
        let previous_state = self.current_state(E::CONFIG_TYPE).await?;

        let pending = edit
            .apply(previous_state.as_ref().unwrap_or(&Map::new()))
            .inspect_err(|e| tracing::debug!(%e, "Rejected edit"))?;

        self.record_change(Change {
            config_type: E::CONFIG_TYPE,
            action: pending.action,
            description: pending.description,
            author: self.author.clone(),
            previous_state,
            new_state: pending.new_state,
        })
        .await
    }

    /// Delivers the live document (empty when absent) now and after every change.
    pub async fn watch_config<F>(
        &self,
        config_type: ConfigType,
        callback: F,
    ) -> Result<Subscription, HistoryError<S::Error>>
    where
        F: FnMut(Result<Map, SubscriptionError>) + Send + 'static,
    {
        let rx = self
            .store
            .subscribe(config_type)
            .await
            .map_err(|e| HistoryError::Subscribe(config_type.document(), e))?;

        Ok(Subscription::spawn(
            rx,
            |document: &Option<Map>| document.clone().unwrap_or_default(),
            callback,
        ))
    }

    pub async fn watch_history<F>(&self, callback: F) -> Result<Subscription, HistoryError<S::Error>>
    where
        F: FnMut(Result<HistoryLog, SubscriptionError>) + Send + 'static,
    {
        let rx = self
            .store
            .subscribe_history()
            .await
            .map_err(|e| HistoryError::Subscribe(Document::History, e))?;

        Ok(Subscription::spawn(rx, HistoryLog::clone, callback))
    }
}
