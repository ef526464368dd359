use std::time::Duration;

use crate::change::ReservedKeys;
use crate::clock::{Clock, SystemClock};
use crate::history::HistoryService;
use crate::identity::Principal;
use crate::store::{ConfigStore, Stores, StoresError};

#[derive(Default)]
pub struct Builder {
    store: Option<String>,
    author: Option<Principal>,
    reserved_keys: Option<ReservedKeys>,
    poll_interval: Option<Duration>,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            store: None,
            author: None,
            reserved_keys: None,
            poll_interval: None,
        }
    }

    /// Where the documents live: `memory:`, a `file://` URL, or a bare path.
    ///
    /// When unset, `CONFIG_HISTORY_STORE` is read, falling back to the XDG state directory.
    ///
    /// A file store is the shared Config Store itself, for deployments where
    /// every operator sees the same directory. It is not an offline cache of
    /// some remote store, and nothing is synchronized from it elsewhere.
    pub fn set_store(mut self, store: Option<String>) -> Self {
        self.store = store;
        self
    }

    pub fn set_author(mut self, author: Option<Principal>) -> Self {
        self.author = author;
        self
    }

    /// Keys excluded from every diff. Defaults to `metadata`.
    pub fn set_reserved_keys(mut self, reserved_keys: Option<ReservedKeys>) -> Self {
        self.reserved_keys = reserved_keys;
        self
    }

    /// Re-read file stores from disk this often, so subscribers see changes
    /// made by other processes. Ignored for the in-memory store.
    pub fn set_poll_interval(mut self, poll_interval: Option<Duration>) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Opens the configured store.
    ///
    /// ```rust
    /// use config_history::{Builder, FlagEdit, Principal};
    ///
    /// # tokio_test::block_on(async {
    /// let history = Builder::new()
    ///     .set_store(Some("memory:".into()))
    ///     .set_author(Some(Principal::new("ops@example.com")))
    ///     .build()
    ///     .await
    ///     .unwrap();
    ///
    /// let snapshot = history
    ///     .apply_edit(&FlagEdit::Add { name: "dark_mode".into(), enabled: false })
    ///     .await
    ///     .unwrap();
    ///
    /// assert_eq!(snapshot.changes.added, vec!["dark_mode".to_string()]);
    /// assert_eq!(snapshot.author.as_str(), "ops@example.com");
    /// # })
    /// ```
    #[tracing::instrument(skip(self))]
    pub async fn build(mut self) -> Result<HistoryService<Stores>, StoresError> {
        let store = Stores::try_new(self.store.take(), self.poll_interval.take()).await?;

        Ok(self.build_with(store, SystemClock))
    }

    pub fn build_with<S: ConfigStore, C: Clock>(self, store: S, clock: C) -> HistoryService<S, C> {
        HistoryService::new(store, clock)
            .with_principal(self.author.as_ref())
            .with_reserved_keys(self.reserved_keys.unwrap_or_default())
    }
}
