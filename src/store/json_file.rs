use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::OpenOptions;
use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, watch};
use tracing::Instrument;

use super::channels::Channels;
use crate::Map;
use crate::config_type::{ConfigType, Document};
use crate::snapshot::{DuplicateSnapshot, HistoryLog, Snapshot};
use crate::watch::Poller;

const XDG_PREFIX: &str = "config-history";
const XDG_STORE_DIRECTORY: &str = "store";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No HOME is available")]
    NoHome,

    #[error("The storage location `{0}` has no parent directory")]
    LocationHasNoParent(PathBuf),

    #[error("Serializing / deserializing `{0}` failed: {1}")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("Loading from storage failed when opening the file `{0}`: {1}")]
    Open(PathBuf, std::io::Error),

    #[error("Creating `{0}` failed: {1}")]
    Create(PathBuf, std::io::Error),

    #[error("Reading from storage at `{0}` failed: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Writing storage to `{0}` failed: {1}")]
    Write(PathBuf, std::io::Error),

    #[error(transparent)]
    Duplicate(#[from] DuplicateSnapshot),

    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Directory store with one pretty-printed JSON file per document.
///
/// Every write lands in a temporary file first and is renamed over the
/// target, so readers never observe a partial document. Each document has a
/// lock held from persisting through publishing, so subscribers end up on
/// whatever reached the disk last.
pub struct JsonFile {
    root: PathBuf,
    feature_flags_lock: Mutex<()>,
    beta_features_lock: Mutex<()>,
    history_lock: Mutex<()>,
    channels: Channels,
}

impl JsonFile {
    #[tracing::instrument]
    pub async fn open(root: PathBuf) -> Result<Self, Error> {
        for document in Document::ALL {
            let location = document_path(&root, document);
            let directory = parent(&location)?;
            tokio::fs::create_dir_all(&directory)
                .await
                .map_err(|e| Error::Create(directory.clone(), e))?;
        }

        let feature_flags = load(&document_path(&root, ConfigType::FeatureFlags.document())).await?;
        let beta_features = load(&document_path(&root, ConfigType::BetaFeatures.document())).await?;
        let history = load(&document_path(&root, Document::History))
            .await?
            .unwrap_or_default();

        Ok(Self {
            root,
            feature_flags_lock: Mutex::new(()),
            beta_features_lock: Mutex::new(()),
            history_lock: Mutex::new(()),
            channels: Channels::new(feature_flags, beta_features, history),
        })
    }

    pub async fn try_default() -> Result<Self, Error> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        let state_home = xdg_dirs.get_state_home().ok_or(Error::NoHome)?;

        Self::open(state_home.join(XDG_STORE_DIRECTORY)).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-reads every document from disk and notifies subscribers of the ones
    /// that changed underneath this handle.
    #[cfg_attr(feature = "tracing-instrument", tracing::instrument(skip(self)))]
    pub async fn refresh(&self) -> Result<(), Error> {
        for config_type in ConfigType::ALL {
            let _guard = self.live_lock(config_type).lock().await;
            let fresh = load(&self.location(config_type.document())).await?;
            if self.channels.refresh_live(config_type, fresh) {
                tracing::trace!(%config_type, "Picked up an external change");
            }
        }

        let _guard = self.history_lock.lock().await;
        let fresh: HistoryLog = load(&self.location(Document::History))
            .await?
            .unwrap_or_default();
        if self.channels.refresh_history(fresh) {
            tracing::trace!("Picked up external history entries");
        }

        Ok(())
    }

    /// Refreshes from disk every `every`, so writes by other processes reach subscribers.
    pub fn poll(self: &Arc<Self>, every: Duration) -> Poller {
        let store = Arc::downgrade(self);
        let span = tracing::debug_span!("json file poller", root = ?self.root);

        let task = tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(every);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                interval.reset();

                loop {
                    interval.tick().await;

                    let Some(store) = store.upgrade() else {
                        tracing::debug!("Store dropped, shutting down the poller");
                        return;
                    };

                    if let Err(e) = store.refresh().await {
                        tracing::debug!(%e, "Refreshing documents from disk failed");
                    }
                }
            }
            .instrument(span),
        );

        Poller::new(task)
    }

    fn live_lock(&self, config_type: ConfigType) -> &Mutex<()> {
        match config_type {
            ConfigType::FeatureFlags => &self.feature_flags_lock,
            ConfigType::BetaFeatures => &self.beta_features_lock,
        }
    }

    fn location(&self, document: Document) -> PathBuf {
        document_path(&self.root, document)
    }

    #[cfg_attr(feature = "tracing-instrument", tracing::instrument(skip(self, value)))]
    async fn persist<T: Serialize + Sync>(&self, document: Document, value: &T) -> Result<(), Error> {
        let location = self.location(document);
        let directory = parent(&location)?;
        let json =
            serde_json::to_string_pretty(value).map_err(|e| Error::Json(location.clone(), e))?;

        tracing::trace!(%document, "Storing document");
        let target = location.clone();
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            let mut tempfile = tempfile::NamedTempFile::new_in(&directory)
                .map_err(|e| Error::Create(directory.clone(), e))?;

            tempfile
                .write_all(json.as_bytes())
                .map_err(|e| Error::Write(tempfile.path().into(), e))?;

            tempfile.persist(&target)?;

            Ok(())
        })
        .await??;

        tracing::trace!(?location, "Document persisted");

        Ok(())
    }
}

fn document_path(root: &Path, document: Document) -> PathBuf {
    root.join(format!("{}.json", document.path()))
}

fn parent(location: &Path) -> Result<PathBuf, Error> {
    location
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::LocationHasNoParent(location.to_path_buf()))
}

/// `None` when the file does not exist yet.
async fn load<T: DeserializeOwned + Send>(location: &Path) -> Result<Option<T>, Error> {
    let mut file = match OpenOptions::new()
        .read(true)
        .write(false)
        .create(false)
        .truncate(false)
        .open(location)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Open(location.to_path_buf(), e)),
    };

    let mut contents = vec![];
    file.read_to_end(&mut contents)
        .await
        .map_err(|e| Error::Read(location.to_path_buf(), e))?;

    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|e| Error::Json(location.to_path_buf(), e))
}

impl super::ConfigStore for JsonFile {
    type Error = Error;

    async fn read(&self, config_type: ConfigType) -> Result<Option<Map>, Error> {
        load(&self.location(config_type.document())).await
    }

    async fn write(&self, config_type: ConfigType, document: Map) -> Result<(), Error> {
        let _guard = self.live_lock(config_type).lock().await;

        self.persist(config_type.document(), &document).await?;
        self.channels.live(config_type).send_replace(Some(document));
        Ok(())
    }

    async fn append_snapshot(&self, snapshot: Snapshot) -> Result<(), Error> {
        let _guard = self.history_lock.lock().await;

        let mut log: HistoryLog = load(&self.location(Document::History))
            .await?
            .unwrap_or_default();
        let id = snapshot.id.clone();
        log.try_insert(snapshot)?;

        self.persist(Document::History, &log).await?;
        tracing::trace!(%id, "Snapshot appended");

        self.channels.history().send_replace(log);
        Ok(())
    }

    async fn load_history(&self) -> Result<HistoryLog, Error> {
        Ok(load(&self.location(Document::History))
            .await?
            .unwrap_or_default())
    }

    async fn subscribe(&self, config_type: ConfigType) -> Result<watch::Receiver<Option<Map>>, Error> {
        Ok(self.channels.live(config_type).subscribe())
    }

    async fn subscribe_history(&self) -> Result<watch::Receiver<HistoryLog>, Error> {
        Ok(self.channels.history().subscribe())
    }
}
