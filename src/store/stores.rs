use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use url::Url;

use super::{ConfigStore, Generic, JsonFile, generic, json_file};
use crate::Map;
use crate::config_type::ConfigType;
use crate::snapshot::{HistoryLog, Snapshot};
use crate::watch::Poller;

pub(crate) const STORE_ENV_VAR: &str = "CONFIG_HISTORY_STORE";

/// The store selected by the builder from a location string.
pub enum Stores {
    Memory(Generic),
    File {
        store: Arc<JsonFile>,
        poller: Option<Poller>,
    },
}

impl Stores {
    pub fn memory() -> Self {
        Stores::Memory(Generic::default())
    }

    /// Accepts `memory:`, a `file://` URL, or a bare filesystem path. Without a
    /// location, `CONFIG_HISTORY_STORE` is consulted, then the XDG state directory.
    #[cfg_attr(feature = "tracing-instrument", tracing::instrument(err(level = tracing::Level::TRACE)))]
    pub async fn try_new(
        location: Option<String>,
        poll_interval: Option<Duration>,
    ) -> Result<Self, StoresError> {
        let location = location.or_else(|| std::env::var(STORE_ENV_VAR).ok());

        let Some(value) = location else {
            tracing::debug!("No store location configured, using the XDG state directory");
            let store = JsonFile::try_default().await?;
            return Ok(Self::file(store, poll_interval));
        };

        let url = match Url::parse(&value) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                tracing::debug!(%value, "Treating the store location as a path");
                let store = JsonFile::open(PathBuf::from(value)).await?;
                return Ok(Self::file(store, poll_interval));
            }
            Err(e) => return Err(e.into()),
        };

        match url.scheme() {
            "memory" => Ok(Self::memory()),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| StoresError::InvalidFilePath(value.clone()))?;
                let store = JsonFile::open(path).await?;
                Ok(Self::file(store, poll_interval))
            }
            _ => Err(StoresError::UnknownUrlScheme),
        }
    }

    fn file(store: JsonFile, poll_interval: Option<Duration>) -> Self {
        let store = Arc::new(store);
        let poller = poll_interval.map(|every| store.poll(every));

        Stores::File { store, poller }
    }
}

impl ConfigStore for Stores {
    type Error = StoresError;

    async fn read(&self, config_type: ConfigType) -> Result<Option<Map>, Self::Error> {
        match self {
            Self::Memory(s) => Ok(s.read(config_type).await?),
            Self::File { store, .. } => Ok(store.read(config_type).await?),
        }
    }

    async fn write(&self, config_type: ConfigType, document: Map) -> Result<(), Self::Error> {
        match self {
            Self::Memory(s) => Ok(s.write(config_type, document).await?),
            Self::File { store, .. } => Ok(store.write(config_type, document).await?),
        }
    }

    async fn append_snapshot(&self, snapshot: Snapshot) -> Result<(), Self::Error> {
        match self {
            Self::Memory(s) => Ok(s.append_snapshot(snapshot).await?),
            Self::File { store, .. } => Ok(store.append_snapshot(snapshot).await?),
        }
    }

    async fn load_history(&self) -> Result<HistoryLog, Self::Error> {
        match self {
            Self::Memory(s) => Ok(s.load_history().await?),
            Self::File { store, .. } => Ok(store.load_history().await?),
        }
    }

    async fn subscribe(
        &self,
        config_type: ConfigType,
    ) -> Result<watch::Receiver<Option<Map>>, Self::Error> {
        match self {
            Self::Memory(s) => Ok(s.subscribe(config_type).await?),
            Self::File { store, .. } => Ok(store.subscribe(config_type).await?),
        }
    }

    async fn subscribe_history(&self) -> Result<watch::Receiver<HistoryLog>, Self::Error> {
        match self {
            Self::Memory(s) => Ok(s.subscribe_history().await?),
            Self::File { store, .. } => Ok(store.subscribe_history().await?),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoresError {
    #[error(transparent)]
    Memory(#[from] generic::Error),

    #[error(transparent)]
    File(#[from] json_file::Error),

    #[error("Only memory: and file: store locations are supported.")]
    UnknownUrlScheme,

    #[error("`{0}` is not a usable file path")]
    InvalidFilePath(String),

    #[error(transparent)]
    Parse(#[from] url::ParseError),
}
