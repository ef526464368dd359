use tokio::sync::watch;

use super::channels::Channels;
use crate::Map;
use crate::config_type::ConfigType;
use crate::snapshot::{DuplicateSnapshot, HistoryLog, Snapshot};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Duplicate(#[from] DuplicateSnapshot),
}

/// In-memory store. Every document lives in its subscription channel.
pub struct Generic {
    channels: Channels,
}

impl Default for Generic {
    fn default() -> Self {
        Self {
            channels: Channels::new(None, None, HistoryLog::default()),
        }
    }
}

impl Generic {
    pub fn with_documents(feature_flags: Option<Map>, beta_features: Option<Map>) -> Self {
        Self {
            channels: Channels::new(feature_flags, beta_features, HistoryLog::default()),
        }
    }
}

impl super::ConfigStore for Generic {
    type Error = Error;

    async fn read(&self, config_type: ConfigType) -> Result<Option<Map>, Self::Error> {
        Ok(self.channels.live(config_type).borrow().clone())
    }

    async fn write(&self, config_type: ConfigType, document: Map) -> Result<(), Self::Error> {
        self.channels.live(config_type).send_replace(Some(document));
        Ok(())
    }

    async fn append_snapshot(&self, snapshot: Snapshot) -> Result<(), Self::Error> {
        let mut outcome = Ok(());

        self.channels
            .history()
            .send_if_modified(|log| match log.try_insert(snapshot) {
                Ok(()) => true,
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            });

        Ok(outcome?)
    }

    async fn load_history(&self) -> Result<HistoryLog, Self::Error> {
        Ok(self.channels.history().borrow().clone())
    }

    async fn subscribe(
        &self,
        config_type: ConfigType,
    ) -> Result<watch::Receiver<Option<Map>>, Self::Error> {
        Ok(self.channels.live(config_type).subscribe())
    }

    async fn subscribe_history(&self) -> Result<watch::Receiver<HistoryLog>, Self::Error> {
        Ok(self.channels.history().subscribe())
    }
}
