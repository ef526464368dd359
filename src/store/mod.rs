use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::Map;
use crate::config_type::ConfigType;
use crate::snapshot::{HistoryLog, Snapshot};

mod channels;
mod generic;
pub mod json_file;
mod stores;

pub use generic::{Error as GenericError, Generic};
pub use json_file::JsonFile;
pub use stores::{Stores, StoresError};

/// The document store holding the two live documents and the history log.
///
/// Live documents are only ever replaced whole. The history log only ever
/// grows by one snapshot at a time. Concurrent physical writes are serialized
/// by the store; nothing above it is transactional.
pub trait ConfigStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// `None` when the document has never been written.
    fn read(
        &self,
        config_type: ConfigType,
    ) -> impl Future<Output = Result<Option<Map>, Self::Error>> + Send;

    fn write(
        &self,
        config_type: ConfigType,
        document: Map,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Adds one snapshot without disturbing existing ones. An id that is
    /// already present is an error.
    fn append_snapshot(
        &self,
        snapshot: Snapshot,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn load_history(&self) -> impl Future<Output = Result<HistoryLog, Self::Error>> + Send;

    /// The receiver observes the current value immediately and every committed write after.
    fn subscribe(
        &self,
        config_type: ConfigType,
    ) -> impl Future<Output = Result<watch::Receiver<Option<Map>>, Self::Error>> + Send;

    fn subscribe_history(
        &self,
    ) -> impl Future<Output = Result<watch::Receiver<HistoryLog>, Self::Error>> + Send;
}

impl<S: ConfigStore> ConfigStore for Arc<S> {
    type Error = S::Error;

    async fn read(&self, config_type: ConfigType) -> Result<Option<Map>, Self::Error> {
        (**self).read(config_type).await
    }

    async fn write(&self, config_type: ConfigType, document: Map) -> Result<(), Self::Error> {
        (**self).write(config_type, document).await
    }

    async fn append_snapshot(&self, snapshot: Snapshot) -> Result<(), Self::Error> {
        (**self).append_snapshot(snapshot).await
    }

    async fn load_history(&self) -> Result<HistoryLog, Self::Error> {
        (**self).load_history().await
    }

    async fn subscribe(
        &self,
        config_type: ConfigType,
    ) -> Result<watch::Receiver<Option<Map>>, Self::Error> {
        (**self).subscribe(config_type).await
    }

    async fn subscribe_history(&self) -> Result<watch::Receiver<HistoryLog>, Self::Error> {
        (**self).subscribe_history().await
    }
}
