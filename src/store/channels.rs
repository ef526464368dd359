use tokio::sync::watch;

use crate::Map;
use crate::config_type::ConfigType;
use crate::snapshot::HistoryLog;

/// Latest committed value of each document, fanned out to subscribers.
pub(crate) struct Channels {
    feature_flags: watch::Sender<Option<Map>>,
    beta_features: watch::Sender<Option<Map>>,
    history: watch::Sender<HistoryLog>,
}

impl Channels {
    pub(crate) fn new(
        feature_flags: Option<Map>,
        beta_features: Option<Map>,
        history: HistoryLog,
    ) -> Self {
        Self {
            feature_flags: watch::Sender::new(feature_flags),
            beta_features: watch::Sender::new(beta_features),
            history: watch::Sender::new(history),
        }
    }

    pub(crate) fn live(&self, config_type: ConfigType) -> &watch::Sender<Option<Map>> {
        match config_type {
            ConfigType::FeatureFlags => &self.feature_flags,
            ConfigType::BetaFeatures => &self.beta_features,
        }
    }

    pub(crate) fn history(&self) -> &watch::Sender<HistoryLog> {
        &self.history
    }

    /// Publishes `document` only if it differs from what subscribers last saw.
    pub(crate) fn refresh_live(&self, config_type: ConfigType, document: Option<Map>) -> bool {
        self.live(config_type).send_if_modified(|current| {
            if *current == document {
                return false;
            }
            *current = document;
            true
        })
    }

    pub(crate) fn refresh_history(&self, log: HistoryLog) -> bool {
        self.history.send_if_modified(|current| {
            if *current == log {
                return false;
            }
            *current = log;
            true
        })
    }
}
