use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("The store closed the subscription")]
    Closed,
}

/// A standing observer registration. The callback receives the latest committed
/// value once on registration and again after every change.
///
/// Dropping the handle cancels the registration.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn spawn<T, U, M, F>(mut rx: watch::Receiver<T>, map: M, mut callback: F) -> Self
    where
        T: Send + Sync + 'static,
        U: Send + 'static,
        M: Fn(&T) -> U + Send + 'static,
        F: FnMut(Result<U, SubscriptionError>) + Send + 'static,
    {
        let task = tokio::spawn(
            async move {
                loop {
                    let value = {
                        let current = rx.borrow_and_update();
                        map(&current)
                    };
                    callback(Ok(value));

                    if rx.changed().await.is_err() {
                        tracing::debug!("Store hung up, ending the subscription");
                        callback(Err(SubscriptionError::Closed));
                        return;
                    }
                }
            }
            .instrument(tracing::debug_span!("subscription")),
        );

        Self { task }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Background task refreshing a store from its backing medium. Stops when dropped.
#[derive(Debug)]
pub struct Poller {
    task: JoinHandle<()>,
}

impl Poller {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
