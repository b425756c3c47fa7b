use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// event tag carried by every upload progress notification
pub const UPLOAD_PROGRESS_EVENT: &str = "file-upload-progress";

// buffered notifications per subscriber before slow readers start lagging
const SUBSCRIBER_BUFFER: usize = 64;

/// opaque handle naming whoever should hear about an upload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// cumulative progress of one file, built fresh for each emission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub filename: String,
    pub processed_already: u64,
}

/// what actually travels to a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub event: &'static str,
    pub payload: ProgressEvent,
}

/// "send to subscriber S" primitive of the real-time transport
///
/// delivery is fire-and-forget: nobody listening is not an error.
pub trait Notifier: Send + Sync {
    fn send_to(&self, subscriber: &SubscriberId, event: &'static str, payload: &ProgressEvent);
}

/// in-process transport: one broadcast channel per subscriber id
#[derive(Default)]
pub struct SubscriberHub {
    channels: Arc<DashMap<SubscriberId, broadcast::Sender<Notification>>>,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// attach a listener, creating the subscriber's channel on first use
    pub fn subscribe(&self, subscriber: &SubscriberId) -> Subscription {
        let receiver = self
            .channels
            .entry(subscriber.clone())
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_BUFFER).0)
            .subscribe();

        Subscription {
            subscriber: subscriber.clone(),
            receiver: Some(receiver),
            channels: Arc::clone(&self.channels),
        }
    }

    /// number of subscribers that currently have a channel
    pub fn subscriber_count(&self) -> usize {
        self.channels.len()
    }
}

/// one listener attached to a subscriber's channel
///
/// dropping the last listener of a subscriber removes its channel.
pub struct Subscription {
    subscriber: SubscriberId,
    receiver: Option<broadcast::Receiver<Notification>>,
    channels: Arc<DashMap<SubscriberId, broadcast::Sender<Notification>>>,
}

impl Subscription {
    pub fn subscriber(&self) -> &SubscriberId {
        &self.subscriber
    }

    /// next notification, skipping over anything lost to lag
    ///
    /// `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(
                        "Subscriber {} lagging, skipped {} notifications",
                        self.subscriber,
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<Notification, TryRecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.try_recv(),
            None => Err(TryRecvError::Closed),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // release our receiver first so the count below no longer includes it
        drop(self.receiver.take());
        let pruned = self
            .channels
            .remove_if(&self.subscriber, |_, tx| tx.receiver_count() == 0);
        if pruned.is_some() {
            tracing::debug!("Subscriber {} disconnected, pruning channel", self.subscriber);
        }
    }
}

impl Notifier for SubscriberHub {
    fn send_to(&self, subscriber: &SubscriberId, event: &'static str, payload: &ProgressEvent) {
        let notification = Notification {
            event,
            payload: payload.clone(),
        };

        let delivered = match self.channels.get(subscriber) {
            Some(tx) => tx.send(notification).is_ok(),
            None => {
                tracing::trace!("No listener for subscriber {}, dropping {}", subscriber, event);
                return;
            }
        };

        if !delivered {
            // every receiver hung up
            tracing::debug!("Subscriber {} disconnected, pruning channel", subscriber);
            self.channels
                .remove_if(subscriber, |_, tx| tx.receiver_count() == 0);
        }
    }
}
