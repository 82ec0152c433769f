//! Values of the notify characteristics.
//!
//! A [`CharacteristicValue`] holds the readable value of one characteristic
//! together with its notification subscribers. Setting the value and pushing
//! it to every subscriber happen under one lock, so concurrent publishers of
//! the same characteristic never interleave. There is no queueing or
//! coalescing: each publish is delivered as-is.

use crate::network::IpSnapshot;
use log::{debug, warn};
use std::fmt;
use std::future::Future;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use super::CharacteristicRole;

/// Status value while the internet is reachable.
pub const STATUS_ONLINE: &[u8] = b"online";

/// Status value otherwise, including when reachability is unknown.
pub const STATUS_OFFLINE: &[u8] = b"offline";

/// One central's notification subscription.
pub trait NotifySession: Send {
    type Error: fmt::Display;

    /// Resolves once the central has unsubscribed or disconnected.
    fn stopped(&mut self) -> impl Future<Output = ()> + Send;

    /// Push one value to the central.
    fn notify(&mut self, value: Vec<u8>) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Debug, Default)]
struct ValueState {
    value: Vec<u8>,
    subscribers: Vec<mpsc::UnboundedSender<Vec<u8>>>,
}

/// Current value and subscribers of one read/notify characteristic.
#[derive(Debug)]
pub struct CharacteristicValue {
    uuid: Uuid,
    state: Mutex<ValueState>,
}

impl CharacteristicValue {
    /// Empty value, no subscribers.
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            state: Mutex::new(ValueState::default()),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Value a read request gets.
    pub async fn read(&self) -> Vec<u8> {
        self.state.lock().await.value.clone()
    }

    /// Receive every value set from now on. Dropping the receiver unsubscribes.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.push(tx);
        rx
    }

    /// Forward every value set from now on to `session` until it stops.
    pub async fn forward<S: NotifySession>(&self, session: &mut S) {
        let mut rx = self.subscribe().await;
        loop {
            let value = tokio::select! {
                _ = session.stopped() => break,
                next = rx.recv() => match next {
                    Some(value) => value,
                    None => break,
                },
            };
            if let Err(e) = session.notify(value).await {
                debug!("Notification session for {} ended: {}", self.uuid, e);
                break;
            }
        }
        drop(rx);
        self.state
            .lock()
            .await
            .subscribers
            .retain(|tx| !tx.is_closed());
    }

    /// Set the value and notify subscribers. Returns how many were notified.
    pub async fn set(&self, value: Vec<u8>) -> usize {
        let mut state = self.state.lock().await;
        Self::store(&mut state, value)
    }

    /// Serialize and set as one step with respect to other publishers.
    ///
    /// On a serialization error the old value stays.
    pub async fn set_with<F, E>(&self, serialize: F) -> Result<usize, E>
    where
        F: FnOnce() -> Result<Vec<u8>, E>,
    {
        let mut state = self.state.lock().await;
        let value = serialize()?;
        Ok(Self::store(&mut state, value))
    }

    #[cfg(test)]
    pub(crate) async fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().await;
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    fn store(state: &mut ValueState, value: Vec<u8>) -> usize {
        state
            .subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
        state.value = value;
        state.subscribers.len()
    }
}

/// Writes workflow results onto the Status and IP characteristics.
#[derive(Debug)]
pub struct StatusPublisher {
    status: CharacteristicValue,
    ip: CharacteristicValue,
}

impl StatusPublisher {
    pub fn new() -> Self {
        Self {
            status: CharacteristicValue::new(CharacteristicRole::Status.uuid()),
            ip: CharacteristicValue::new(CharacteristicRole::Ip.uuid()),
        }
    }

    pub fn status(&self) -> &CharacteristicValue {
        &self.status
    }

    pub fn ip(&self) -> &CharacteristicValue {
        &self.ip
    }

    /// The value backing `uuid`, if it is one of the response characteristics.
    pub fn value_for(&self, uuid: Uuid) -> Option<&CharacteristicValue> {
        if uuid == self.status.uuid() {
            Some(&self.status)
        } else if uuid == self.ip.uuid() {
            Some(&self.ip)
        } else {
            None
        }
    }

    /// Publish `online` / `offline`.
    pub async fn publish_status(&self, online: bool) {
        let value = if online { STATUS_ONLINE } else { STATUS_OFFLINE };
        let notified = self.status.set(value.to_vec()).await;
        debug!(
            "Published status {} to {} subscriber(s)",
            String::from_utf8_lossy(value),
            notified
        );
    }

    /// Publish the snapshot as compact JSON.
    pub async fn publish_ip(&self, snapshot: &IpSnapshot) {
        match self.ip.set_with(|| snapshot.to_bytes()).await {
            Ok(notified) => debug!("Published IP snapshot to {} subscriber(s)", notified),
            Err(e) => warn!("Failed to serialize IP snapshot: {}", e),
        }
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
