//! Room registry, fan-out, and the per-connection reader/writer loops.
//!
//! The registry is one `HashMap` behind one lock. Fan-out holds the lock for
//! the whole iteration so every broadcast sees a consistent membership, but
//! it only ever performs non-blocking enqueues. Socket I/O happens in each
//! subscriber's own writer loop.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use pointer_common::id::{prefix, prefixed_ulid, short_suffix};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use super::events::{decode_inbound, now_ms, MoveMessage};
use super::session::SessionError;
use super::subscriber::{Enqueue, Payload, Subscriber};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("subscriber {0} is already registered")]
    DuplicateIdentity(String),

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub queued: usize,
    pub evicted: usize,
}

impl Delivery {
    fn record(&mut self, outcome: Enqueue) {
        match outcome {
            Enqueue::Queued => self.queued += 1,
            Enqueue::Overflowed => self.evicted += 1,
            Enqueue::Closed => {}
        }
    }
}

/// Room-level tuning, fixed at construction.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub name: String,
    pub queue_capacity: usize,
    pub write_timeout: Duration,
}

/// A broadcast domain of subscribers.
pub struct Room {
    pub id: String,
    pub name: String,
    queue_capacity: usize,
    write_timeout: Duration,
    subscribers: Mutex<HashMap<String, Arc<Subscriber>>>,
}

impl Room {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            id: prefixed_ulid(prefix::ROOM),
            name: settings.name,
            queue_capacity: settings.queue_capacity.max(1),
            write_timeout: settings.write_timeout,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Register a subscriber. Fails only if its ID is already present.
    pub fn add_subscriber(&self, subscriber: Arc<Subscriber>) -> Result<(), RoomError> {
        let mut subscribers = self.subscribers.lock();
        insert_unique(&mut subscribers, subscriber)
    }

    /// Unregister a subscriber. Returns `false` if it was not registered.
    pub fn delete_subscriber(&self, subscriber: &Subscriber) -> bool {
        let removed = self.subscribers.lock().remove(&subscriber.id).is_some();
        if removed {
            tracing::debug!(subscriber_id = %subscriber.id, room = %self.name, "subscriber removed");
        }
        removed
    }

    /// Snapshot of the current subscribers. Stale as soon as it returns.
    pub fn list_subscribers(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.lock().values().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn get_subscriber(&self, id: &str) -> Option<Arc<Subscriber>> {
        self.subscribers.lock().get(id).cloned()
    }

    /// Pick a display name not used by anyone currently in the room.
    ///
    /// Draws from `next` up to `1 + retries` times. If every draw collides,
    /// the last draw gets the tail of `id` appended, which is unique because
    /// IDs are.
    pub fn allocate_name(&self, mut next: impl FnMut() -> String, retries: usize, id: &str) -> String {
        let taken: Vec<String> = self
            .subscribers
            .lock()
            .values()
            .map(|s| s.name.clone())
            .collect();

        let mut name = next();
        for _ in 0..retries {
            if !taken.contains(&name) {
                return name;
            }
            name = next();
        }
        if !taken.contains(&name) {
            return name;
        }
        tracing::debug!(%name, retries, "display name still taken, adding suffix");
        format!("{name}-{}", short_suffix(id, 4))
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Send to every subscriber, including any sender.
    pub fn broadcast<T: Serialize>(&self, message: &T) -> Result<Delivery, RoomError> {
        let payload = encode(message)?;
        Ok(self.fan_out(payload, None))
    }

    /// Send to every subscriber except `sender`.
    pub fn broadcast_exclusive<T: Serialize>(
        &self,
        sender: &Subscriber,
        message: &T,
    ) -> Result<Delivery, RoomError> {
        let payload = encode(message)?;
        Ok(self.fan_out(payload, Some(&sender.id)))
    }

    /// Send to one subscriber, with the same overflow policy as broadcasts.
    pub fn respond<T: Serialize>(&self, target: &Subscriber, message: &T) -> Result<Enqueue, RoomError> {
        let payload = encode(message)?;
        Ok(target.try_enqueue(payload))
    }

    fn fan_out(&self, payload: Payload, skip: Option<&str>) -> Delivery {
        let mut delivery = Delivery::default();
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.values() {
            if skip == Some(subscriber.id.as_str()) {
                continue;
            }
            delivery.record(subscriber.try_enqueue(payload.clone()));
        }
        delivery
    }

    // -----------------------------------------------------------------------
    // Join / leave
    // -----------------------------------------------------------------------

    /// Register `subscriber`, greet it with a HANDSHAKE, and announce it.
    ///
    /// The handshake is queued under the same lock as the insert, so it is
    /// always the first frame the subscriber receives. An error means the
    /// subscriber was not registered; a failed announcement is only logged.
    pub fn join(&self, subscriber: Arc<Subscriber>) -> Result<(), RoomError> {
        let handshake = encode(&MoveMessage::handshake(&subscriber.id))?;
        {
            let mut subscribers = self.subscribers.lock();
            insert_unique(&mut subscribers, subscriber.clone())?;
            subscriber.try_enqueue(handshake);
        }

        match self.broadcast_exclusive(&subscriber, &MoveMessage::player_joined(&subscriber.id)) {
            Ok(delivery) => tracing::debug!(
                subscriber_id = %subscriber.id,
                notified = delivery.queued,
                "announced new player"
            ),
            Err(err) => {
                tracing::error!(%err, subscriber_id = %subscriber.id, "failed to announce new player")
            }
        }
        Ok(())
    }

    /// Unregister `subscriber` and tell the others it left.
    ///
    /// Safe to call more than once; only the call that removes the
    /// subscriber announces the departure.
    pub fn leave(&self, subscriber: &Subscriber) {
        if !self.delete_subscriber(subscriber) {
            return;
        }
        if let Err(err) = self.broadcast(&MoveMessage::player_left(&subscriber.id)) {
            tracing::error!(%err, subscriber_id = %subscriber.id, "failed to announce departure");
        }
    }

    // -----------------------------------------------------------------------
    // Session loops
    // -----------------------------------------------------------------------

    /// Drain `queue` onto `sink` until a write fails, a write misses the
    /// deadline, or the subscriber's session is cancelled.
    pub async fn write_loop<W>(
        &self,
        subscriber: &Subscriber,
        mut queue: mpsc::Receiver<Payload>,
        sink: &mut W,
    ) -> SessionError
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        let cancelled = subscriber.closer().token().clone();
        loop {
            let payload = tokio::select! {
                biased;
                _ = cancelled.cancelled() => return SessionError::Cancelled,
                next = queue.recv() => match next {
                    Some(payload) => payload,
                    None => return SessionError::Cancelled,
                },
            };

            tracing::trace!(bytes = payload.as_str().len(), "writing frame");
            let write = tokio::time::timeout(self.write_timeout, sink.send(Message::Text(payload)));
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => return SessionError::Cancelled,
                result = write => match result {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => return SessionError::Write(err.to_string()),
                    Err(_elapsed) => return SessionError::WriteTimeout(self.write_timeout),
                },
            }
        }
    }

    /// Read frames from `stream` and relay each decoded move to everyone
    /// else, until the peer closes, a read fails, or the session is cancelled.
    pub async fn read_loop<R, E>(&self, subscriber: &Subscriber, stream: &mut R) -> SessionError
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let cancelled = subscriber.closer().token().clone();
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancelled.cancelled() => return SessionError::Cancelled,
                frame = stream.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => self.relay(subscriber, text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.relay(subscriber, text),
                    Err(_) => tracing::debug!(len = bytes.len(), "discarding non-utf8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    return SessionError::RemoteClosed {
                        code: frame.map(|f| f.code),
                    }
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(err)) => return SessionError::Read(err.to_string()),
                None => return SessionError::RemoteClosed { code: None },
            }
        }
    }

    /// Decode one inbound frame and pass it on. Malformed frames are dropped.
    fn relay(&self, sender: &Subscriber, text: &str) {
        let mut message = match decode_inbound(text, now_ms()) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(%err, "discarding inbound frame");
                return;
            }
        };
        message.claim_user_id(&sender.id);

        tracing::trace!(
            coords = ?message.coords,
            mouse_down = message.mouse_down,
            up_ping = ?message.up_ping,
            "relaying move"
        );
        if let Err(err) = self.broadcast_exclusive(sender, &message) {
            tracing::error!(%err, "failed to relay move");
        }
    }
}

fn insert_unique(
    subscribers: &mut HashMap<String, Arc<Subscriber>>,
    subscriber: Arc<Subscriber>,
) -> Result<(), RoomError> {
    if subscribers.contains_key(&subscriber.id) {
        return Err(RoomError::DuplicateIdentity(subscriber.id.clone()));
    }
    subscribers.insert(subscriber.id.clone(), subscriber);
    Ok(())
}

fn encode<T: Serialize>(message: &T) -> Result<Payload, RoomError> {
    Ok(serde_json::to_string(message)?.into())
}
