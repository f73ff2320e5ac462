//! Bounded, best-effort broadcast of physical interactions.
//!
//! Uses a [`tokio::sync::broadcast`] channel under the hood so that every
//! subscriber receives every event without any single subscriber blocking
//! the publisher.  Interaction callbacks arrive on a latency-sensitive
//! device thread, so [`InteractionBus::publish`] never waits: a subscriber
//! that falls more than `capacity` events behind loses the oldest ones.

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tracing::warn;
use votebot_types::InteractionEvent;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 64;

/// Shared interaction bus.  Clone it cheaply – all clones share the same
/// underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct InteractionBus {
    sender: broadcast::Sender<InteractionEvent>,
}

impl InteractionBus {
    /// Create a new bus buffering up to `capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish one interaction event.
    ///
    /// Returns the number of subscribers that were handed the event.  Having
    /// no subscribers is a normal condition and returns `0`.
    pub fn publish(&self) -> usize {
        self.sender.send(InteractionEvent).unwrap_or(0)
    }

    pub fn subscribe(&self) -> InteractionSubscriber {
        InteractionSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Convenience: subscribe and expose the subscription as a stream.
    pub fn stream(&self) -> BoxStream<'static, InteractionEvent> {
        self.subscribe().into_stream()
    }
}

impl Default for InteractionBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A single subscription to the [`InteractionBus`].
pub struct InteractionSubscriber {
    receiver: broadcast::Receiver<InteractionEvent>,
}

impl InteractionSubscriber {
    /// Wait for the next interaction.
    ///
    /// Returns `None` once every bus handle has been dropped.  Lag is logged
    /// and skipped: the events carry no payload, so losing some of a burst
    /// changes nothing for the subscriber.
    pub async fn recv(&mut self) -> Option<InteractionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "interaction subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv].  Returns `None` when no
    /// event is buffered.
    pub fn try_recv(&mut self) -> Option<InteractionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "interaction subscriber lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, InteractionEvent> {
        stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
        .boxed()
    }
}
