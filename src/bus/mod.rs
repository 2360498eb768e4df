//! Message Bus Module
//!
//! This module provides the message bus that decouples transport channels
//! from the agent. The `MessageBus` owns two [`BoundedQueue`]s and a table of
//! per-channel delivery callbacks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Channel   │────>│  MessageBus │────>│  AgentLoop  │
//! │ (UART/MQTT) │     │  (inbound)  │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                                       │
//!        │ callback                              │ publish_outbound
//!        │                                       ▼
//! ┌─────────────┐                         ┌─────────────┐
//! │ subscribers │<────dispatch_outbound───│  (outbound) │
//! └─────────────┘                         └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use chipclaw::bus::{MessageBus, InboundMessage};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = MessageBus::new();
//!
//!     let msg = InboundMessage::new("uart", "uart_user", "uart_default", "Hello");
//!     bus.publish_inbound(msg).await.unwrap();
//!
//!     if let Some(received) = bus.consume_inbound().await {
//!         println!("Received: {}", received.content);
//!     }
//! }
//! ```

pub mod message;
pub mod queue;

pub use message::{InboundMessage, OutboundMessage};
pub use queue::BoundedQueue;

use crate::error::{ChipClawError, Result};
use crate::utils::panic_message;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use queue::TryPutError;

/// Default capacity for both the inbound and outbound queues
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Pause applied by the dispatcher after a queue-level fault before it resumes
pub const DISPATCH_BACKOFF: Duration = Duration::from_millis(100);

/// Async delivery callback registered for one channel name.
pub type OutboundCallback =
    Arc<dyn Fn(OutboundMessage) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Snapshot of the dispatcher's delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages handed to a subscriber that returned `Ok`
    pub delivered: u64,
    /// Messages dropped because no subscriber was registered for their channel
    pub undeliverable: u64,
    /// Messages whose subscriber returned an error
    pub failed: u64,
}

#[derive(Default)]
struct DispatchCounters {
    delivered: AtomicU64,
    undeliverable: AtomicU64,
    failed: AtomicU64,
}

/// The central message bus for routing messages between channels and the agent.
///
/// Inbound messages flow from channels to the agent loop; outbound messages
/// flow from the agent (or a tool) to whichever callback is subscribed for
/// the message's channel. A channel name maps to at most one callback and a
/// later registration replaces the earlier one.
pub struct MessageBus {
    inbound: BoundedQueue<InboundMessage>,
    outbound: BoundedQueue<OutboundMessage>,
    subscribers: RwLock<HashMap<String, OutboundCallback>>,
    dispatching: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    counters: DispatchCounters,
}

impl MessageBus {
    /// Creates a new `MessageBus` with the default capacity of 100 per queue.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, DEFAULT_BUFFER_SIZE)
    }

    /// Creates a new `MessageBus` with custom queue capacities (`0` = unbounded).
    ///
    /// # Example
    /// ```
    /// use chipclaw::bus::MessageBus;
    ///
    /// let bus = MessageBus::with_capacity(10, 0);
    /// assert_eq!(bus.inbound_len(), 0);
    /// ```
    pub fn with_capacity(inbound: usize, outbound: usize) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inbound: BoundedQueue::new(inbound),
            outbound: BoundedQueue::new(outbound),
            subscribers: RwLock::new(HashMap::new()),
            dispatching: AtomicBool::new(false),
            shutdown_tx,
            counters: DispatchCounters::default(),
        }
    }

    /// Publishes an inbound message, suspending while the inbound queue is full.
    ///
    /// # Errors
    /// Returns `ChipClawError::BusClosed` if the bus has been closed.
    pub async fn publish_inbound(&self, msg: InboundMessage) -> Result<()> {
        self.inbound
            .put(msg)
            .await
            .map_err(|_| ChipClawError::BusClosed)
    }

    /// Publishes an inbound message without suspending.
    ///
    /// # Returns
    /// - `Ok(())` if the message was queued
    /// - `Err(ChipClawError::Channel)` if the inbound queue is full
    /// - `Err(ChipClawError::BusClosed)` if the bus has been closed
    pub fn try_publish_inbound(&self, msg: InboundMessage) -> Result<()> {
        self.inbound.put_nowait(msg).map_err(|e| match e {
            TryPutError::Full(_) => ChipClawError::Channel("inbound buffer full".to_string()),
            TryPutError::Closed(_) => ChipClawError::BusClosed,
        })
    }

    /// Consumes the next inbound message, suspending while none is queued.
    ///
    /// Returns `None` once the bus is closed and the inbound queue is drained.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        self.inbound.get().await
    }

    /// Publishes an outbound message, suspending while the outbound queue is full.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> Result<()> {
        self.outbound
            .put(msg)
            .await
            .map_err(|_| ChipClawError::BusClosed)
    }

    /// Publishes an outbound message without suspending.
    pub fn try_publish_outbound(&self, msg: OutboundMessage) -> Result<()> {
        self.outbound.put_nowait(msg).map_err(|e| match e {
            TryPutError::Full(_) => ChipClawError::Channel("outbound buffer full".to_string()),
            TryPutError::Closed(_) => ChipClawError::BusClosed,
        })
    }

    /// Takes the next outbound message directly, bypassing the subscription table.
    ///
    /// Only useful when no dispatcher is running.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound.get().await
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Registers the delivery callback for `channel`, replacing any previous one.
    ///
    /// # Example
    /// ```
    /// use chipclaw::bus::{MessageBus, OutboundMessage};
    ///
    /// # tokio_test::block_on(async {
    /// let bus = MessageBus::new();
    /// bus.subscribe_outbound("uart", |msg: OutboundMessage| async move {
    ///     println!("-> {}", msg.content);
    ///     Ok(())
    /// })
    /// .await;
    /// assert_eq!(bus.subscribed_channels().await, vec!["uart".to_string()]);
    /// # });
    /// ```
    pub async fn subscribe_outbound<F, Fut>(&self, channel: &str, callback: F)
    where
        F: Fn(OutboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let callback: OutboundCallback =
            Arc::new(move |msg| -> BoxFuture<'static, Result<()>> { Box::pin(callback(msg)) });
        let replaced = self
            .subscribers
            .write()
            .await
            .insert(channel.to_string(), callback)
            .is_some();
        if replaced {
            debug!(channel = %channel, "Replaced outbound subscriber");
        } else {
            debug!(channel = %channel, "Registered outbound subscriber");
        }
    }

    /// Removes the delivery callback for `channel`. Returns `true` if one existed.
    pub async fn unsubscribe_outbound(&self, channel: &str) -> bool {
        self.subscribers.write().await.remove(channel).is_some()
    }

    /// Names of all channels with a registered callback, sorted.
    pub async fn subscribed_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.subscribers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Runs the outbound dispatch loop until [`stop`](Self::stop) is called.
    ///
    /// Each iteration takes one outbound message and hands it to the callback
    /// subscribed for its channel. A message for an unsubscribed channel is
    /// dropped with a warning. A callback that fails or panics is logged and
    /// the loop moves on, so one broken channel never blocks delivery to the
    /// others. If the outbound queue itself faults (it was closed), the loop
    /// pauses for [`DISPATCH_BACKOFF`] and keeps going.
    ///
    /// A `stop()` issued while no dispatcher is running stays pending: the
    /// next call consumes it and returns without dispatching.
    pub async fn dispatch_outbound(&self) {
        if self.dispatching.swap(true, Ordering::SeqCst) {
            warn!("Outbound dispatcher already running");
            return;
        }
        let _guard = DispatchGuard { bus: self };
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow_and_update() {
            info!("Outbound dispatcher stopped before it started");
            return;
        }
        info!("Outbound dispatcher started");

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow_and_update() {
                        break;
                    }
                }
                next = self.outbound.get() => match next {
                    Some(msg) => self.deliver(msg).await,
                    None => {
                        error!("Outbound queue closed, dispatcher backing off");
                        tokio::time::sleep(DISPATCH_BACKOFF).await;
                    }
                }
            }
        }

        info!("Outbound dispatcher stopped");
    }

    async fn deliver(&self, msg: OutboundMessage) {
        let callback = self.subscribers.read().await.get(&msg.channel).cloned();
        let Some(callback) = callback else {
            self.counters.undeliverable.fetch_add(1, Ordering::Relaxed);
            warn!(
                channel = %msg.channel,
                chat_id = %msg.chat_id,
                "Dropping outbound message: no subscriber for channel"
            );
            return;
        };

        let channel = msg.channel.clone();
        let delivery = async move { callback(msg).await };
        match AssertUnwindSafe(delivery).catch_unwind().await {
            Ok(Ok(())) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(channel = %channel, "Outbound message delivered");
            }
            Ok(Err(e)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(channel = %channel, error = %e, "Outbound delivery failed");
            }
            Err(panic) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    channel = %channel,
                    panic = %panic_message(panic.as_ref()),
                    "Outbound callback panicked"
                );
            }
        }
    }

    /// Requests the dispatch loop to stop at its next iteration boundary.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Returns `true` while [`dispatch_outbound`](Self::dispatch_outbound) is running.
    pub fn is_dispatching(&self) -> bool {
        self.dispatching.load(Ordering::SeqCst)
    }

    /// Snapshot of the dispatcher's delivery counters.
    pub fn dispatch_stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            undeliverable: self.counters.undeliverable.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Closes both queues. Queued messages can still be drained.
    pub fn close(&self) {
        self.inbound.close();
        self.outbound.close();
    }
}

/// Clears the dispatcher state however `dispatch_outbound` exits.
struct DispatchGuard<'a> {
    bus: &'a MessageBus,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.bus.shutdown_tx.send_replace(false);
        self.bus.dispatching.store(false, Ordering::SeqCst);
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
