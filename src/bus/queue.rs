//! Bounded async FIFO queue
//!
//! `BoundedQueue` is the storage underneath both directions of the
//! [`MessageBus`](super::MessageBus). Producers suspend while the queue is
//! at capacity and consumers suspend while it is empty. Waiters on either side
//! are resumed in the order they started waiting, because both sides park on a
//! fair `tokio::sync::Semaphore`.
//!
//! A capacity of `0` means unbounded: `put` never suspends.
//!
//! # Example
//!
//! ```
//! use chipclaw::bus::queue::BoundedQueue;
//!
//! # tokio_test::block_on(async {
//! let queue = BoundedQueue::new(2);
//! queue.put("a").await.unwrap();
//! queue.put("b").await.unwrap();
//! assert!(queue.is_full());
//!
//! assert_eq!(queue.get().await, Some("a"));
//! assert_eq!(queue.get_nowait().unwrap(), "b");
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{Semaphore, TryAcquireError};

/// Returned by [`BoundedQueue::put`] when the queue has been closed.
///
/// Carries the rejected item back to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("queue closed")]
pub struct Closed<T>(pub T);

/// Error returned by [`BoundedQueue::put_nowait`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TryPutError<T> {
    /// The queue is at capacity.
    #[error("queue full")]
    Full(T),
    /// The queue has been closed.
    #[error("queue closed")]
    Closed(T),
}

impl<T> TryPutError<T> {
    /// Recovers the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            TryPutError::Full(item) | TryPutError::Closed(item) => item,
        }
    }
}

/// Error returned by [`BoundedQueue::get_nowait`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TryGetError {
    /// No item is currently available.
    #[error("queue empty")]
    Empty,
    /// The queue has been closed and fully drained.
    #[error("queue closed")]
    Closed,
}

/// A FIFO queue with async `put`/`get` and an optional capacity limit.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    /// One permit per item sitting in `items`.
    available: Semaphore,
    /// One permit per free slot. `None` when unbounded.
    slots: Option<Semaphore>,
    capacity: usize,
    closed: AtomicBool,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items (`0` = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
            slots: (capacity > 0).then(|| Semaphore::new(capacity)),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a queue with no capacity limit.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// The configured capacity (`0` = unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns `true` if a `put` would suspend right now. Never true when unbounded.
    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.len() >= self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Enqueues `item`, suspending while the queue is at capacity.
    ///
    /// # Errors
    ///
    /// Returns the item wrapped in [`Closed`] if the queue was closed before
    /// space became available.
    pub async fn put(&self, item: T) -> Result<(), Closed<T>> {
        if let Some(slots) = &self.slots {
            match slots.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(Closed(item)),
            }
        }
        self.push(item).map_err(Closed)
    }

    /// Enqueues `item` without suspending.
    pub fn put_nowait(&self, item: T) -> Result<(), TryPutError<T>> {
        if self.is_closed() {
            return Err(TryPutError::Closed(item));
        }
        if let Some(slots) = &self.slots {
            match slots.try_acquire() {
                Ok(permit) => permit.forget(),
                Err(TryAcquireError::NoPermits) => return Err(TryPutError::Full(item)),
                Err(TryAcquireError::Closed) => return Err(TryPutError::Closed(item)),
            }
        }
        self.push(item).map_err(TryPutError::Closed)
    }

    /// Dequeues the oldest item, suspending while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and every remaining item has
    /// been taken. Dropping the returned future before it completes never
    /// loses an item, so `get` can be raced inside `tokio::select!`.
    pub async fn get(&self) -> Option<T> {
        match self.available.acquire().await {
            Ok(permit) => {
                permit.forget();
                self.pop()
            }
            // Closed: hand out whatever is left, then report exhaustion.
            Err(_) => self.pop(),
        }
    }

    /// Dequeues the oldest item without suspending.
    pub fn get_nowait(&self) -> Result<T, TryGetError> {
        match self.available.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.pop().ok_or(TryGetError::Empty)
            }
            Err(TryAcquireError::NoPermits) => Err(TryGetError::Empty),
            Err(TryAcquireError::Closed) => self.pop().ok_or(TryGetError::Closed),
        }
    }

    /// Closes the queue.
    ///
    /// Every suspended `put` fails with [`Closed`]; suspended and future `get`
    /// calls drain the remaining items and then return `None`.
    pub fn close(&self) {
        // Hold the lock so no push can slip in between the flag and the wakeups.
        let _items = self.lock();
        self.closed.store(true, Ordering::SeqCst);
        self.available.close();
        if let Some(slots) = &self.slots {
            slots.close();
        }
    }

    fn push(&self, item: T) -> Result<(), T> {
        let mut items = self.lock();
        if self.is_closed() {
            return Err(item);
        }
        items.push_back(item);
        drop(items);
        self.available.add_permits(1);
        Ok(())
    }

    fn pop(&self) -> Option<T> {
        let item = self.lock().pop_front();
        if item.is_some() {
            if let Some(slots) = &self.slots {
                slots.add_permits(1);
            }
        }
        item
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // The guarded section never panics, so a poisoned lock still holds a
        // consistent deque.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
