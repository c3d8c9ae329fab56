// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A strictly sequential queue of cancelable test computations.

use crate::{
    cancel::{Cancelable, CancelHandle},
    errors::RunError,
    helpers::lock,
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

/// A queued factory: invoked lazily, never at push time.
pub type QueueFactory<T> = Box<dyn FnOnce() -> Cancelable<T> + Send>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum QueuePhase {
    Idle,
    Running,
    Finished,
}

struct QueueInner<T> {
    pending: VecDeque<QueueFactory<T>>,
    total: usize,
    processed: usize,
    phase: QueuePhase,
    cancelled: bool,
    in_flight: Option<CancelHandle>,
}

/// An ordered queue of cancelable computations, executed one at a time in
/// push order, with at most one in flight.
///
/// The queue moves through `idle → running → finished`. The first failed
/// computation finishes the queue with that error; cancellation clears all
/// not-yet-started factories and forwards to the in-flight computation.
pub struct TestQueue<T> {
    inner: Arc<Mutex<QueueInner<T>>>,
}

impl<T> Clone for TestQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for TestQueue<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                pending: VecDeque::new(),
                total: 0,
                processed: 0,
                phase: QueuePhase::Idle,
                cancelled: false,
                in_flight: None,
            })),
        }
    }
}

impl<T: Send + 'static> TestQueue<T> {
    /// Creates an empty queue in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a factory.
    ///
    /// # Panics
    ///
    /// Panics if the queue has already finished; pushing at that point is
    /// a caller bug.
    pub fn push(&self, factory: impl FnOnce() -> Cancelable<T> + Send + 'static) {
        let mut inner = lock(&self.inner);
        assert!(
            inner.phase != QueuePhase::Finished,
            "pushed to a finished test queue"
        );
        inner.pending.push_back(Box::new(factory));
        inner.total += 1;
    }

    /// The number of factories ever pushed.
    pub fn total_count(&self) -> usize {
        lock(&self.inner).total
    }

    /// The number of computations that have settled successfully.
    ///
    /// Increments strictly after each successful settle, before the next
    /// factory starts.
    pub fn processed_count(&self) -> usize {
        lock(&self.inner).processed
    }

    /// Whether the queue has finished.
    pub fn is_finished(&self) -> bool {
        lock(&self.inner).phase == QueuePhase::Finished
    }

    /// Cancels the queue: clears pending factories and forwards the
    /// cancellation to the in-flight computation. A no-op once finished.
    pub fn cancel(&self) {
        let in_flight = {
            let mut inner = lock(&self.inner);
            if inner.phase == QueuePhase::Finished {
                return;
            }
            inner.pending.clear();
            inner.cancelled = true;
            inner.in_flight.clone()
        };
        if let Some(handle) = in_flight {
            handle.cancel();
        }
    }

    /// Begins draining the queue, strictly sequentially.
    ///
    /// The returned computation resolves with every item's result once the
    /// last factory's computation resolves, or rejects on the first
    /// failure. Cancelling it cancels the queue.
    ///
    /// # Panics
    ///
    /// Panics unless the queue is idle: `execute` may only be called once.
    pub fn execute(&self) -> Cancelable<Vec<T>> {
        {
            let mut inner = lock(&self.inner);
            assert!(
                inner.phase == QueuePhase::Idle,
                "a test queue can only be executed once"
            );
            inner.phase = QueuePhase::Running;
        }
        let queue = self.clone();
        let canceller = self.clone();
        Cancelable::new(queue.drain(), move || canceller.cancel())
    }

    async fn drain(self) -> Result<Vec<T>, RunError> {
        let mut results = Vec::new();
        loop {
            let factory = {
                let mut inner = lock(&self.inner);
                if inner.cancelled {
                    inner.phase = QueuePhase::Finished;
                    return Err(RunError::Cancelled);
                }
                match inner.pending.pop_front() {
                    Some(factory) => factory,
                    None => {
                        inner.phase = QueuePhase::Finished;
                        return Ok(results);
                    }
                }
            };

            let computation = factory();
            {
                let mut inner = lock(&self.inner);
                inner.in_flight = Some(computation.handle());
                // A cancel request may have landed between popping the
                // factory and registering the handle.
                if inner.cancelled {
                    computation.cancel();
                }
            }

            let result = computation.await;
            let mut inner = lock(&self.inner);
            inner.in_flight = None;
            match result {
                Ok(value) => {
                    inner.processed += 1;
                    results.push(value);
                }
                Err(err) => {
                    inner.pending.clear();
                    inner.phase = QueuePhase::Finished;
                    return Err(err);
                }
            }
        }
    }
}
