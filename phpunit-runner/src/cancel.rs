// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cancelable computations.
//!
//! [`Cancelable`] is the primitive every asynchronous operation in this
//! crate is built on: a future paired with a cancellation callback that
//! fires at most once, and only while the computation is still pending.
//! Derived computations share the root's cancellation state, so cancelling
//! anywhere in a chain cancels the whole chain.

use crate::{errors::RunError, helpers::lock};
use futures::future::BoxFuture;
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
};

type CancelFn = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct CancelState {
    settled: AtomicBool,
    cancelled: AtomicBool,
    on_cancel: Mutex<Option<CancelFn>>,
}

impl CancelState {
    fn cancel(&self) {
        if self.settled.load(Ordering::Acquire) {
            return;
        }
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            if let Some(on_cancel) = lock(&self.on_cancel).take() {
                on_cancel();
            }
        }
    }

    fn settle(&self) {
        self.settled.store(true, Ordering::Release);
        // The callback must never fire after the computation settles.
        lock(&self.on_cancel).take();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A cloneable handle that cancels its [`Cancelable`].
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    /// Requests cancellation. Invokes the cancellation callback if the
    /// computation is still pending; a no-op otherwise.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

/// A computation that can be cancelled while pending.
///
/// Resolves to `Err(RunError::Cancelled)` if cancellation was requested
/// before the underlying future settled, regardless of what the future
/// itself produced; stale continuations never observe a result that
/// arrives after cancellation.
pub struct Cancelable<T> {
    future: BoxFuture<'static, Result<T, RunError>>,
    state: Arc<CancelState>,
}

impl<T: Send + 'static> Cancelable<T> {
    /// Wraps a future with a cancellation callback.
    pub fn new<F>(future: F, on_cancel: impl FnOnce() + Send + 'static) -> Self
    where
        F: Future<Output = Result<T, RunError>> + Send + 'static,
    {
        let state = Arc::new(CancelState::default());
        *lock(&state.on_cancel) = Some(Box::new(on_cancel));
        Self {
            future: Box::pin(future),
            state,
        }
    }

    /// Wraps an already-settled result. Cancellation is a no-op.
    pub fn from_result(result: Result<T, RunError>) -> Self {
        Self::new(async move { result }, || {})
    }

    /// Returns a handle that cancels this computation.
    pub fn handle(&self) -> CancelHandle {
        CancelHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Requests cancellation of this computation.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Derives a computation that maps a successful result.
    ///
    /// The derived computation shares this one's cancellation state, so
    /// cancelling it cancels the root.
    pub fn map<U, F>(self, f: F) -> Cancelable<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        Cancelable {
            future: Box::pin(async move { self.await.map(f) }),
            state,
        }
    }

    /// Derives a computation that chains an asynchronous continuation onto
    /// a successful result. Shares this computation's cancellation state.
    pub fn then<U, Fut, F>(self, f: F) -> Cancelable<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, RunError>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        Cancelable {
            future: Box::pin(async move {
                match self.await {
                    Ok(value) => f(value).await,
                    Err(err) => Err(err),
                }
            }),
            state,
        }
    }
}

impl<T> Future for Cancelable<T> {
    type Output = Result<T, RunError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.future.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.state.settle();
                if this.state.is_cancelled() {
                    Poll::Ready(Err(RunError::Cancelled))
                } else {
                    Poll::Ready(result)
                }
            }
        }
    }
}
