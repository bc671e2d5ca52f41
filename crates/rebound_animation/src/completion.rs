//! Asynchronous animation results
//!
//! Every `start` returns a future that settles when the animation it began
//! stops: by reaching its goal, by being stopped or cancelled, or by being
//! superseded through `set`. Settling happens synchronously inside the call
//! that ends the animation (often a frame loop tick), so a driver that ticks
//! the loop and then polls sees the result without an executor.
//!
//! ```ignore
//! let done = value.start(StartOptions::to(100.0))?;
//! while frame_loop.advance(16.0) {}
//! let result = pollster::block_on(done)?;
//! assert!(result.finished);
//! ```

use futures::channel::oneshot;
use futures::FutureExt;
use indexmap::IndexMap;
use rebound_core::{Animatable, AnimationError, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Outcome of one animated value's `start`
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationResult {
    /// The value when the animation settled
    pub value: Animatable,
    /// Reached its goal, or was stopped without cancelling
    pub finished: bool,
    /// Stopped with `cancel = true`
    pub cancelled: bool,
    /// The value already sat at its goal, nothing was animated
    pub noop: bool,
}

impl AnimationResult {
    pub fn finished(value: Animatable) -> Self {
        Self {
            value,
            finished: true,
            cancelled: false,
            noop: false,
        }
    }

    pub fn cancelled(value: Animatable) -> Self {
        Self {
            value,
            finished: false,
            cancelled: true,
            noop: false,
        }
    }

    pub fn noop(value: Animatable) -> Self {
        Self {
            value,
            finished: true,
            cancelled: false,
            noop: true,
        }
    }
}

/// Receives the result of one start, held by the animated value until it
/// settles
pub(crate) type Settle = Box<dyn FnOnce(AnimationResult)>;

/// Future resolving to an [`AnimationResult`]
#[must_use = "completions do nothing unless awaited or polled"]
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<AnimationResult>,
}

impl Completion {
    pub(crate) fn pending() -> (Settle, Self) {
        let (sender, receiver) = oneshot::channel();
        let settle: Settle = Box::new(move |result| {
            // A dropped completion has nobody left to tell
            let _ = sender.send(result);
        });
        (settle, Self { receiver })
    }
}

impl Future for Completion {
    type Output = Result<AnimationResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver
            .poll_unpin(cx)
            .map(|settled| settled.map_err(|_| AnimationError::CompletionDropped))
    }
}

/// Outcome of an aggregate controller's `start`
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerResult {
    /// Snapshot of every key, in declared order, taken after all settled
    pub value: IndexMap<String, Animatable>,
    /// Every dispatched key finished
    pub finished: bool,
    /// Any dispatched key was cancelled
    pub cancelled: bool,
}

/// Future resolving to a [`ControllerResult`]
///
/// The result, snapshot included, is fixed when the last dispatched key
/// settles, however much later the future is polled.
#[must_use = "completions do nothing unless awaited or polled"]
#[derive(Debug)]
pub struct ControllerCompletion {
    receiver: oneshot::Receiver<ControllerResult>,
}

impl ControllerCompletion {
    pub(crate) fn pending() -> (oneshot::Sender<ControllerResult>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// A completion that has already settled
    pub(crate) fn ready(result: ControllerResult) -> Self {
        let (sender, completion) = Self::pending();
        // The receiver is alive in `completion`, so this cannot fail
        let _ = sender.send(result);
        completion
    }
}

impl Future for ControllerCompletion {
    type Output = Result<ControllerResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver
            .poll_unpin(cx)
            .map(|settled| settled.map_err(|_| AnimationError::CompletionDropped))
    }
}
