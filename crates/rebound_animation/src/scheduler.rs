//! Frame loop
//!
//! Keeps the working set of active animations and advances them once per
//! tick in ascending priority order. The loop knows nothing about animated
//! values; anything implementing [`FrameAnimation`] can join.
//!
//! The loop never drives itself. An external driver calls
//! [`FrameLoop::advance`] with the elapsed milliseconds, typically once per
//! display refresh, and keeps doing so while it returns `true`. A wake
//! callback tells the driver when an idle loop receives work.
//!
//! ```ignore
//! let frame_loop = FrameLoop::new();
//! let opacity = AnimatedValue::new(&frame_loop.handle(), 0.0, AnimationConfig::default());
//! opacity.start(StartOptions::to(1.0))?;
//!
//! while frame_loop.advance(16.0) {
//!     render(opacity.get());
//! }
//! ```
//!
//! # Re-entrancy
//!
//! No internal borrow is held while an animation advances, so animations
//! (and the observers they notify) may start, stop or re-sort animations
//! mid-tick. A start that would run before the animation currently advancing
//! is deferred to the next tick, as is every re-sort requested mid-tick.

use rebound_core::{AnimationError, Result};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

// ============================================================================
// Animation contract
// ============================================================================

/// What the frame loop needs from an animation
pub trait FrameAnimation {
    /// Idle animations are skipped and dropped from the working set
    fn is_idle(&self) -> bool;

    /// Lower priorities advance first within a tick
    fn priority(&self) -> i32;

    /// Advance by `dt` milliseconds
    fn advance(&self, dt: f64);
}

/// Shared handle to a registered animation
pub type AnimationRef = Rc<dyn FrameAnimation>;

/// Called when an idle loop receives work
pub type WakeCallback = Rc<dyn Fn()>;

fn same_animation(a: &AnimationRef, b: &AnimationRef) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

fn contains(list: &[AnimationRef], animation: &AnimationRef) -> bool {
    list.iter().any(|other| same_animation(other, animation))
}

// ============================================================================
// Loop state
// ============================================================================

#[derive(Default)]
struct LoopInner {
    /// Starts deferred to the next tick
    start_queue: Vec<AnimationRef>,
    /// Re-sorts deferred to the next tick
    sort_queue: Vec<AnimationRef>,
    /// Working set, ascending priority
    current_frame: Vec<AnimationRef>,
    /// Spare buffer, swapped with `current_frame` each tick
    prev_frame: Vec<AnimationRef>,
    /// Priority of the animation currently advancing, 0 between ticks
    priority: i32,
    advancing: bool,
    /// Index of the next animation to advance while `advancing`
    cursor: usize,
    wake_callback: Option<WakeCallback>,
}

impl LoopInner {
    fn is_idle(&self) -> bool {
        self.start_queue.is_empty() && self.current_frame.is_empty()
    }

    /// Insert keeping ascending priority; equal priorities keep insertion order
    fn insert_sorted(&mut self, animation: AnimationRef) {
        let priority = animation.priority();
        let index = self
            .current_frame
            .iter()
            .position(|other| other.priority() > priority)
            .unwrap_or(self.current_frame.len());
        self.current_frame.insert(index, animation);
    }

    fn start_safely(&mut self, animation: AnimationRef) {
        match self
            .current_frame
            .iter()
            .position(|other| same_animation(other, &animation))
        {
            // Still ahead of the cursor, it will advance this tick
            Some(index) if !self.advancing || index >= self.cursor => {}
            // Already advanced (and possibly dropped) this tick
            Some(_) => {
                if !contains(&self.start_queue, &animation) {
                    self.start_queue.push(animation);
                }
            }
            None => self.insert_sorted(animation),
        }
    }

    fn resort(&mut self, animation: AnimationRef) {
        self.current_frame
            .retain(|other| !same_animation(other, &animation));
        self.insert_sorted(animation);
    }
}

fn start_animation(inner: &RefCell<LoopInner>, animation: AnimationRef) {
    let wake = {
        let mut state = inner.borrow_mut();
        let was_idle = state.is_idle();

        if state.advancing && state.priority > animation.priority() {
            tracing::trace!(
                current = state.priority,
                priority = animation.priority(),
                "deferring start to next tick"
            );
            if !contains(&state.start_queue, &animation) {
                state.start_queue.push(animation);
            }
        } else {
            state.start_safely(animation);
        }

        if was_idle && !state.advancing && !state.is_idle() {
            state.wake_callback.clone()
        } else {
            None
        }
    };

    if let Some(wake) = wake {
        wake();
    }
}

fn sort_animation(inner: &RefCell<LoopInner>, animation: AnimationRef) {
    let mut state = inner.borrow_mut();
    if state.advancing {
        if !contains(&state.sort_queue, &animation) {
            state.sort_queue.push(animation);
        }
    } else if contains(&state.current_frame, &animation) {
        state.resort(animation);
    }
}

// ============================================================================
// Frame loop
// ============================================================================

/// The frame loop that advances all active animations
///
/// Owned by the host. Animated values hold a [`LoopHandle`], which does not
/// keep the loop alive. Independent loops can coexist.
pub struct FrameLoop {
    inner: Rc<RefCell<LoopInner>>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(LoopInner::default())),
        }
    }

    /// Get a handle to this loop for passing to animated values
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Set a callback fired when the loop goes from idle to having work
    ///
    /// Use this to resume requesting frames from the host, e.g. by waking an
    /// event loop. It is never called from inside [`advance`](Self::advance).
    pub fn set_wake_callback<F>(&self, callback: F)
    where
        F: Fn() + 'static,
    {
        self.inner.borrow_mut().wake_callback = Some(Rc::new(callback));
    }

    /// Add an animation to the working set
    pub fn start(&self, animation: AnimationRef) {
        start_animation(&self.inner, animation);
    }

    /// Reposition an animation whose priority changed
    pub fn sort(&self, animation: AnimationRef) {
        sort_animation(&self.inner, animation);
    }

    /// Advance every active animation by `dt` milliseconds
    ///
    /// Returns `true` while any animation remains, meaning the driver should
    /// keep ticking.
    pub fn advance(&self, dt: f64) -> bool {
        {
            let mut state = self.inner.borrow_mut();
            if state.advancing {
                tracing::warn!("re-entrant FrameLoop::advance ignored");
                return true;
            }
            state.advancing = true;
            state.cursor = 0;

            let mut queued = std::mem::take(&mut state.start_queue);
            for animation in queued.drain(..) {
                state.start_safely(animation);
            }
            state.start_queue = queued;

            let mut resorts = std::mem::take(&mut state.sort_queue);
            for animation in resorts.drain(..) {
                state.resort(animation);
            }
            state.sort_queue = resorts;

            tracing::trace!(dt, running = state.current_frame.len(), "frame loop tick");
        }

        let mut next_frame = std::mem::take(&mut self.inner.borrow_mut().prev_frame);

        loop {
            let animation = {
                let mut state = self.inner.borrow_mut();
                let Some(animation) = state.current_frame.get(state.cursor).cloned() else {
                    break;
                };
                state.cursor += 1;
                if animation.is_idle() {
                    continue;
                }
                state.priority = animation.priority();
                animation
            };

            animation.advance(dt);

            if !animation.is_idle() {
                next_frame.push(animation);
            }
        }

        let mut state = self.inner.borrow_mut();
        state.priority = 0;
        state.advancing = false;
        state.cursor = 0;

        let mut finished = std::mem::replace(&mut state.current_frame, next_frame);
        finished.clear();
        state.prev_frame = finished;

        !state.is_idle()
    }

    /// No pending starts and nothing running
    pub fn is_idle(&self) -> bool {
        self.inner.borrow().is_idle()
    }

    /// Number of animations in the working set
    pub fn running_count(&self) -> usize {
        self.inner.borrow().current_frame.len()
    }

    /// Number of starts deferred to the next tick
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().start_queue.len()
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Loop handle
// ============================================================================

/// A weak handle to a [`FrameLoop`]
///
/// This is passed to animated values that need to register with the loop.
/// It won't prevent the loop from being dropped.
#[derive(Clone)]
pub struct LoopHandle {
    inner: Weak<RefCell<LoopInner>>,
}

impl LoopHandle {
    /// Add an animation to the loop's working set
    pub fn start(&self, animation: AnimationRef) -> Result<()> {
        let inner = self.inner.upgrade().ok_or(AnimationError::SchedulerDropped)?;
        start_animation(&inner, animation);
        Ok(())
    }

    /// Reposition an animation whose priority changed
    pub fn sort(&self, animation: AnimationRef) {
        if let Some(inner) = self.inner.upgrade() {
            sort_animation(&inner, animation);
        }
    }

    /// Check if the loop is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
