//! Animated values
//!
//! An [`AnimatedValue`] owns one animatable quantity, moves it toward a goal
//! on its [`FrameLoop`](crate::scheduler::FrameLoop), and reports changes to
//! observers. Handles are cheap to clone and all clones share one value.
//!
//! # Example
//!
//! ```ignore
//! let frame_loop = FrameLoop::new();
//! let x = AnimatedValue::new(&frame_loop.handle(), 0.0, AnimationConfig::default());
//!
//! let _sub = x.on_change(|v| println!("x = {v}"));
//! let done = x.start(StartOptions::to(100.0))?;
//!
//! while frame_loop.advance(16.0) {}
//! assert!(pollster::block_on(done)?.finished);
//! ```

use crate::completion::{AnimationResult, Completion, Settle};
use crate::integrator::{Component, Step};
use crate::scheduler::{AnimationRef, FrameAnimation, LoopHandle};
use crate::spring::{AnimationConfig, StepMode};
use rebound_core::{Animatable, AnimationError, Components, Observers, Result, Shape, Subscription};
use smallvec::SmallVec;
use std::cell::{RefCell, RefMut};
use std::rc::{Rc, Weak};

/// Options for [`AnimatedValue::start`]
#[derive(Clone, Debug, Default)]
pub struct StartOptions {
    /// New goal
    pub to: Option<Animatable>,
    /// Jump here before animating
    pub from: Option<Animatable>,
    /// Replaces the whole config
    pub config: Option<AnimationConfig>,
    /// Jump to the goal without animating
    pub immediate: bool,
}

impl StartOptions {
    /// Animate to `to`
    pub fn to(to: impl Into<Animatable>) -> Self {
        Self {
            to: Some(to.into()),
            ..Self::default()
        }
    }

    pub fn with_from(mut self, from: impl Into<Animatable>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_config(mut self, config: impl Into<AnimationConfig>) -> Self {
        self.config = Some(config.into());
        self
    }

    pub fn with_immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }
}

struct ValueState {
    shape: Shape,
    /// Published value
    value: Components,
    goal: Components,
    /// Start of the current segment
    from: Components,
    config: AnimationConfig,
    components: SmallVec<[Component; 4]>,
    animating: bool,
    paused: bool,
    disposed: bool,
    priority: i32,
    /// Duration seen by the previous advance
    last_duration: Option<f64>,
    pending: Vec<Settle>,
}

impl ValueState {
    fn snapshot(&self) -> Animatable {
        self.shape.unflatten(&self.value)
    }

    /// Start a new segment from the published value
    ///
    /// Components still moving in an unfinished segment keep their velocity;
    /// the rest start from the configured velocity.
    fn reset_components(&mut self) {
        let retarget = self.animating;
        for (index, (component, position)) in
            self.components.iter_mut().zip(&self.value).enumerate()
        {
            let velocity = if retarget && !component.done {
                component.velocity
            } else {
                self.config.velocity.component(index)
            };
            component.reset(*position, velocity);
        }
        self.from = self.value.clone();
    }

    /// Put every component at the published value, outside any segment
    fn place_components(&mut self) {
        for (component, position) in self.components.iter_mut().zip(&self.value) {
            component.place(*position);
        }
    }

    /// Leave the animating state, returning the completions to settle
    fn end(&mut self) -> Vec<Settle> {
        self.animating = false;
        std::mem::take(&mut self.pending)
    }
}

struct ValueCell {
    state: RefCell<ValueState>,
    observers: Observers<Animatable>,
    frame_loop: LoopHandle,
}

impl ValueCell {
    fn state_mut(&self, operation: &str) -> RefMut<'_, ValueState> {
        let state = self.state.borrow_mut();
        assert!(
            !state.disposed,
            "AnimatedValue::{operation} called after its controller was disposed"
        );
        state
    }
}

impl FrameAnimation for ValueCell {
    fn is_idle(&self) -> bool {
        let state = self.state.borrow();
        !state.animating || state.paused
    }

    fn priority(&self) -> i32 {
        self.state.borrow().priority
    }

    fn advance(&self, dt: f64) {
        let (changed, settle) = {
            let mut guard = self.state.borrow_mut();
            if guard.paused || !guard.animating {
                return;
            }
            let state = &mut *guard;

            let mode = state.config.mode();
            let duration_changed = match mode {
                StepMode::Duration(duration) => {
                    let changed = state.last_duration != Some(duration);
                    state.last_duration = Some(duration);
                    changed
                }
                _ => false,
            };

            let mut moved = false;
            let mut idle = true;
            for (index, component) in state.components.iter_mut().enumerate() {
                if component.done {
                    continue;
                }
                let step = Step {
                    dt,
                    from: state.from[index],
                    to: state.goal[index],
                    config: &state.config,
                    duration_changed,
                };
                if component.advance(&step, index) {
                    moved = true;
                }
                if !component.done {
                    idle = false;
                }
            }

            let mut changed = None;
            if moved || idle {
                let next: Components = if idle && !matches!(mode, StepMode::Decay(_)) {
                    state.goal.clone()
                } else {
                    state.components.iter().map(|c| c.position).collect()
                };
                if next != state.value {
                    state.value = next;
                    changed = Some(state.snapshot());
                }
            }

            let settle = if idle {
                tracing::debug!("animation finished");
                let value = state.snapshot();
                Some((state.end(), value))
            } else {
                None
            };

            (changed, settle)
        };

        if let Some(value) = changed {
            self.observers.notify(&value);
        }
        if let Some((pending, value)) = settle {
            settle_all(pending, AnimationResult::finished(value));
        }
    }
}

impl Drop for ValueCell {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.pending.is_empty() {
            let value = state.snapshot();
            let pending = state.end();
            settle_all(pending, AnimationResult::finished(value));
        }
    }
}

fn settle_all(pending: Vec<Settle>, result: AnimationResult) {
    for settle in pending {
        settle(result.clone());
    }
}

/// A value that animates toward a goal on a frame loop
///
/// Cloning yields another handle to the same value.
#[derive(Clone)]
pub struct AnimatedValue {
    cell: Rc<ValueCell>,
}

impl AnimatedValue {
    /// Create a value resting at `initial`
    ///
    /// The shape of `initial` (number, array length, record fields) is fixed
    /// for the value's lifetime.
    pub fn new(
        frame_loop: &LoopHandle,
        initial: impl Into<Animatable>,
        config: AnimationConfig,
    ) -> Self {
        let initial = initial.into();
        let shape = Shape::of(&initial);
        let value = initial.components();
        let components = value.iter().map(|p| Component::new(*p)).collect();

        Self {
            cell: Rc::new(ValueCell {
                state: RefCell::new(ValueState {
                    shape,
                    goal: value.clone(),
                    from: value.clone(),
                    value,
                    config,
                    components,
                    animating: false,
                    paused: false,
                    disposed: false,
                    priority: 0,
                    last_duration: None,
                    pending: Vec::new(),
                }),
                observers: Observers::new(),
                frame_loop: frame_loop.clone(),
            }),
        }
    }

    /// Animate toward a goal
    ///
    /// Returns a [`Completion`] that settles when this animation ends. It
    /// settles immediately for `immediate` starts and for starts on an idle
    /// value whose goal equals the current value (`noop`), which never join
    /// the frame loop. Decay animations ignore the goal and are never treated
    /// as no-ops.
    ///
    /// Starting a value that is already animating retargets it: the new
    /// segment begins at the current value and moving components keep their
    /// velocity. Completions from earlier starts stay pending until the
    /// value settles.
    ///
    /// Fails with `ShapeMismatch` if `to` or `from` has a different shape
    /// than the value, before anything changes, and with `SchedulerDropped`
    /// if the frame loop is gone.
    ///
    /// # Panics
    ///
    /// Panics if the owning controller has been disposed.
    pub fn start(&self, options: StartOptions) -> Result<Completion> {
        let (settle, completion) = Completion::pending();
        self.start_with(options, settle)?;
        Ok(completion)
    }

    /// [`start`](Self::start), handing the result to `settle`
    ///
    /// `settle` runs exactly once, synchronously inside whichever call ends
    /// the animation. It is dropped without running if the start fails.
    pub(crate) fn start_with(&self, options: StartOptions, settle: Settle) -> Result<()> {
        let StartOptions {
            to,
            from,
            config,
            immediate,
        } = options;

        let from_changed = {
            let mut state = self.cell.state_mut("start");
            let from = from.map(|from| state.shape.flatten(&from)).transpose()?;
            let to = to.map(|to| state.shape.flatten(&to)).transpose()?;

            if let Some(config) = config {
                state.config = config;
            }
            if let Some(to) = to {
                state.goal = to;
            }
            match from {
                Some(from) if from != state.value => {
                    state.value = from;
                    state.place_components();
                    Some(state.snapshot())
                }
                _ => None,
            }
        };
        if let Some(value) = from_changed {
            self.cell.observers.notify(&value);
        }

        if immediate {
            let value = self.jump_to_goal("start");
            settle(AnimationResult::finished(value));
            return Ok(());
        }

        let mut state = self.cell.state_mut("start");
        let decay = matches!(state.config.mode(), StepMode::Decay(_));
        if !decay && !state.animating && state.value == state.goal {
            tracing::debug!("start is a no-op: already at goal");
            let value = state.snapshot();
            drop(state);
            settle(AnimationResult::noop(value));
            return Ok(());
        }

        if !self.cell.frame_loop.is_alive() {
            return Err(AnimationError::SchedulerDropped);
        }

        let retarget = state.animating;
        state.reset_components();
        state.animating = true;
        state.pending.push(settle);
        let paused = state.paused;
        tracing::debug!(priority = state.priority, paused, retarget, "animation started");
        drop(state);

        if !paused {
            self.cell.frame_loop.start(self.as_animation())?;
        }
        Ok(())
    }

    /// Jump to the current goal, settling everything as finished
    fn jump_to_goal(&self, operation: &str) -> Animatable {
        let (changed, pending, value) = {
            let mut state = self.cell.state_mut(operation);
            let changed = state.value != state.goal;
            state.value = state.goal.clone();
            state.place_components();
            let pending = state.end();
            (changed, pending, state.snapshot())
        };

        if changed {
            self.cell.observers.notify(&value);
        }
        settle_all(pending, AnimationResult::finished(value.clone()));
        value
    }

    /// Set the value without animating
    ///
    /// Any running animation stops and its completions settle as finished.
    ///
    /// # Panics
    ///
    /// Panics if the owning controller has been disposed.
    pub fn set(&self, value: impl Into<Animatable>) -> Result<()> {
        let value = value.into();
        let (changed, pending, before, after) = {
            let mut state = self.cell.state_mut("set");
            let next = state.shape.flatten(&value)?;
            let before = state.snapshot();
            let pending = state.end();

            let changed = next != state.value;
            state.goal = next.clone();
            state.from = next.clone();
            state.value = next;
            state.place_components();
            (changed, pending, before, state.snapshot())
        };

        if !pending.is_empty() {
            tracing::debug!("animation superseded by set");
        }
        settle_all(pending, AnimationResult::finished(before));
        if changed {
            self.cell.observers.notify(&after);
        }
        Ok(())
    }

    /// Stop animating where the value is now
    ///
    /// Pending completions settle with `finished = !cancel` and
    /// `cancelled = cancel`. Stopping an idle value does nothing.
    ///
    /// # Panics
    ///
    /// Panics if the owning controller has been disposed.
    pub fn stop(&self, cancel: bool) {
        let (pending, value) = {
            let mut state = self.cell.state_mut("stop");
            if !state.animating {
                return;
            }
            (state.end(), state.snapshot())
        };

        tracing::debug!(cancel, "animation stopped");
        let result = if cancel {
            AnimationResult::cancelled(value)
        } else {
            AnimationResult::finished(value)
        };
        settle_all(pending, result);
    }

    /// Freeze the animation in place
    ///
    /// # Panics
    ///
    /// Panics if the owning controller has been disposed.
    pub fn pause(&self) {
        let mut state = self.cell.state_mut("pause");
        if !state.paused {
            state.paused = true;
            tracing::debug!(animating = state.animating, "animation paused");
        }
    }

    /// Continue a paused animation from where it was frozen
    ///
    /// # Panics
    ///
    /// Panics if the owning controller has been disposed.
    pub fn resume(&self) {
        let animating = {
            let mut state = self.cell.state_mut("resume");
            if !state.paused {
                return;
            }
            state.paused = false;
            state.animating
        };

        tracing::debug!(animating, "animation resumed");
        if animating {
            if let Err(err) = self.cell.frame_loop.start(self.as_animation()) {
                tracing::warn!(%err, "cannot resume animation");
            }
        }
    }

    /// Jump to the goal and stop, settling completions as finished
    ///
    /// # Panics
    ///
    /// Panics if the owning controller has been disposed.
    pub fn finish(&self) {
        if self.cell.state_mut("finish").animating {
            self.jump_to_goal("finish");
        }
    }

    /// Observe changes to the value
    ///
    /// The observer runs synchronously whenever the value actually changes,
    /// within the call that changed it.
    pub fn on_change<F>(&self, observer: F) -> Subscription
    where
        F: FnMut(&Animatable) + 'static,
    {
        self.cell.observers.subscribe(observer)
    }

    /// Change the frame loop priority; lower runs earlier in a tick
    pub fn set_priority(&self, priority: i32) {
        let animating = {
            let mut state = self.cell.state.borrow_mut();
            if state.priority == priority {
                return;
            }
            state.priority = priority;
            state.animating
        };
        if animating {
            self.cell.frame_loop.sort(self.as_animation());
        }
    }

    /// Current value
    pub fn get(&self) -> Animatable {
        self.cell.state.borrow().snapshot()
    }

    pub fn goal(&self) -> Animatable {
        let state = self.cell.state.borrow();
        state.shape.unflatten(&state.goal)
    }

    /// Start of the current (or last) animation segment
    pub fn from(&self) -> Animatable {
        let state = self.cell.state.borrow();
        state.shape.unflatten(&state.from)
    }

    /// Per-component velocity in units per millisecond
    pub fn velocity(&self) -> Animatable {
        let state = self.cell.state.borrow();
        let velocity: Components = state.components.iter().map(|c| c.velocity).collect();
        state.shape.unflatten(&velocity)
    }

    pub fn config(&self) -> AnimationConfig {
        self.cell.state.borrow().config.clone()
    }

    pub fn shape(&self) -> Shape {
        self.cell.state.borrow().shape.clone()
    }

    pub fn priority(&self) -> i32 {
        self.cell.state.borrow().priority
    }

    /// Started and not yet settled (paused animations still count)
    pub fn is_animating(&self) -> bool {
        self.cell.state.borrow().animating
    }

    pub fn is_paused(&self) -> bool {
        self.cell.state.borrow().paused
    }

    /// Not animating, or paused
    pub fn is_idle(&self) -> bool {
        self.cell.is_idle()
    }

    /// Mark the value unusable; further control calls panic
    pub(crate) fn dispose(&self) {
        if self.cell.state.borrow().disposed {
            return;
        }
        self.stop(false);
        let mut state = self.cell.state.borrow_mut();
        state.disposed = true;
        state.paused = false;
        drop(state);
        self.cell.observers.clear();
    }

    pub(crate) fn downgrade(&self) -> WeakValue {
        WeakValue(Rc::downgrade(&self.cell))
    }

    fn as_animation(&self) -> AnimationRef {
        self.cell.clone()
    }
}

/// Non-owning handle to an [`AnimatedValue`]
#[derive(Clone)]
pub(crate) struct WeakValue(Weak<ValueCell>);

impl WeakValue {
    pub fn upgrade(&self) -> Option<AnimatedValue> {
        self.0.upgrade().map(|cell| AnimatedValue { cell })
    }
}

impl std::fmt::Debug for AnimatedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.cell.state.borrow();
        f.debug_struct("AnimatedValue")
            .field("value", &state.snapshot())
            .field("animating", &state.animating)
            .field("paused", &state.paused)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::Easing;
    use crate::scheduler::FrameLoop;
    use futures::FutureExt;
    use std::cell::Cell;

    fn timed() -> AnimationConfig {
        AnimationConfig::timed(100.0, Easing::Linear)
    }

    #[test]
    fn test_start_registers_and_settles() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 0.0, timed());

        let mut done = value.start(StartOptions::to(10.0)).unwrap();
        assert!(value.is_animating());
        assert_eq!(frame_loop.running_count(), 1);
        assert!((&mut done).now_or_never().is_none());

        assert!(frame_loop.advance(50.0));
        assert_eq!(value.get(), Animatable::Number(5.0));
        assert!(!frame_loop.advance(50.0));

        let result = done.now_or_never().unwrap().unwrap();
        assert!(result.finished);
        assert!(!result.cancelled);
        assert_eq!(result.value, Animatable::Number(10.0));
    }

    #[test]
    fn test_noop_start_skips_loop() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 3.0, AnimationConfig::default());

        let result = value
            .start(StartOptions::to(3.0))
            .unwrap()
            .now_or_never()
            .unwrap()
            .unwrap();
        assert!(result.noop && result.finished);
        assert!(frame_loop.is_idle());
        assert!(!value.is_animating());
    }

    #[test]
    fn test_from_applies_before_animating() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 0.0, timed());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            value.on_change(move |v| seen.borrow_mut().push(v.clone()))
        };

        let _done = value.start(StartOptions::to(10.0).with_from(4.0)).unwrap();
        assert_eq!(*seen.borrow(), vec![Animatable::Number(4.0)]);
        assert_eq!(value.from(), Animatable::Number(4.0));

        frame_loop.advance(50.0);
        assert_eq!(value.get(), Animatable::Number(7.0));
    }

    #[test]
    fn test_immediate_jumps() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 0.0, AnimationConfig::default());

        let result = value
            .start(StartOptions::to(8.0).with_immediate(true))
            .unwrap()
            .now_or_never()
            .unwrap()
            .unwrap();
        assert!(result.finished);
        assert_eq!(value.get(), Animatable::Number(8.0));
        assert!(!value.is_animating());
        assert!(frame_loop.is_idle());
    }

    #[test]
    fn test_stop_cancel_settles_pending() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 0.0, timed());

        let first = value.start(StartOptions::to(10.0)).unwrap();
        frame_loop.advance(20.0);
        let second = value.start(StartOptions::to(20.0)).unwrap();

        value.stop(true);
        value.stop(true);

        for done in [first, second] {
            let result = done.now_or_never().unwrap().unwrap();
            assert!(result.cancelled);
            assert!(!result.finished);
            assert_eq!(result.value, Animatable::Number(2.0));
        }

        // Restart after a cancel is always valid
        let done = value.start(StartOptions::to(0.0)).unwrap();
        while frame_loop.advance(16.0) {}
        assert!(done.now_or_never().unwrap().unwrap().finished);
    }

    #[test]
    fn test_set_settles_as_finished() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 0.0, timed());

        let done = value.start(StartOptions::to(10.0)).unwrap();
        value.set(42.0).unwrap();

        let result = done.now_or_never().unwrap().unwrap();
        assert!(result.finished && !result.cancelled);
        assert_eq!(value.get(), Animatable::Number(42.0));
        assert_eq!(value.goal(), Animatable::Number(42.0));
        assert!(!value.is_animating());
    }

    #[test]
    fn test_finish_jumps_to_goal() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 0.0, timed());

        let done = value.start(StartOptions::to(10.0)).unwrap();
        frame_loop.advance(10.0);
        value.finish();

        assert_eq!(value.get(), Animatable::Number(10.0));
        assert!(done.now_or_never().unwrap().unwrap().finished);
        assert!(!frame_loop.advance(16.0));
    }

    #[test]
    fn test_on_change_only_fires_on_change() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 0.0, timed());
        let calls = Rc::new(Cell::new(0));
        let sub = {
            let calls = calls.clone();
            value.on_change(move |_| calls.set(calls.get() + 1))
        };

        value.set(0.0).unwrap();
        assert_eq!(calls.get(), 0);

        value.set(1.0).unwrap();
        assert_eq!(calls.get(), 1);

        sub.unsubscribe();
        value.set(2.0).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_shape_mismatch_changes_nothing() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), [0.0, 0.0], timed());

        assert!(value.start(StartOptions::to(1.0)).is_err());
        assert!(value.set([1.0, 2.0, 3.0]).is_err());
        assert_eq!(value.get(), Animatable::from([0.0, 0.0]));
        assert!(frame_loop.is_idle());
    }

    #[test]
    fn test_array_components_animate_independently() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), [0.0, 100.0], timed());

        let _done = value.start(StartOptions::to([10.0, 50.0])).unwrap();
        frame_loop.advance(50.0);
        assert_eq!(value.get(), Animatable::from([5.0, 75.0]));
    }

    #[test]
    fn test_scheduler_dropped() {
        let handle = FrameLoop::new().handle();
        let value = AnimatedValue::new(&handle, 0.0, AnimationConfig::default());

        assert_eq!(
            value.start(StartOptions::to(1.0)).unwrap_err(),
            rebound_core::AnimationError::SchedulerDropped
        );
    }

    #[test]
    fn test_drop_while_animating_settles() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 0.0, timed());
        let done = value.start(StartOptions::to(1.0)).unwrap();

        // The loop still holds the value; dropping the loop releases it
        drop(value);
        drop(frame_loop);

        assert!(done.now_or_never().unwrap().unwrap().finished);
    }

    #[test]
    #[should_panic(expected = "disposed")]
    fn test_use_after_dispose_panics() {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(&frame_loop.handle(), 0.0, timed());
        value.dispose();
        value.pause();
    }
}
