//! Aggregate controller
//!
//! An [`AnimationController`] owns a fixed, ordered set of named
//! [`AnimatedValue`]s and drives them as one unit. Starting the controller
//! returns a single [`ControllerCompletion`] that settles once every key it
//! dispatched has settled.
//!
//! ```ignore
//! let card = AnimationController::builder(&frame_loop.handle())
//!     .track("opacity", 0.0)
//!     .track("offset", [0.0, 0.0])
//!     .config(AnimationConfig::stiff())
//!     .build()?;
//!
//! let shown = card.start(
//!     ControllerProps::new()
//!         .to("opacity", 1.0)
//!         .to("offset", [0.0, -12.0]),
//! )?;
//! ```

use crate::animated::{AnimatedValue, StartOptions, WeakValue};
use crate::completion::{AnimationResult, ControllerCompletion, ControllerResult};
use crate::scheduler::LoopHandle;
use crate::spring::AnimationConfig;
use futures::channel::oneshot;
use indexmap::IndexMap;
use rebound_core::{Animatable, AnimationError, Result};
use std::cell::RefCell;
use std::rc::Rc;

// ============================================================================
// Start properties
// ============================================================================

/// A goal or start value: given directly or produced when the start runs
#[derive(Clone)]
pub enum Prop {
    Value(Animatable),
    Producer(Rc<dyn Fn() -> Animatable>),
}

impl Prop {
    fn resolve(&self) -> Animatable {
        match self {
            Prop::Value(value) => value.clone(),
            Prop::Producer(produce) => produce(),
        }
    }
}

impl From<Animatable> for Prop {
    fn from(value: Animatable) -> Self {
        Prop::Value(value)
    }
}

impl From<f64> for Prop {
    fn from(value: f64) -> Self {
        Prop::Value(value.into())
    }
}

impl From<Vec<f64>> for Prop {
    fn from(value: Vec<f64>) -> Self {
        Prop::Value(value.into())
    }
}

impl<const N: usize> From<[f64; N]> for Prop {
    fn from(value: [f64; N]) -> Self {
        Prop::Value(value.into())
    }
}

impl std::fmt::Debug for Prop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prop::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Prop::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// A setting shared by every key, or chosen per key
#[derive(Clone)]
pub enum PerKey<T> {
    All(T),
    /// `None` leaves the key's setting untouched
    Select(Rc<dyn Fn(&str) -> Option<T>>),
}

impl<T: Clone> PerKey<T> {
    fn resolve(&self, key: &str) -> Option<T> {
        match self {
            PerKey::All(value) => Some(value.clone()),
            PerKey::Select(select) => select(key),
        }
    }
}

/// Properties for [`AnimationController::start`]
///
/// Keys the controller does not own are ignored.
#[derive(Clone, Default)]
pub struct ControllerProps {
    to: IndexMap<String, Prop>,
    from: IndexMap<String, Prop>,
    config: Option<PerKey<AnimationConfig>>,
    immediate: Option<PerKey<bool>>,
}

impl ControllerProps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Animate `key` to `to`
    pub fn to(mut self, key: impl Into<String>, to: impl Into<Prop>) -> Self {
        self.to.insert(key.into(), to.into());
        self
    }

    /// Animate `key` to whatever `produce` returns when the start runs
    pub fn to_with<F>(self, key: impl Into<String>, produce: F) -> Self
    where
        F: Fn() -> Animatable + 'static,
    {
        self.to(key, Prop::Producer(Rc::new(produce)))
    }

    /// Jump `key` to `from` before animating
    pub fn from(mut self, key: impl Into<String>, from: impl Into<Prop>) -> Self {
        self.from.insert(key.into(), from.into());
        self
    }

    pub fn from_with<F>(self, key: impl Into<String>, produce: F) -> Self
    where
        F: Fn() -> Animatable + 'static,
    {
        self.from(key, Prop::Producer(Rc::new(produce)))
    }

    /// Use `config` for every key
    pub fn config(mut self, config: impl Into<AnimationConfig>) -> Self {
        self.config = Some(PerKey::All(config.into()));
        self
    }

    /// Choose a config per key
    pub fn config_with<F>(mut self, select: F) -> Self
    where
        F: Fn(&str) -> Option<AnimationConfig> + 'static,
    {
        self.config = Some(PerKey::Select(Rc::new(select)));
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = Some(PerKey::All(immediate));
        self
    }

    pub fn immediate_with<F>(mut self, select: F) -> Self
    where
        F: Fn(&str) -> Option<bool> + 'static,
    {
        self.immediate = Some(PerKey::Select(Rc::new(select)));
        self
    }

    /// Start options for `key`, or `None` if nothing applies to it
    fn options_for(&self, key: &str) -> Option<StartOptions> {
        let to = self.to.get(key).map(Prop::resolve);
        let from = self.from.get(key).map(Prop::resolve);
        let config = self.config.as_ref().and_then(|c| c.resolve(key));
        let immediate = self.immediate.as_ref().and_then(|i| i.resolve(key));

        if to.is_none() && from.is_none() && config.is_none() && immediate.is_none() {
            return None;
        }
        Some(StartOptions {
            to,
            from,
            config,
            immediate: immediate.unwrap_or(false),
        })
    }
}

impl std::fmt::Debug for ControllerProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerProps")
            .field("to", &self.to)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

struct Track {
    key: String,
    to: Animatable,
    from: Option<Animatable>,
}

/// Builds an [`AnimationController`]
pub struct ControllerBuilder {
    frame_loop: LoopHandle,
    tracks: Vec<Track>,
    config: AnimationConfig,
    immediate: bool,
    looping: bool,
}

impl ControllerBuilder {
    /// Add a key resting at `to`
    pub fn track(mut self, key: impl Into<String>, to: impl Into<Animatable>) -> Self {
        self.tracks.push(Track {
            key: key.into(),
            to: to.into(),
            from: None,
        });
        self
    }

    /// Add a key that starts at `from` and animates to `to` on build
    pub fn track_from(
        mut self,
        key: impl Into<String>,
        from: impl Into<Animatable>,
        to: impl Into<Animatable>,
    ) -> Self {
        self.tracks.push(Track {
            key: key.into(),
            to: to.into(),
            from: Some(from.into()),
        });
        self
    }

    /// Config for every key
    pub fn config(mut self, config: impl Into<AnimationConfig>) -> Self {
        self.config = config.into();
        self
    }

    /// Set initial values directly instead of animating from `from`
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    /// Record that the caller intends to loop
    ///
    /// The controller never restarts itself; callers re-issue `start`.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Create the values, starting any whose `from` differs from `to`
    ///
    /// Fails if a track's `from` and `to` have different shapes. A key
    /// added twice keeps its first position and its last definition.
    pub fn build(self) -> Result<AnimationController> {
        let mut values = IndexMap::with_capacity(self.tracks.len());

        for Track { key, to, from } in self.tracks {
            let value = AnimatedValue::new(
                &self.frame_loop,
                from.clone().unwrap_or_else(|| to.clone()),
                self.config.clone(),
            );

            if let Some(from) = from {
                value.shape().check(&to)?;
                if from != to {
                    if self.immediate {
                        value.set(to)?;
                    } else {
                        let _ = value.start(StartOptions::to(to))?;
                    }
                }
            }

            if values.insert(key.clone(), value).is_some() {
                tracing::debug!(key = %key, "duplicate controller key replaced");
            }
        }

        tracing::debug!(keys = values.len(), looping = self.looping, "controller built");
        Ok(AnimationController {
            values,
            looping: self.looping,
        })
    }
}

// ============================================================================
// Controller
// ============================================================================

/// A named group of animated values driven as one unit
///
/// Dropping the controller (or calling [`dispose`](Self::dispose)) stops
/// every value, settling pending completions as finished. Value handles
/// obtained through [`value`](Self::value) panic on any further control
/// call.
pub struct AnimationController {
    values: IndexMap<String, AnimatedValue>,
    looping: bool,
}

impl AnimationController {
    pub fn builder(frame_loop: &LoopHandle) -> ControllerBuilder {
        ControllerBuilder {
            frame_loop: frame_loop.clone(),
            tracks: Vec::new(),
            config: AnimationConfig::default(),
            immediate: false,
            looping: false,
        }
    }

    /// Start every key that `props` applies to
    ///
    /// Every dispatched key is validated before any starts, so a shape
    /// mismatch leaves all keys untouched. The returned completion settles
    /// once all dispatched keys have settled: `finished` if all finished,
    /// `cancelled` if any was cancelled, with a snapshot of every key taken
    /// the moment the last one settles. With nothing to dispatch it settles at
    /// once as finished.
    pub fn start(&self, props: ControllerProps) -> Result<ControllerCompletion> {
        for key in props.to.keys().chain(props.from.keys()) {
            if !self.values.contains_key(key) {
                tracing::debug!(key = %key, "ignoring props for unknown key");
            }
        }

        let mut dispatch = Vec::new();
        for (key, value) in &self.values {
            let Some(options) = props.options_for(key) else {
                continue;
            };
            let shape = value.shape();
            if let Some(to) = &options.to {
                shape.check(to)?;
            }
            if let Some(from) = &options.from {
                shape.check(from)?;
            }
            dispatch.push((value, options));
        }

        tracing::debug!(dispatched = dispatch.len(), "controller start");
        if dispatch.is_empty() {
            return Ok(ControllerCompletion::ready(ControllerResult {
                value: self.get_all(),
                finished: true,
                cancelled: false,
            }));
        }

        let (sender, completion) = ControllerCompletion::pending();
        let aggregate = Rc::new(RefCell::new(Aggregate {
            remaining: dispatch.len(),
            finished: true,
            cancelled: false,
            values: self
                .values
                .iter()
                .map(|(key, value)| (key.clone(), value.downgrade()))
                .collect(),
            sender: Some(sender),
        }));

        for (value, options) in dispatch {
            let aggregate = aggregate.clone();
            value.start_with(
                options,
                Box::new(move |result: AnimationResult| aggregate.borrow_mut().settle(&result)),
            )?;
        }
        Ok(completion)
    }

    /// Stop every value; see [`AnimatedValue::stop`]
    pub fn stop(&self, cancel: bool) {
        for value in self.values.values() {
            value.stop(cancel);
        }
    }

    pub fn pause(&self) {
        for value in self.values.values() {
            value.pause();
        }
    }

    pub fn resume(&self) {
        for value in self.values.values() {
            value.resume();
        }
    }

    /// Jump every animating value to its goal
    pub fn finish(&self) {
        for value in self.values.values() {
            value.finish();
        }
    }

    /// Stop only `keys`; unknown keys are ignored
    pub fn stop_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>, cancel: bool) {
        for value in self.select(keys) {
            value.stop(cancel);
        }
    }

    pub fn pause_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        for value in self.select(keys) {
            value.pause();
        }
    }

    pub fn resume_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        for value in self.select(keys) {
            value.resume();
        }
    }

    /// Current value of `key`
    pub fn get(&self, key: &str) -> Result<Animatable> {
        self.values
            .get(key)
            .map(AnimatedValue::get)
            .ok_or_else(|| AnimationError::UnknownKey(key.to_string()))
    }

    /// Current value of every key, in declared order
    pub fn get_all(&self) -> IndexMap<String, Animatable> {
        snapshot(&self.values)
    }

    /// The value animating `key`
    pub fn value(&self, key: &str) -> Option<&AnimatedValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// At least one value is animating and not paused
    pub fn is_animating(&self) -> bool {
        self.values.values().any(|value| !value.is_idle())
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Stop every value and release them
    pub fn dispose(self) {
        drop(self);
    }

    fn select<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Vec<&AnimatedValue> {
        keys.into_iter()
            .filter_map(|key| self.values.get(key))
            .collect()
    }
}

impl Drop for AnimationController {
    fn drop(&mut self) {
        for value in self.values.values() {
            value.dispose();
        }
        self.values.clear();
        tracing::debug!("controller disposed");
    }
}

impl std::fmt::Debug for AnimationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationController")
            .field("values", &self.values)
            .field("looping", &self.looping)
            .finish()
    }
}

fn snapshot(values: &IndexMap<String, AnimatedValue>) -> IndexMap<String, Animatable> {
    values
        .iter()
        .map(|(key, value)| (key.clone(), value.get()))
        .collect()
}

/// Shared by the keys of one controller start; the last to settle sends
struct Aggregate {
    remaining: usize,
    finished: bool,
    cancelled: bool,
    values: IndexMap<String, WeakValue>,
    sender: Option<oneshot::Sender<ControllerResult>>,
}

impl Aggregate {
    fn settle(&mut self, result: &AnimationResult) {
        self.finished &= result.finished;
        self.cancelled |= result.cancelled;
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return;
        }

        let Some(sender) = self.sender.take() else {
            return;
        };
        // Keys whose value is being dropped have nothing left to report
        let value = self
            .values
            .iter()
            .filter_map(|(key, value)| value.upgrade().map(|value| (key.clone(), value.get())))
            .collect();
        let _ = sender.send(ControllerResult {
            value,
            finished: self.finished,
            cancelled: self.cancelled,
        });
    }
}
