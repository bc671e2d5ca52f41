//! Rebound Animation System
//!
//! Spring physics, momentum decay and eased tweens for numbers, numeric
//! arrays and numeric records, all advanced by one explicitly owned frame
//! loop.
//!
//! # Features
//!
//! - **Animated Values**: Move toward a goal and notify observers on change
//! - **Three Stepping Modes**: Spring, decay, or duration with easing
//! - **Frame Loop**: Advances active animations in priority order per tick
//! - **Controllers**: Drive a named group of values as one animation
//! - **Completions**: Every start returns a future with the final outcome
//! - **Presets**: Named spring configurations and a library of easings
//!
//! Everything is single-threaded. Values share state through `Rc` and the
//! frame loop is ticked by the host with elapsed milliseconds.

pub mod animated;
pub mod completion;
pub mod controller;
pub mod easing;
mod integrator;
pub mod scheduler;
pub mod spring;

pub use animated::{AnimatedValue, StartOptions};
pub use completion::{AnimationResult, Completion, ControllerCompletion, ControllerResult};
pub use controller::{AnimationController, ControllerBuilder, ControllerProps, PerKey, Prop};
pub use easing::{Easing, UnknownEasing};
pub use scheduler::{AnimationRef, FrameAnimation, FrameLoop, LoopHandle, WakeCallback};
pub use spring::{AnimationConfig, Decay, SpringPreset, StepMode, Velocity, DEFAULT_DECAY};

pub use rebound_core::{Animatable, AnimationError, Components, Result, Shape, Subscription};
