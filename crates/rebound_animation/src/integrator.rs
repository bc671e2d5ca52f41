//! Per-component stepping
//!
//! Each scalar component of an animated value advances independently under
//! one of three rules, chosen per call by [`AnimationConfig::mode`]:
//!
//! - **Duration**: `from + easing(p) * (to - from)` with `p` the clamped
//!   normalized elapsed time
//! - **Decay**: exponential velocity decay, `to` is ignored
//! - **Spring**: semi-implicit Euler in fixed 1ms sub-steps
//!
//! A spring with zero friction and non-zero velocity never satisfies its
//! rest condition and runs until stopped.

use crate::spring::{AnimationConfig, StepMode};

/// Spring sub-step length in milliseconds
const SUB_STEP_MS: f64 = 1.0;

/// Scales tension so conventional magnitudes (e.g. 170) suit millisecond steps
const TENSION_SCALE: f64 = 1e-6;

/// Scales friction so conventional magnitudes (e.g. 26) suit millisecond steps
const FRICTION_SCALE: f64 = 1e-3;

/// State of one scalar component within the current animation segment
#[derive(Clone, Debug, Default)]
pub(crate) struct Component {
    pub position: f64,
    pub last_position: f64,
    /// Units per millisecond
    pub velocity: f64,
    /// Velocity at segment start, captured once per segment
    pub initial_velocity: f64,
    /// Milliseconds since the segment began
    pub elapsed_time: f64,
    /// Cached duration-mode progress, used to rescale when the duration changes
    pub duration_progress: f64,
    pub done: bool,
}

/// Fixed inputs for one advance of one component
pub(crate) struct Step<'a> {
    pub dt: f64,
    pub from: f64,
    pub to: f64,
    pub config: &'a AnimationConfig,
    /// Set when the configured duration differs from the previous advance
    pub duration_changed: bool,
}

impl Component {
    pub fn new(position: f64) -> Self {
        Self {
            position,
            last_position: position,
            ..Self::default()
        }
    }

    /// Begin a new segment at `position`
    pub fn reset(&mut self, position: f64, initial_velocity: f64) {
        *self = Self {
            position,
            last_position: position,
            velocity: initial_velocity,
            initial_velocity,
            ..Self::default()
        };
    }

    /// Place the component without starting a segment
    pub fn place(&mut self, position: f64) {
        self.position = position;
        self.last_position = position;
        self.done = true;
    }

    /// Advance by `step.dt` milliseconds. Returns `true` if the position changed.
    pub fn advance(&mut self, step: &Step<'_>, index: usize) -> bool {
        if self.done {
            return false;
        }

        let (position, velocity, finished) = match step.config.mode() {
            StepMode::Duration(duration) => self.step_duration(step, duration),
            StepMode::Decay(rate) => self.step_decay(step, rate),
            StepMode::Spring => self.step_spring(step),
        };

        if position.is_nan() {
            tracing::warn!(
                component = index,
                from = step.from,
                to = step.to,
                "got NaN while animating; forcing component to rest"
            );
            self.done = true;
            self.velocity = 0.0;
            return false;
        }

        let position = match step.config.round {
            Some(round) if round > 0.0 => (position / round).round() * round,
            _ => position,
        };

        self.last_position = self.position;
        self.position = position;
        self.velocity = velocity;
        self.done = finished;

        self.position != self.last_position
    }

    fn step_duration(&mut self, step: &Step<'_>, duration: f64) -> (f64, f64, bool) {
        let mut p = 1.0;

        if duration > 0.0 {
            if step.duration_changed && self.duration_progress > 0.0 {
                // Keep the visual position when the duration changes mid-flight
                self.elapsed_time = duration * self.duration_progress;
            }
            self.elapsed_time += step.dt;

            p = step.config.progress.unwrap_or(0.0) + self.elapsed_time / duration;
            p = p.clamp(0.0, 1.0);
            self.duration_progress = p;
        }

        let position = step.from + step.config.easing.apply(p) * (step.to - step.from);
        let velocity = if step.dt > 0.0 {
            (position - self.position) / step.dt
        } else {
            self.velocity
        };

        (position, velocity, p >= 1.0)
    }

    fn step_decay(&mut self, step: &Step<'_>, rate: f64) -> (f64, f64, bool) {
        let v0 = self.initial_velocity;
        let travel = |elapsed: f64| {
            let e = (-(1.0 - rate) * elapsed).exp();
            (step.from + (v0 / (1.0 - rate)) * (1.0 - e), e)
        };

        // Compare unrounded positions so `round` cannot stall the rest check
        let (previous, _) = travel(self.elapsed_time);
        self.elapsed_time += step.dt;
        let (position, e) = travel(self.elapsed_time);
        let finished = (position - previous).abs() <= precision(step);

        (position, v0 * e, finished)
    }

    fn step_spring(&mut self, step: &Step<'_>) -> (f64, f64, bool) {
        self.elapsed_time += step.dt;

        let config = step.config;
        if config.tension <= 0.0 {
            return (self.position, 0.0, true);
        }

        let to = step.to;
        let precision = precision(step);
        let rest_velocity = config.rest_velocity.unwrap_or(precision / 10.0);
        let bounce = match config.bounce {
            Some(bounce) if bounce > 0.0 && !config.clamp => Some(bounce),
            _ => None,
        };
        let growing = if step.from == to {
            self.initial_velocity > 0.0
        } else {
            step.from < to
        };

        let mut position = self.position;
        let mut velocity = self.velocity;
        let mut finished = false;

        let sub_steps = (step.dt / SUB_STEP_MS).ceil().max(0.0) as usize;
        for _ in 0..sub_steps {
            let moving = velocity.abs() > rest_velocity;
            if !moving {
                finished = (to - position).abs() <= precision;
                if finished {
                    break;
                }
            }

            if let Some(bounce) = bounce {
                if position == to || (position > to) == growing {
                    velocity = -velocity * bounce;
                    position = to;
                }
            }

            let spring_force = -config.tension * TENSION_SCALE * (position - to);
            let damping_force = -config.friction * FRICTION_SCALE * velocity;
            let acceleration = (spring_force + damping_force) / config.mass;

            velocity += acceleration * SUB_STEP_MS;
            position += velocity * SUB_STEP_MS;

            if config.clamp && step.from != to && (position > to) == growing {
                position = to;
                velocity = 0.0;
                finished = true;
                break;
            }
        }

        (position, velocity, finished)
    }
}

/// Arrival distance: configured, or relative to the segment's travel
fn precision(step: &Step<'_>) -> f64 {
    step.config.precision.unwrap_or_else(|| {
        if step.from == step.to {
            0.005
        } else {
            ((step.to - step.from).abs() * 0.001).min(1.0)
        }
    })
}
