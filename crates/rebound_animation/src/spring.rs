//! Animation configuration
//!
//! One [`AnimationConfig`] drives every stepping mode. Which mode runs is
//! decided by which fields are set: `duration` selects eased interpolation,
//! otherwise `decay` selects momentum decay, otherwise the spring runs.
//!
//! The config is not validated. A non-positive `mass`, a `decay` rate of
//! `1.0` or more, or a negative `duration` produce undefined motion (in
//! practice infinities or NaN, which the integrator then forces to rest).

use crate::easing::Easing;
use std::fmt;
use std::str::FromStr;

/// Decay rate used when decay is enabled without an explicit rate
pub const DEFAULT_DECAY: f64 = 0.998;

/// Momentum decay setting
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "DecaySetting", into = "DecaySetting")
)]
pub enum Decay {
    /// Decay at [`DEFAULT_DECAY`]
    Default,
    /// Decay at the given per-millisecond retention rate
    Rate(f64),
}

impl Decay {
    pub fn rate(&self) -> f64 {
        match self {
            Decay::Default => DEFAULT_DECAY,
            Decay::Rate(rate) => *rate,
        }
    }
}

/// Config files spell decay as `decay = true` or `decay = 0.99`
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
enum DecaySetting {
    Flag(bool),
    Rate(f64),
}

#[cfg(feature = "serde")]
impl TryFrom<DecaySetting> for Decay {
    type Error = String;

    fn try_from(setting: DecaySetting) -> Result<Self, Self::Error> {
        match setting {
            DecaySetting::Flag(true) => Ok(Decay::Default),
            DecaySetting::Flag(false) => {
                Err("`decay = false` is spelled by omitting decay".to_string())
            }
            DecaySetting::Rate(rate) => Ok(Decay::Rate(rate)),
        }
    }
}

#[cfg(feature = "serde")]
impl From<Decay> for DecaySetting {
    fn from(decay: Decay) -> Self {
        match decay {
            Decay::Default => DecaySetting::Flag(true),
            Decay::Rate(rate) => DecaySetting::Rate(rate),
        }
    }
}

/// Initial velocity, in units per millisecond
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum Velocity {
    /// Same velocity for every component
    Uniform(f64),
    /// One velocity per component; missing entries are zero
    PerComponent(Vec<f64>),
}

impl Velocity {
    pub fn component(&self, index: usize) -> f64 {
        match self {
            Velocity::Uniform(v) => *v,
            Velocity::PerComponent(vs) => vs.get(index).copied().unwrap_or(0.0),
        }
    }
}

impl Default for Velocity {
    fn default() -> Self {
        Velocity::Uniform(0.0)
    }
}

impl From<f64> for Velocity {
    fn from(v: f64) -> Self {
        Velocity::Uniform(v)
    }
}

impl From<Vec<f64>> for Velocity {
    fn from(vs: Vec<f64>) -> Self {
        Velocity::PerComponent(vs)
    }
}

/// Resolved configuration for an animated value
///
/// `start` replaces the whole config; fields are never merged across calls.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "snake_case")
)]
pub struct AnimationConfig {
    /// Spring restoring force
    pub tension: f64,
    /// Spring damping
    pub friction: f64,
    pub mass: f64,
    /// Starting velocity, used by the spring and decay modes
    pub velocity: Velocity,
    /// Distance from the goal that counts as arrived
    pub precision: Option<f64>,
    /// Stop a spring at the goal instead of overshooting
    pub clamp: bool,
    /// Easing for duration mode
    pub easing: Easing,
    /// Duration in milliseconds; selects duration mode
    pub duration: Option<f64>,
    /// Selects decay mode when no duration is set
    pub decay: Option<Decay>,
    /// Velocity retained when a spring bounces off its goal
    pub bounce: Option<f64>,
    /// Quantize positions to multiples of this value
    pub round: Option<f64>,
    /// Speed under which a spring counts as not moving
    pub rest_velocity: Option<f64>,
    /// Starting progress (0 to 1) for duration mode
    pub progress: Option<f64>,
}

impl AnimationConfig {
    /// Create a spring configuration
    pub fn new(tension: f64, friction: f64, mass: f64) -> Self {
        Self {
            tension,
            friction,
            mass,
            velocity: Velocity::default(),
            precision: None,
            clamp: false,
            easing: Easing::Linear,
            duration: None,
            decay: None,
            bounce: None,
            round: None,
            rest_velocity: None,
            progress: None,
        }
    }

    /// A gentle, slow spring (good for page transitions)
    pub fn gentle() -> Self {
        SpringPreset::Gentle.config()
    }

    /// A wobbly spring with overshoot (good for playful UI)
    pub fn wobbly() -> Self {
        SpringPreset::Wobbly.config()
    }

    /// A stiff, snappy spring (good for buttons)
    pub fn stiff() -> Self {
        SpringPreset::Stiff.config()
    }

    /// A slow, heavily damped spring
    pub fn slow() -> Self {
        SpringPreset::Slow.config()
    }

    /// A very slow spring with no overshoot
    pub fn molasses() -> Self {
        SpringPreset::Molasses.config()
    }

    /// A duration-based config with the given easing
    pub fn timed(duration_ms: f64, easing: Easing) -> Self {
        Self::default().with_duration(duration_ms).with_easing(easing)
    }

    pub fn with_tension(mut self, tension: f64) -> Self {
        self.tension = tension;
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_velocity(mut self, velocity: impl Into<Velocity>) -> Self {
        self.velocity = velocity.into();
        self
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    pub fn with_decay(mut self, decay: Decay) -> Self {
        self.decay = Some(decay);
        self
    }

    pub fn with_bounce(mut self, bounce: f64) -> Self {
        self.bounce = Some(bounce);
        self
    }

    pub fn with_round(mut self, round: f64) -> Self {
        self.round = Some(round);
        self
    }

    pub fn with_rest_velocity(mut self, rest_velocity: f64) -> Self {
        self.rest_velocity = Some(rest_velocity);
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The stepping mode this config selects
    pub fn mode(&self) -> StepMode {
        if let Some(duration) = self.duration {
            StepMode::Duration(duration)
        } else if let Some(decay) = self.decay {
            StepMode::Decay(decay.rate())
        } else {
            StepMode::Spring
        }
    }

    /// Calculate critical damping for this spring's tension and mass
    pub fn critical_damping(&self) -> f64 {
        2.0 * (self.tension * self.mass).sqrt()
    }

    /// Check if the spring is underdamped (will oscillate)
    pub fn is_underdamped(&self) -> bool {
        self.friction < self.critical_damping()
    }

    /// Check if the spring is critically damped (no oscillation, fastest settling)
    pub fn is_critically_damped(&self) -> bool {
        (self.friction - self.critical_damping()).abs() < 0.01
    }

    /// Check if the spring is overdamped (slow settling, no oscillation)
    pub fn is_overdamped(&self) -> bool {
        self.friction > self.critical_damping()
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        SpringPreset::Default.config()
    }
}

/// Stepping rule selected by an [`AnimationConfig`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepMode {
    /// Eased interpolation over a duration in milliseconds
    Duration(f64),
    /// Momentum decay at a retention rate
    Decay(f64),
    Spring,
}

/// Named tension/friction pairs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum SpringPreset {
    #[default]
    Default,
    Gentle,
    Wobbly,
    Stiff,
    Slow,
    Molasses,
}

impl SpringPreset {
    pub const ALL: [SpringPreset; 6] = [
        SpringPreset::Default,
        SpringPreset::Gentle,
        SpringPreset::Wobbly,
        SpringPreset::Stiff,
        SpringPreset::Slow,
        SpringPreset::Molasses,
    ];

    /// `(tension, friction)`
    pub fn parameters(&self) -> (f64, f64) {
        match self {
            SpringPreset::Default => (170.0, 26.0),
            SpringPreset::Gentle => (120.0, 14.0),
            SpringPreset::Wobbly => (180.0, 12.0),
            SpringPreset::Stiff => (210.0, 20.0),
            SpringPreset::Slow => (280.0, 60.0),
            SpringPreset::Molasses => (280.0, 120.0),
        }
    }

    pub fn config(&self) -> AnimationConfig {
        let (tension, friction) = self.parameters();
        AnimationConfig::new(tension, friction, 1.0)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpringPreset::Default => "default",
            SpringPreset::Gentle => "gentle",
            SpringPreset::Wobbly => "wobbly",
            SpringPreset::Stiff => "stiff",
            SpringPreset::Slow => "slow",
            SpringPreset::Molasses => "molasses",
        }
    }
}

impl fmt::Display for SpringPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpringPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpringPreset::ALL
            .iter()
            .find(|preset| preset.name() == s.trim())
            .copied()
            .ok_or_else(|| format!("unknown spring preset '{s}'"))
    }
}

impl From<SpringPreset> for AnimationConfig {
    fn from(preset: SpringPreset) -> Self {
        preset.config()
    }
}
