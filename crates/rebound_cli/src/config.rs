//! Scenario file handling
//!
//! A scenario describes a group of keyed tracks played by one controller:
//!
//! ```toml
//! frame_ms = 16.0
//! max_frames = 300
//! format = "table"
//!
//! [[tracks]]
//! key = "opacity"
//! from = 0.0
//! to = 1.0
//! preset = "gentle"
//!
//! [[tracks]]
//! key = "offset"
//! from = [0.0, 40.0]
//! to = [0.0, 0.0]
//! config = { duration = 250.0, easing = "ease-out-cubic" }
//! ```

use anyhow::{Context, Result};
use rebound_animation::{AnimationConfig, Decay, Easing, SpringPreset, Velocity};
use rebound_core::Animatable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// =============================================================================
// Scenario
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct Scenario {
    /// Milliseconds per frame
    #[serde(default = "default_frame_ms")]
    pub frame_ms: f64,
    /// Frames to play before giving up on settling
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
    #[serde(default)]
    pub format: OutputFormat,
    /// Jump every track to its goal instead of animating
    #[serde(default)]
    pub immediate: bool,
    #[serde(default)]
    pub tracks: Vec<TrackSpec>,
}

fn default_frame_ms() -> f64 {
    16.0
}

fn default_max_frames() -> usize {
    600
}

impl Scenario {
    /// Load and validate a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content)?;

        if scenario.tracks.is_empty() {
            anyhow::bail!("scenario has no tracks");
        }
        if scenario.frame_ms.is_nan() || scenario.frame_ms <= 0.0 {
            anyhow::bail!("frame_ms must be positive, got {}", scenario.frame_ms);
        }
        Ok(scenario)
    }
}

/// Row format for `rebound play`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    /// One JSON object per line
    Json,
}

// =============================================================================
// Tracks
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct TrackSpec {
    pub key: String,
    /// Starting value; defaults to `to`
    #[serde(default)]
    pub from: Option<Animatable>,
    pub to: Animatable,
    /// Base configuration, before `config` overrides
    #[serde(default)]
    pub preset: Option<SpringPreset>,
    #[serde(default)]
    pub config: TrackConfig,
}

impl TrackSpec {
    /// The preset (or default spring) with this track's overrides applied
    pub fn animation_config(&self) -> AnimationConfig {
        self.config.apply(self.preset.unwrap_or_default().config())
    }
}

/// Per-track overrides; unset fields keep the preset's value
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackConfig {
    pub tension: Option<f64>,
    pub friction: Option<f64>,
    pub mass: Option<f64>,
    pub velocity: Option<Velocity>,
    pub precision: Option<f64>,
    pub clamp: Option<bool>,
    pub easing: Option<Easing>,
    pub duration: Option<f64>,
    pub decay: Option<Decay>,
    pub bounce: Option<f64>,
    pub round: Option<f64>,
    pub rest_velocity: Option<f64>,
    pub progress: Option<f64>,
}

impl TrackConfig {
    fn apply(&self, mut config: AnimationConfig) -> AnimationConfig {
        if let Some(tension) = self.tension {
            config.tension = tension;
        }
        if let Some(friction) = self.friction {
            config.friction = friction;
        }
        if let Some(mass) = self.mass {
            config.mass = mass;
        }
        if let Some(velocity) = &self.velocity {
            config.velocity = velocity.clone();
        }
        if let Some(clamp) = self.clamp {
            config.clamp = clamp;
        }
        if let Some(easing) = self.easing {
            config.easing = easing;
        }
        config.precision = self.precision.or(config.precision);
        config.duration = self.duration.or(config.duration);
        config.decay = self.decay.or(config.decay);
        config.bounce = self.bounce.or(config.bounce);
        config.round = self.round.or(config.round);
        config.rest_velocity = self.rest_velocity.or(config.rest_velocity);
        config.progress = self.progress.or(config.progress);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebound_animation::StepMode;

    const SAMPLE: &str = r#"
        frame_ms = 8.0

        [[tracks]]
        key = "opacity"
        from = 0
        to = 1
        preset = "wobbly"
        config = { clamp = true }

        [[tracks]]
        key = "offset"
        from = [0.0, 40.0]
        to = [0.0, 0.0]
        config = { duration = 250.0, easing = "ease-out-cubic" }

        [[tracks]]
        key = "fling"
        to = 0.0
        config = { decay = true, velocity = 1.5 }
    "#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::parse(SAMPLE).unwrap();
        assert_eq!(scenario.frame_ms, 8.0);
        assert_eq!(scenario.max_frames, 600);
        assert_eq!(scenario.format, OutputFormat::Table);
        assert_eq!(scenario.tracks.len(), 3);

        let opacity = &scenario.tracks[0];
        assert_eq!(opacity.from, Some(Animatable::Number(0.0)));
        assert_eq!(opacity.to, Animatable::Number(1.0));
        assert_eq!(scenario.tracks[1].to, Animatable::from([0.0, 0.0]));
    }

    #[test]
    fn test_overrides_apply_onto_preset() {
        let scenario = Scenario::parse(SAMPLE).unwrap();

        let wobbly = scenario.tracks[0].animation_config();
        assert_eq!((wobbly.tension, wobbly.friction), (180.0, 12.0));
        assert!(wobbly.clamp);

        let offset = scenario.tracks[1].animation_config();
        assert_eq!(offset.mode(), StepMode::Duration(250.0));
        assert_eq!(offset.easing.name(), Some("ease-out-cubic"));

        let fling = scenario.tracks[2].animation_config();
        assert_eq!(fling.mode(), StepMode::Decay(0.998));
        assert_eq!(fling.velocity, Velocity::Uniform(1.5));
    }

    #[test]
    fn test_rejects_empty_and_unknown() {
        assert!(Scenario::parse("frame_ms = 16.0").is_err());
        assert!(Scenario::parse(
            r#"
            [[tracks]]
            key = "x"
            to = 1.0
            config = { stiffness = 3.0 }
            "#
        )
        .is_err());
        assert!(Scenario::parse(
            r#"
            frame_ms = 0.0
            [[tracks]]
            key = "x"
            to = 1.0
            "#
        )
        .is_err());
    }
}
