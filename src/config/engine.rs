// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{path::Path, time::Duration};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::MixerOptions;
use crate::chain::clamp_feedback;
use crate::pattern::RANDOMIZE_PROBABILITY;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_TRIGGER_LATENCY: Duration = Duration::from_millis(10);
const DEFAULT_DELAY_TIME: Duration = Duration::from_millis(250);
const DEFAULT_DELAY_FEEDBACK: f32 = 0.4;
const DEFAULT_EXPORT_SAMPLE_RATE: u32 = 44100;

/// What happens when a channel triggers while its previous sound is still playing.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerBehavior {
    /// The earlier sound on the channel starts its release when the new one starts.
    #[default]
    Cut,
    /// Sounds on the channel overlap freely.
    Polyphonic,
}

/// Engine settings, read from a YAML or JSON file. Every field is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// The output device. Names starting with "mock" select the in-process mock.
    device: Option<String>,

    /// How far ahead of the audio clock live triggers are scheduled.
    trigger_latency: Option<String>,

    /// Echo time of the shared delay bus.
    delay_time: Option<String>,

    /// Feedback of the shared delay bus, clamped below 1.
    delay_feedback: Option<f32>,

    /// Voice handling on retrigger.
    #[serde(default)]
    retrigger: RetriggerBehavior,

    /// Step activation probability used by pattern randomization.
    randomize_probability: Option<f64>,

    /// Sample rate of exported audio.
    export_sample_rate: Option<u32>,
}

impl EngineConfig {
    /// New will create a configuration that uses the given output device.
    pub fn new(device: &str) -> EngineConfig {
        EngineConfig {
            device: Some(device.to_string()),
            ..EngineConfig::default()
        }
    }

    /// Parse an engine configuration from a file.
    pub fn deserialize(path: &Path) -> Result<EngineConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<EngineConfig>()?)
    }

    /// Returns the output device name.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the trigger latency (default: 10ms).
    pub fn trigger_latency(&self) -> Result<Duration, ConfigError> {
        parse_duration("trigger_latency", &self.trigger_latency, DEFAULT_TRIGGER_LATENCY)
    }

    /// Returns the delay bus echo time (default: 250ms).
    pub fn delay_time(&self) -> Result<Duration, ConfigError> {
        parse_duration("delay_time", &self.delay_time, DEFAULT_DELAY_TIME)
    }

    /// Returns the delay bus feedback (default: 0.4, never more than 0.95).
    pub fn delay_feedback(&self) -> f32 {
        clamp_feedback(self.delay_feedback.unwrap_or(DEFAULT_DELAY_FEEDBACK))
    }

    pub fn retrigger(&self) -> RetriggerBehavior {
        self.retrigger
    }

    /// Returns the randomization probability (default: 0.15).
    pub fn randomize_probability(&self) -> f64 {
        self.randomize_probability
            .filter(|p| p.is_finite())
            .unwrap_or(RANDOMIZE_PROBABILITY)
            .clamp(0.0, 1.0)
    }

    /// Returns the export sample rate (default: 44100).
    pub fn export_sample_rate(&self) -> u32 {
        self.export_sample_rate
            .filter(|rate| *rate > 0)
            .unwrap_or(DEFAULT_EXPORT_SAMPLE_RATE)
    }

    /// Returns the mixer options for this configuration.
    pub fn mixer_options(&self) -> Result<MixerOptions, ConfigError> {
        Ok(MixerOptions {
            retrigger: self.retrigger(),
            delay_time: self.delay_time()?,
            delay_feedback: self.delay_feedback(),
        })
    }
}

fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.clone())
            .map_err(|e| ConfigError::Duration {
                field,
                reason: e.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}
