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
use serde::{Deserialize, Serialize};

use super::error::SettingsError;

/// Per-channel sound shaping parameters. Every trigger snapshots these at the
/// moment it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    volume: f32,
    pitch: f32,
    pan: f32,
    cutoff: f32,
    distortion: f32,
    attack: f32,
    release: f32,
    trim_start: f32,
    trim_end: f32,
    reverse: bool,
    auto_tune: f32,
    delay: f32,
    color: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        ChannelSettings {
            volume: 0.8,
            pitch: 1.0,
            pan: 0.0,
            cutoff: 1.0,
            distortion: 0.0,
            attack: 0.0,
            release: 0.0,
            trim_start: 0.0,
            trim_end: 1.0,
            reverse: false,
            auto_tune: 0.0,
            delay: 0.0,
            color: String::new(),
        }
    }
}

/// A single validated change to a channel's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum SettingsUpdate {
    Volume(f32),
    Pitch(f32),
    Pan(f32),
    Cutoff(f32),
    Distortion(f32),
    Attack(f32),
    Release(f32),
    TrimStart(f32),
    TrimEnd(f32),
    Reverse(bool),
    AutoTune(f32),
    Delay(f32),
    Color(String),
}

fn clamp_finite(field: &'static str, value: f32, min: f32, max: f32) -> Result<f32, SettingsError> {
    if !value.is_finite() {
        return Err(SettingsError::NotFinite { field });
    }
    Ok(value.clamp(min, max))
}

impl ChannelSettings {
    /// Applies an update. Out-of-range values are clamped; non-finite values and
    /// updates that would leave the trim start at or after the trim end are rejected
    /// without modifying the settings.
    pub fn apply(&mut self, update: SettingsUpdate) -> Result<(), SettingsError> {
        match update {
            SettingsUpdate::Volume(value) => self.volume = clamp_finite("volume", value, 0.0, 1.0)?,
            SettingsUpdate::Pitch(value) => self.pitch = clamp_finite("pitch", value, 0.5, 4.0)?,
            SettingsUpdate::Pan(value) => self.pan = clamp_finite("pan", value, -1.0, 1.0)?,
            SettingsUpdate::Cutoff(value) => self.cutoff = clamp_finite("cutoff", value, 0.0, 1.0)?,
            SettingsUpdate::Distortion(value) => {
                self.distortion = clamp_finite("distortion", value, 0.0, 1.0)?
            }
            SettingsUpdate::Attack(value) => self.attack = clamp_finite("attack", value, 0.0, 2.0)?,
            SettingsUpdate::Release(value) => {
                self.release = clamp_finite("release", value, 0.0, 2.0)?
            }
            SettingsUpdate::TrimStart(value) => {
                let start = clamp_finite("trimStart", value, 0.0, 1.0)?;
                if start >= self.trim_end {
                    return Err(SettingsError::TrimOrder {
                        start,
                        end: self.trim_end,
                    });
                }
                self.trim_start = start;
            }
            SettingsUpdate::TrimEnd(value) => {
                let end = clamp_finite("trimEnd", value, 0.0, 1.0)?;
                if self.trim_start >= end {
                    return Err(SettingsError::TrimOrder {
                        start: self.trim_start,
                        end,
                    });
                }
                self.trim_end = end;
            }
            SettingsUpdate::Reverse(value) => self.reverse = value,
            SettingsUpdate::AutoTune(value) => {
                self.auto_tune = clamp_finite("autoTune", value, 0.0, 1.0)?
            }
            SettingsUpdate::Delay(value) => self.delay = clamp_finite("delay", value, 0.0, 1.0)?,
            SettingsUpdate::Color(value) => self.color = value,
        }
        Ok(())
    }

    /// Normalizes settings that arrived from outside (project import), clamping every
    /// range and rejecting non-finite values or an inverted trim window.
    pub fn validated(self) -> Result<ChannelSettings, SettingsError> {
        let settings = ChannelSettings {
            volume: clamp_finite("volume", self.volume, 0.0, 1.0)?,
            pitch: clamp_finite("pitch", self.pitch, 0.5, 4.0)?,
            pan: clamp_finite("pan", self.pan, -1.0, 1.0)?,
            cutoff: clamp_finite("cutoff", self.cutoff, 0.0, 1.0)?,
            distortion: clamp_finite("distortion", self.distortion, 0.0, 1.0)?,
            attack: clamp_finite("attack", self.attack, 0.0, 2.0)?,
            release: clamp_finite("release", self.release, 0.0, 2.0)?,
            trim_start: clamp_finite("trimStart", self.trim_start, 0.0, 1.0)?,
            trim_end: clamp_finite("trimEnd", self.trim_end, 0.0, 1.0)?,
            auto_tune: clamp_finite("autoTune", self.auto_tune, 0.0, 1.0)?,
            delay: clamp_finite("delay", self.delay, 0.0, 1.0)?,
            ..self
        };
        if settings.trim_start >= settings.trim_end {
            return Err(SettingsError::TrimOrder {
                start: settings.trim_start,
                end: settings.trim_end,
            });
        }
        Ok(settings)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn distortion(&self) -> f32 {
        self.distortion
    }

    pub fn attack(&self) -> f32 {
        self.attack
    }

    pub fn release(&self) -> f32 {
        self.release
    }

    pub fn trim_start(&self) -> f32 {
        self.trim_start
    }

    pub fn trim_end(&self) -> f32 {
        self.trim_end
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn auto_tune(&self) -> f32 {
        self.auto_tune
    }

    pub fn delay(&self) -> f32 {
        self.delay
    }

    pub fn color(&self) -> &str {
        &self.color
    }
}
