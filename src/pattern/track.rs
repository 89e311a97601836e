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
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    clip::ClipId,
    error::TrackError,
    grid::PatternGrid,
    settings::{ChannelSettings, SettingsUpdate},
};
use crate::util::now_millis;

pub const MIN_BPM: f32 = 60.0;
pub const MAX_BPM: f32 = 240.0;
pub const DEFAULT_BPM: f32 = 120.0;
pub const DEFAULT_CHANNELS: usize = 4;
pub const DEFAULT_STEPS: usize = 16;
pub const MIN_STEPS: usize = 4;
pub const MAX_STEPS: usize = 64;

/// Seconds between steps. Steps are always sixteenth notes, regardless of step count.
pub fn seconds_per_step(bpm: f32) -> f64 {
    60.0 / bpm as f64 / 4.0
}

/// Returns true if the step count is a multiple of 4 in the supported range.
pub fn valid_step_count(step_count: usize) -> bool {
    (MIN_STEPS..=MAX_STEPS).contains(&step_count) && step_count % 4 == 0
}

/// What a step toggle did.
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// The channel's primary clip now sounds at the step.
    Added(ClipId),
    /// The channel's primary clip was removed from the step.
    Removed(ClipId),
    /// The channel has no primary clip, so nothing changed.
    NoPrimaryClip,
}

/// A beat: tempo, grid dimensions, the pattern and each channel's sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(default)]
    title: String,
    bpm: f32,
    step_count: usize,
    channel_count: usize,
    #[serde(default)]
    grid: PatternGrid,
    #[serde(default)]
    channel_settings: BTreeMap<usize, ChannelSettings>,
    #[serde(default)]
    channel_clips: BTreeMap<usize, ClipId>,
    #[serde(default)]
    owner_id: String,
    #[serde(default)]
    created_at: u64,
}

impl Default for Track {
    fn default() -> Self {
        Track::new("Untitled", "")
    }
}

impl Track {
    /// Creates an empty track with 4 channels and 16 steps at 120 bpm.
    pub fn new(title: impl Into<String>, owner_id: impl Into<String>) -> Track {
        Track {
            title: title.into(),
            bpm: DEFAULT_BPM,
            step_count: DEFAULT_STEPS,
            channel_count: DEFAULT_CHANNELS,
            grid: PatternGrid::new(),
            channel_settings: BTreeMap::new(),
            channel_clips: BTreeMap::new(),
            owner_id: owner_id.into(),
            created_at: now_millis(),
        }
    }

    /// Normalizes a track that came from outside: bpm is clamped, the step count must
    /// be valid, settings are validated and anything outside the grid bounds is dropped.
    pub fn validated(mut self) -> Result<Track, TrackError> {
        self.set_bpm(self.bpm)?;
        if !valid_step_count(self.step_count) {
            return Err(TrackError::StepCount(self.step_count));
        }
        let channel_count = self.channel_count;
        self.grid.retain_within(channel_count, self.step_count);
        self.channel_clips
            .retain(|channel, _| *channel < channel_count);
        self.channel_settings = std::mem::take(&mut self.channel_settings)
            .into_iter()
            .filter(|(channel, _)| *channel < channel_count)
            .map(|(channel, settings)| {
                settings
                    .validated()
                    .map(|settings| (channel, settings))
                    .map_err(|source| TrackError::Settings { channel, source })
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Sets the tempo, clamped to the supported range. Returns the applied tempo.
    pub fn set_bpm(&mut self, bpm: f32) -> Result<f32, TrackError> {
        if !bpm.is_finite() {
            return Err(TrackError::Bpm);
        }
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        Ok(self.bpm)
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Changes the number of steps. Cells past the new end are dropped.
    pub fn set_step_count(&mut self, step_count: usize) -> Result<(), TrackError> {
        if !valid_step_count(step_count) {
            return Err(TrackError::StepCount(step_count));
        }
        self.step_count = step_count;
        self.grid.retain_within(self.channel_count, step_count);
        Ok(())
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Adds a channel with default settings and no clip. Returns its index.
    pub fn add_channel(&mut self) -> usize {
        self.channel_count += 1;
        self.channel_count - 1
    }

    pub fn grid(&self) -> &PatternGrid {
        &self.grid
    }

    /// Replaces the whole pattern. Cells outside the track bounds are dropped.
    pub fn replace_grid(&mut self, mut grid: PatternGrid) {
        grid.retain_within(self.channel_count, self.step_count);
        self.grid = grid;
    }

    /// Returns a snapshot of the channel's settings.
    pub fn settings(&self, channel: usize) -> ChannelSettings {
        self.channel_settings
            .get(&channel)
            .cloned()
            .unwrap_or_default()
    }

    pub fn update_settings(
        &mut self,
        channel: usize,
        update: SettingsUpdate,
    ) -> Result<(), TrackError> {
        self.check_channel(channel)?;
        self.channel_settings
            .entry(channel)
            .or_default()
            .apply(update)
            .map_err(|source| TrackError::Settings { channel, source })
    }

    pub fn primary_clip(&self, channel: usize) -> Option<&ClipId> {
        self.channel_clips.get(&channel)
    }

    /// Assigns the clip that step toggles and randomization place on the channel.
    pub fn assign_clip(&mut self, channel: usize, clip: ClipId) -> Result<(), TrackError> {
        self.check_channel(channel)?;
        self.channel_clips.insert(channel, clip);
        Ok(())
    }

    /// Toggles the channel's primary clip at a step.
    pub fn toggle_step(&mut self, channel: usize, step: usize) -> Result<ToggleOutcome, TrackError> {
        self.check_channel(channel)?;
        if step >= self.step_count {
            return Err(TrackError::NoSuchStep {
                step,
                count: self.step_count,
            });
        }
        let Some(clip) = self.channel_clips.get(&channel).cloned() else {
            warn!(channel, step, "Channel has no clip assigned, ignoring toggle");
            return Ok(ToggleOutcome::NoPrimaryClip);
        };
        if self.grid.toggle_cell(channel, step, &clip) {
            debug!(channel, step, clip = %clip, "Step enabled");
            Ok(ToggleOutcome::Added(clip))
        } else {
            debug!(channel, step, clip = %clip, "Step disabled");
            Ok(ToggleOutcome::Removed(clip))
        }
    }

    /// Re-rolls the pattern of each given channel using its primary clip. Channels
    /// without a primary clip, or outside the track, are left alone. Returns the
    /// number of activated steps.
    pub fn randomize_pattern<R: Rng>(
        &mut self,
        channels: &[usize],
        probability: f64,
        rng: &mut R,
    ) -> usize {
        let mut activated = 0;
        for &channel in channels {
            if channel >= self.channel_count {
                warn!(channel, "Channel out of range, not randomizing");
                continue;
            }
            let Some(clip) = self.channel_clips.get(&channel).cloned() else {
                warn!(channel, "Channel has no clip assigned, not randomizing");
                continue;
            };
            activated +=
                self.grid
                    .randomize_channel(channel, self.step_count, &clip, probability, rng);
        }
        activated
    }

    pub fn clear_pattern(&mut self) {
        self.grid.clear();
    }

    pub fn seconds_per_step(&self) -> f64 {
        seconds_per_step(self.bpm)
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_secs_f64(self.seconds_per_step())
    }

    /// Length of one pass through the pattern.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.step_count as f64 * self.seconds_per_step())
    }

    /// Every clip the track refers to, from the grid or as a primary clip.
    pub fn referenced_clips(&self) -> BTreeSet<ClipId> {
        let mut clips = self.grid.clip_ids();
        clips.extend(self.channel_clips.values().cloned());
        clips
    }

    fn check_channel(&self, channel: usize) -> Result<(), TrackError> {
        if channel >= self.channel_count {
            return Err(TrackError::NoSuchChannel {
                channel,
                count: self.channel_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
impl Track {
    /// Builds a track directly from a grid, for tests.
    pub fn with_grid(bpm: f32, step_count: usize, channel_count: usize, grid: PatternGrid) -> Track {
        Track {
            bpm,
            step_count,
            channel_count,
            grid,
            ..Track::new("test", "tester")
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::pattern::grid::RANDOMIZE_PROBABILITY;

    #[test]
    fn test_new_track_defaults() {
        let track = Track::new("Beat", "user");
        assert_eq!(track.channel_count(), 4);
        assert_eq!(track.step_count(), 16);
        assert_eq!(track.bpm(), 120.0);
        assert!(track.grid().is_empty());
    }

    #[test]
    fn test_step_interval_and_duration() {
        let mut track = Track::new("Beat", "user");
        for bpm in [60.0f32, 90.0, 120.0, 174.0, 240.0] {
            track.set_bpm(bpm).unwrap();
            for steps in (4..=64).step_by(4) {
                track.set_step_count(steps).unwrap();
                let interval = 60.0 / bpm as f64 / 4.0;
                assert!((track.seconds_per_step() - interval).abs() < 1e-12);
                let expected = steps as f64 * interval;
                assert!((track.duration().as_secs_f64() - expected).abs() < 1e-6);
            }
        }
        track.set_bpm(120.0).unwrap();
        track.set_step_count(16).unwrap();
        assert_eq!(track.step_interval(), Duration::from_millis(125));
        assert_eq!(track.duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_bpm_clamped() {
        let mut track = Track::default();
        assert_eq!(track.set_bpm(20.0), Ok(60.0));
        assert_eq!(track.set_bpm(500.0), Ok(240.0));
        assert_eq!(track.set_bpm(f32::NAN), Err(TrackError::Bpm));
        assert_eq!(track.bpm(), 240.0);
    }

    #[test]
    fn test_step_count_validation() {
        let mut track = Track::default();
        assert!(track.set_step_count(6).is_err());
        assert!(track.set_step_count(0).is_err());
        assert!(track.set_step_count(68).is_err());
        track.set_step_count(4).unwrap();
        assert_eq!(track.step_count(), 4);
    }

    #[test]
    fn test_shrinking_drops_cells() {
        let mut track = Track::default();
        track.assign_clip(0, ClipId::new("kick")).unwrap();
        track.toggle_step(0, 2).unwrap();
        track.toggle_step(0, 12).unwrap();
        track.set_step_count(8).unwrap();
        assert_eq!(track.grid().len(), 1);
    }

    #[test]
    fn test_toggle_without_primary_clip_mutates_nothing() {
        let mut track = Track::default();
        let before = track.clone();
        assert_eq!(track.toggle_step(1, 0), Ok(ToggleOutcome::NoPrimaryClip));
        assert_eq!(track, before);
    }

    #[test]
    fn test_toggle_with_primary_clip() {
        let mut track = Track::default();
        let kick = ClipId::new("kick");
        track.assign_clip(0, kick.clone()).unwrap();
        assert_eq!(track.toggle_step(0, 4), Ok(ToggleOutcome::Added(kick.clone())));
        assert_eq!(track.grid().cell(0, 4), &[kick.clone()]);
        assert_eq!(track.toggle_step(0, 4), Ok(ToggleOutcome::Removed(kick)));
        assert!(track.grid().is_empty());
    }

    #[test]
    fn test_toggle_out_of_range() {
        let mut track = Track::default();
        assert!(matches!(
            track.toggle_step(4, 0),
            Err(TrackError::NoSuchChannel { channel: 4, count: 4 })
        ));
        assert!(matches!(
            track.toggle_step(0, 16),
            Err(TrackError::NoSuchStep { step: 16, count: 16 })
        ));
    }

    #[test]
    fn test_update_settings_rejects_trim_inversion() {
        let mut track = Track::default();
        track
            .update_settings(2, SettingsUpdate::TrimEnd(0.3))
            .unwrap();
        let result = track.update_settings(2, SettingsUpdate::TrimStart(0.4));
        assert!(matches!(result, Err(TrackError::Settings { channel: 2, .. })));
        assert_eq!(track.settings(2).trim_start(), 0.0);
        assert_eq!(track.settings(2).trim_end(), 0.3);
    }

    #[test]
    fn test_randomize_pattern() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut track = Track::default();
        track.set_step_count(64).unwrap();
        track.assign_clip(0, ClipId::new("kick")).unwrap();
        track.assign_clip(1, ClipId::new("hat")).unwrap();
        // Channel 2 has no primary clip and must be left alone.
        track.replace_grid({
            let mut grid = PatternGrid::new();
            grid.set_cell(2, 0, vec![ClipId::new("keep")]);
            grid
        });

        let activated = track.randomize_pattern(&[0, 1, 2, 9], RANDOMIZE_PROBABILITY, &mut rng);
        assert_eq!(track.grid().len(), activated + 1);
        assert_eq!(track.grid().cell(2, 0), &[ClipId::new("keep")]);
        assert!(track
            .grid()
            .iter()
            .filter(|(key, _)| key.channel == 1)
            .all(|(_, clips)| clips == [ClipId::new("hat")]));
    }

    #[test]
    fn test_json_field_names() {
        let mut track = Track::new("Beat", "user");
        track.assign_clip(0, ClipId::new("kick")).unwrap();
        track.toggle_step(0, 0).unwrap();
        track.update_settings(0, SettingsUpdate::Pan(-0.5)).unwrap();
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["stepCount"], 16);
        assert_eq!(json["channelCount"], 4);
        assert_eq!(json["grid"]["0-0"], serde_json::json!(["kick"]));
        assert_eq!(json["channelClips"]["0"], "kick");
        assert_eq!(json["channelSettings"]["0"]["pan"], -0.5);

        let parsed: Track = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, track);
    }

    #[test]
    fn test_validated_drops_out_of_bounds() {
        let json = serde_json::json!({
            "title": "Imported",
            "bpm": 300,
            "stepCount": 8,
            "channelCount": 2,
            "grid": {"0-0": ["kick"], "0-9": ["kick"], "5-0": ["hat"]},
            "channelClips": {"0": "kick", "7": "hat"}
        });
        let track: Track = serde_json::from_value(json).unwrap();
        let track = track.validated().unwrap();
        assert_eq!(track.bpm(), 240.0);
        assert_eq!(track.grid().len(), 1);
        assert!(track.primary_clip(7).is_none());

        let json = serde_json::json!({"bpm": 120, "stepCount": 10, "channelCount": 2});
        let track: Track = serde_json::from_value(json).unwrap();
        assert_eq!(track.validated(), Err(TrackError::StepCount(10)));
    }
}
