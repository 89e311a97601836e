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
//! Offline rendering of a whole pattern into a stereo buffer and a WAV file.

use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use tracing::{info, span, warn, Instrument, Level};

use crate::audio::{Mixer, MixerOptions};
use crate::chain::ChannelSignalChain;
use crate::pattern::{track, ClipId, ClipLibrary, Track};
use crate::samples::{SampleBuffer, SampleStore};
use crate::util::write_replacing;

mod error;
pub mod wav;

pub use error::RenderError;

/// Sample rate of exported audio.
pub const EXPORT_SAMPLE_RATE: u32 = 44100;

/// A finished stereo render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    left: Vec<f32>,
    right: Vec<f32>,
    sample_rate: u32,
}

impl RenderedAudio {
    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Largest absolute sample value on either channel.
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(self.right.iter())
            .fold(0.0f32, |peak, sample| peak.max(sample.abs()))
    }

    /// Left/right interleaved samples.
    pub fn interleaved(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(self.right.iter())
            .flat_map(|(left, right)| [*left, *right])
            .collect()
    }

    /// Encodes the render as a 16-bit stereo WAV file.
    pub fn to_wav(&self) -> Result<Vec<u8>, RenderError> {
        Ok(wav::encode_pcm16(&self.interleaved(), 2, self.sample_rate)?)
    }

    /// Writes the render to `path` as a WAV file. The file is encoded in memory and
    /// written beside the destination first, so a failure never leaves a partial file
    /// at `path`.
    pub fn write_wav(&self, path: &Path) -> Result<(), RenderError> {
        let bytes = self.to_wav()?;
        write_replacing(path, &bytes).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            path = ?path,
            bytes = bytes.len(),
            "Exported audio"
        );
        Ok(())
    }
}

/// Renders a track once, start to finish, on its own mixer.
///
/// Every cell triggers at `step * seconds_per_step` on the offline timeline through
/// the same signal chain used live. Clips that cannot be resolved (missing from the
/// library or undecodable) are left out; they never fail the render.
pub struct OfflineRenderer {
    sample_rate: u32,
    options: MixerOptions,
}

impl OfflineRenderer {
    pub fn new(options: MixerOptions) -> OfflineRenderer {
        OfflineRenderer::with_sample_rate(EXPORT_SAMPLE_RATE, options)
    }

    pub fn with_sample_rate(sample_rate: u32, options: MixerOptions) -> OfflineRenderer {
        OfflineRenderer {
            sample_rate,
            options,
        }
    }

    pub async fn render(
        &self,
        track: &Track,
        clips: &ClipLibrary,
        store: &SampleStore,
    ) -> Result<RenderedAudio, RenderError> {
        self.mix(track, clips, store)
            .instrument(span!(Level::INFO, "offline render"))
            .await
    }

    async fn mix(
        &self,
        track: &Track,
        clips: &ClipLibrary,
        store: &SampleStore,
    ) -> Result<RenderedAudio, RenderError> {
        if !track::valid_step_count(track.step_count()) {
            return Err(RenderError::InvalidTrack(format!(
                "step count {} is not a multiple of 4 between 4 and 64",
                track.step_count()
            )));
        }
        if !(track::MIN_BPM..=track::MAX_BPM).contains(&track.bpm()) {
            return Err(RenderError::InvalidTrack(format!(
                "bpm {} is outside {}-{}",
                track.bpm(),
                track::MIN_BPM,
                track::MAX_BPM
            )));
        }
        if self.sample_rate == 0 {
            return Err(RenderError::InvalidTrack("sample rate must be positive".to_string()));
        }

        let buffers = resolve(track, clips, store).await;

        let rate = self.sample_rate as f64;
        let seconds_per_step = track.seconds_per_step();
        let total_frames = (track.step_count() as f64 * seconds_per_step * rate).round() as usize;
        let mixer = Mixer::new(self.sample_rate, self.options.clone());

        let mut triggers = 0;
        let mut skipped = 0;
        for step in 0..track.step_count() {
            let start_frame = (step as f64 * seconds_per_step * rate).round() as u64;
            for (channel, ids) in track.grid().at_step(step) {
                let chain = ChannelSignalChain::new(&track.settings(channel));
                for id in ids {
                    match buffers.get(id) {
                        Some(buffer) => {
                            chain.trigger(&mixer, channel, buffer.clone(), start_frame);
                            triggers += 1;
                        }
                        None => skipped += 1,
                    }
                }
            }
        }

        let (left, right) = tokio::task::spawn_blocking(move || mixer.render(total_frames))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?;

        let rendered = RenderedAudio {
            left,
            right,
            sample_rate: self.sample_rate,
        };
        info!(
            title = track.title(),
            frames = rendered.frames(),
            triggers,
            skipped,
            peak = rendered.peak(),
            "Track rendered"
        );
        Ok(rendered)
    }

    /// Renders the track and writes it to `path` as a WAV file.
    pub async fn export(
        &self,
        track: &Track,
        clips: &ClipLibrary,
        store: &SampleStore,
        path: &Path,
    ) -> Result<RenderedAudio, RenderError> {
        let rendered = self.render(track, clips, store).await?;
        rendered.write_wav(path)?;
        Ok(rendered)
    }
}

/// Decodes every clip the grid refers to. Anything that cannot be resolved is
/// logged and left out.
async fn resolve(
    track: &Track,
    clips: &ClipLibrary,
    store: &SampleStore,
) -> HashMap<ClipId, Arc<SampleBuffer>> {
    let mut buffers = HashMap::new();
    for id in track.grid().clip_ids() {
        let Some(clip) = clips.get(&id) else {
            warn!(clip = %id, "Clip referenced by the grid is missing, skipping");
            continue;
        };
        match store.get(&clip).await {
            Ok(buffer) => {
                buffers.insert(id, buffer);
            }
            Err(e) => warn!(clip = %id, err = %e, "Clip could not be decoded, skipping"),
        }
    }
    buffers
}
