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
//! The per-trigger signal chain.
//!
//! Each trigger snapshots its channel's settings into a [ChannelSignalChain] and
//! builds a single-use [Voice]:
//!
//! trim -> reverse -> playback rate -> envelope -> lowpass -> distortion -> volume -> pan
//!
//! A scaled copy of the panned output is sent to the mixer's shared [DelayBus].
//! Voices know nothing about where they are played; live and offline mixers
//! both schedule them through the [Timeline] trait.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::audio::Timeline;
use crate::pattern::ChannelSettings;
use crate::samples::SampleBuffer;

mod autotune;
mod delay;
mod envelope;
mod filter;
mod pan;
mod shaper;

pub use autotune::quantize_rate;
pub use delay::{clamp_feedback, DelayBus, MAX_FEEDBACK};
pub use envelope::Envelope;
pub use filter::{cutoff_hz, Lowpass, MAX_CUTOFF_HZ, MIN_CUTOFF_HZ};
pub use pan::{pan_mono, pan_stereo};
pub use shaper::Shaper;

/// Global counter for unique voice IDs.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// Channel settings captured at trigger time. Later edits to the channel never
/// reach voices that were already built from a chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSignalChain {
    volume: f32,
    rate: f32,
    pan: f32,
    cutoff_hz: f32,
    distortion: f32,
    attack: f32,
    release: f32,
    trim_start: f32,
    trim_end: f32,
    reverse: bool,
    delay_send: f32,
}

impl ChannelSignalChain {
    pub fn new(settings: &ChannelSettings) -> ChannelSignalChain {
        ChannelSignalChain {
            volume: settings.volume(),
            rate: quantize_rate(settings.pitch(), settings.auto_tune()),
            pan: settings.pan(),
            cutoff_hz: cutoff_hz(settings.cutoff()),
            distortion: settings.distortion(),
            attack: settings.attack(),
            release: settings.release(),
            trim_start: settings.trim_start(),
            trim_end: settings.trim_end(),
            reverse: settings.reverse(),
            delay_send: settings.delay(),
        }
    }

    /// Playback rate after pitch quantization.
    pub fn playback_rate(&self) -> f32 {
        self.rate
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    /// Builds a voice that plays `buffer` through this chain at `output_rate`.
    pub fn build_voice(&self, buffer: Arc<SampleBuffer>, output_rate: u32) -> Voice {
        let frames = buffer.frames();
        let (segment_start, segment_len) = if frames == 0 {
            (0, 0)
        } else {
            let start = ((self.trim_start as f64 * frames as f64).floor() as usize).min(frames - 1);
            let end = ((self.trim_end as f64 * frames as f64).ceil() as usize)
                .min(frames)
                .max(start + 1);
            (start, end - start)
        };

        let step = self.rate as f64 * buffer.sample_rate() as f64 / output_rate as f64;
        let length = segment_len as f64 / step;

        Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed),
            buffer,
            segment_start,
            segment_len,
            reverse: self.reverse,
            step,
            position: 0.0,
            length,
            envelope: Envelope::new(self.attack, self.release, length, output_rate),
            cut_at: None,
            filter: Lowpass::new(self.cutoff_hz, output_rate),
            shaper: Shaper::new(self.distortion),
            volume: self.volume,
            pan: self.pan,
            delay_send: self.delay_send,
        }
    }

    /// Builds a voice for the timeline's sample rate and schedules it to start at
    /// `start_frame`. Returns the voice id.
    pub fn trigger(
        &self,
        timeline: &dyn Timeline,
        channel: usize,
        buffer: Arc<SampleBuffer>,
        start_frame: u64,
    ) -> u64 {
        let voice = self.build_voice(buffer, timeline.sample_rate());
        let id = voice.id();
        timeline.schedule(channel, start_frame, voice);
        id
    }
}

/// One rendered output frame of a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceFrame {
    /// The panned signal.
    pub dry: [f32; 2],
    /// The portion routed to the delay bus.
    pub send: [f32; 2],
}

/// A single playback of a clip through a channel signal chain.
pub struct Voice {
    id: u64,
    buffer: Arc<SampleBuffer>,
    segment_start: usize,
    segment_len: usize,
    reverse: bool,
    /// Source frames advanced per output frame.
    step: f64,
    /// Output frames rendered so far.
    position: f64,
    /// Total output frames.
    length: f64,
    envelope: Envelope,
    cut_at: Option<f64>,
    filter: Lowpass,
    shaper: Shaper,
    volume: f32,
    pan: f32,
    delay_send: f32,
}

impl Voice {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Length of the voice in output frames, ignoring any retrigger cut.
    pub fn length_frames(&self) -> u64 {
        self.length.ceil() as u64
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.length || self.envelope.is_silenced(self.position, self.cut_at)
    }

    /// Starts the release `offset` frames after the voice's start. An earlier cut wins.
    pub fn release_at(&mut self, offset: u64) {
        let offset = offset as f64;
        self.cut_at = Some(self.cut_at.map_or(offset, |existing| existing.min(offset)));
    }

    /// Renders the next output frame, or None once the voice has finished.
    pub fn next_frame(&mut self) -> Option<VoiceFrame> {
        if self.is_finished() {
            return None;
        }

        let level = self.envelope.level(self.position, self.cut_at);
        let source = self.position * self.step;
        let dry = if self.buffer.channel_count() == 1 {
            let sample = self.shape(0, self.read(0, source) * level);
            pan_mono(self.pan, sample)
        } else {
            let left = self.shape(0, self.read(0, source) * level);
            let right = self.shape(1, self.read(1, source) * level);
            pan_stereo(self.pan, left, right)
        };
        self.position += 1.0;

        Some(VoiceFrame {
            dry,
            send: [dry[0] * self.delay_send, dry[1] * self.delay_send],
        })
    }

    /// Lowpass, distortion and gain for one channel.
    #[inline]
    fn shape(&mut self, channel: usize, sample: f32) -> f32 {
        self.shaper.process(self.filter.process(channel, sample)) * self.volume
    }

    /// Reads the trimmed (and possibly reversed) segment at a fractional position
    /// with linear interpolation.
    fn read(&self, channel: usize, source: f64) -> f32 {
        let index = source.floor() as usize;
        if index >= self.segment_len {
            return 0.0;
        }
        let fraction = (source - index as f64) as f32;
        let current = self.sample_at(channel, index);
        let next = self.sample_at(channel, (index + 1).min(self.segment_len - 1));
        current + (next - current) * fraction
    }

    #[inline]
    fn sample_at(&self, channel: usize, index: usize) -> f32 {
        let index = if self.reverse {
            self.segment_len - 1 - index
        } else {
            index
        };
        self.buffer.channel(channel)[self.segment_start + index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::SettingsUpdate;
    use crate::testutil::{constant_buffer, ramp_buffer};

    fn chain(updates: Vec<SettingsUpdate>) -> ChannelSignalChain {
        let mut settings = ChannelSettings::default();
        for update in updates {
            settings.apply(update).expect("valid update");
        }
        ChannelSignalChain::new(&settings)
    }

    fn render(voice: &mut Voice) -> Vec<VoiceFrame> {
        std::iter::from_fn(|| voice.next_frame()).collect()
    }

    #[test]
    fn test_default_chain_plays_whole_buffer() {
        let buffer = Arc::new(constant_buffer(0.5, 44100, 4410));
        let mut voice = chain(vec![]).build_voice(buffer, 44100);
        assert_eq!(voice.length_frames(), 4410);

        let frames = render(&mut voice);
        assert_eq!(frames.len(), 4410);
        assert!(voice.is_finished());
        assert!(voice.next_frame().is_none());

        // The lowpass settles to unity gain for a constant signal.
        let expected = 0.5 * 0.8 * std::f32::consts::FRAC_1_SQRT_2;
        let settled = frames[4000];
        assert!((settled.dry[0] - expected).abs() < 1e-3);
        assert!((settled.dry[1] - expected).abs() < 1e-3);
        assert_eq!(settled.send, [0.0, 0.0]);
        // Sound begins on the very first frame.
        assert!(frames[0].dry[0] > 0.0);
    }

    #[test]
    fn test_trim_selects_segment() {
        let buffer = Arc::new(ramp_buffer(44100, 100));
        let voice = chain(vec![SettingsUpdate::TrimEnd(0.75), SettingsUpdate::TrimStart(0.25)])
            .build_voice(buffer, 44100);
        assert_eq!(voice.length_frames(), 50);
        assert_eq!(voice.read(0, 0.0), 25.0);
        assert_eq!(voice.read(0, 49.0), 74.0);
        assert_eq!(voice.read(0, 50.0), 0.0);
    }

    #[test]
    fn test_reverse_reads_backwards() {
        let buffer = Arc::new(ramp_buffer(44100, 100));
        let voice = chain(vec![SettingsUpdate::Reverse(true), SettingsUpdate::TrimEnd(0.5)])
            .build_voice(buffer, 44100);
        assert_eq!(voice.read(0, 0.0), 49.0);
        assert_eq!(voice.read(0, 49.0), 0.0);
        assert_eq!(voice.read(0, 0.5), 48.5);
    }

    #[test]
    fn test_pitch_changes_duration() {
        let buffer = Arc::new(constant_buffer(0.5, 44100, 1000));
        let up = chain(vec![SettingsUpdate::Pitch(2.0)]).build_voice(buffer.clone(), 44100);
        let down = chain(vec![SettingsUpdate::Pitch(0.5)]).build_voice(buffer.clone(), 44100);
        assert_eq!(up.length_frames(), 500);
        assert_eq!(down.length_frames(), 2000);

        let slow = chain(vec![SettingsUpdate::Pitch(0.5)]).build_voice(buffer, 44100);
        assert_eq!(slow.read(0, 0.0), 0.5);
    }

    #[test]
    fn test_sample_rate_conversion() {
        let buffer = Arc::new(ramp_buffer(22050, 100));
        let voice = chain(vec![]).build_voice(buffer, 44100);
        assert_eq!(voice.length_frames(), 200);
        // Every other output frame lands between two source frames.
        assert_eq!(voice.read(0, 1.0 * voice.step), 0.5);
    }

    #[test]
    fn test_hard_pan_and_delay_send() {
        let buffer = Arc::new(constant_buffer(0.5, 44100, 2000));
        let mut voice = chain(vec![SettingsUpdate::Pan(-1.0), SettingsUpdate::Delay(0.5)])
            .build_voice(buffer, 44100);
        let frames = render(&mut voice);
        for frame in &frames {
            assert!(frame.dry[1].abs() < 1e-6);
            assert!((frame.send[0] - frame.dry[0] * 0.5).abs() < 1e-6);
        }
        assert!((frames[1500].dry[0] - 0.4).abs() < 1e-3);
    }

    #[test]
    fn test_settings_are_snapshotted() {
        let mut settings = ChannelSettings::default();
        let snapshot = ChannelSignalChain::new(&settings);
        settings.apply(SettingsUpdate::Volume(0.0)).unwrap();

        let buffer = Arc::new(constant_buffer(0.5, 44100, 2000));
        let mut voice = snapshot.build_voice(buffer, 44100);
        let frames = render(&mut voice);
        assert!(frames[1500].dry[0] > 0.2);
        assert_ne!(ChannelSignalChain::new(&settings), snapshot);
    }

    #[test]
    fn test_auto_tune_applies_to_rate() {
        let tuned = chain(vec![SettingsUpdate::Pitch(1.5), SettingsUpdate::AutoTune(1.0)]);
        assert!((tuned.playback_rate() - 2f32.powf(7.0 / 12.0)).abs() < 1e-5);
        let untouched = chain(vec![SettingsUpdate::Pitch(1.5)]);
        assert_eq!(untouched.playback_rate(), 1.5);
    }

    #[test]
    fn test_cutoff_snapshot() {
        assert_eq!(chain(vec![SettingsUpdate::Cutoff(0.0)]).cutoff_hz(), 200.0);
        assert_eq!(chain(vec![]).cutoff_hz(), 20000.0);
    }

    #[test]
    fn test_release_at_cuts_voice() {
        let buffer = Arc::new(constant_buffer(0.5, 44100, 44100));
        let mut voice = chain(vec![]).build_voice(buffer, 44100);
        voice.release_at(100);
        voice.release_at(5000);
        let frames = render(&mut voice);
        assert_eq!(frames.len(), 100);
    }

    #[test]
    fn test_release_ramp_on_cut() {
        let buffer = Arc::new(constant_buffer(0.5, 44100, 44100));
        // 0.01s release is 441 frames.
        let mut voice = chain(vec![SettingsUpdate::Release(0.01)]).build_voice(buffer, 44100);
        voice.release_at(1000);
        let frames = render(&mut voice);
        assert!((1440..=1442).contains(&frames.len()));
        assert!(frames[1200].dry[0] < frames[999].dry[0]);
    }

    #[test]
    fn test_stereo_source() {
        let buffer = Arc::new(
            SampleBuffer::new(44100, vec![vec![0.5; 2000], vec![-0.5; 2000]]).unwrap(),
        );
        let mut voice = chain(vec![SettingsUpdate::Volume(1.0)]).build_voice(buffer, 44100);
        let frames = render(&mut voice);
        assert!((frames[1500].dry[0] - 0.5).abs() < 1e-3);
        assert!((frames[1500].dry[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_unique_voice_ids() {
        let buffer = Arc::new(constant_buffer(0.5, 44100, 10));
        let a = chain(vec![]).build_voice(buffer.clone(), 44100);
        let b = chain(vec![]).build_voice(buffer, 44100);
        assert_ne!(a.id(), b.id());
    }
}
