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
// Core audio mixing logic shared by the live outputs and the offline renderer.
use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::debug;

use super::Timeline;
use crate::chain::{DelayBus, Voice};
use crate::config::RetriggerBehavior;

/// Mixer behavior that is fixed for the life of a mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerOptions {
    pub retrigger: RetriggerBehavior,
    pub delay_time: Duration,
    pub delay_feedback: f32,
}

impl Default for MixerOptions {
    fn default() -> Self {
        MixerOptions {
            retrigger: RetriggerBehavior::Cut,
            delay_time: Duration::from_millis(250),
            delay_feedback: 0.4,
        }
    }
}

/// A voice waiting for, or past, its start frame.
struct ScheduledVoice {
    channel: usize,
    start_frame: u64,
    voice: Voice,
}

struct MixerState {
    /// Frames rendered so far. This is the mixer's clock.
    frame: u64,
    voices: Vec<ScheduledVoice>,
    delay: DelayBus,
    scheduled_total: u64,
}

/// Sums scheduled voices and the shared delay bus into a stereo signal.
///
/// Cloning a mixer yields another handle to the same state, so the audio callback
/// and the triggering side can each hold one.
#[derive(Clone)]
pub struct Mixer {
    state: Arc<Mutex<MixerState>>,
    sample_rate: u32,
    retrigger: RetriggerBehavior,
}

impl Mixer {
    pub fn new(sample_rate: u32, options: MixerOptions) -> Mixer {
        Mixer {
            state: Arc::new(Mutex::new(MixerState {
                frame: 0,
                voices: Vec::new(),
                delay: DelayBus::new(sample_rate, options.delay_time, options.delay_feedback),
                scheduled_total: 0,
            })),
            sample_rate,
            retrigger: options.retrigger,
        }
    }

    /// Voices that are playing or waiting to start.
    pub fn active_voices(&self) -> usize {
        self.state.lock().voices.len()
    }

    /// Number of voices ever scheduled on this mixer.
    pub fn scheduled_total(&self) -> u64 {
        self.state.lock().scheduled_total
    }

    /// Fills an interleaved output buffer with `channels` channels per frame. The
    /// stereo mix goes to the first two channels (mono outputs get the average) and
    /// any further channels are silent.
    pub fn process_into(&self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let mut state = self.state.lock();
        for frame in output.chunks_mut(channels) {
            let [left, right] = state.next_frame();
            match frame {
                [mono] => *mono = (left + right) * 0.5,
                [out_left, out_right, rest @ ..] => {
                    *out_left = left;
                    *out_right = right;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }

    /// Pending and playing voices as (channel, start frame, voice id), in scheduling order.
    #[cfg(test)]
    pub fn scheduled_voices(&self) -> Vec<(usize, u64, u64)> {
        self.state
            .lock()
            .voices
            .iter()
            .map(|v| (v.channel, v.start_frame, v.voice.id()))
            .collect()
    }

    /// Renders the next `frames` frames as separate left and right channels.
    pub fn render(&self, frames: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        let mut state = self.state.lock();
        for _ in 0..frames {
            let [l, r] = state.next_frame();
            left.push(l);
            right.push(r);
        }
        (left, right)
    }
}

impl MixerState {
    fn next_frame(&mut self) -> [f32; 2] {
        let frame = self.frame;
        let mut dry = [0.0f32; 2];
        let mut send = [0.0f32; 2];

        self.voices.retain_mut(|scheduled| {
            if scheduled.start_frame > frame {
                return true;
            }
            match scheduled.voice.next_frame() {
                Some(output) => {
                    dry[0] += output.dry[0];
                    dry[1] += output.dry[1];
                    send[0] += output.send[0];
                    send[1] += output.send[1];
                    true
                }
                None => false,
            }
        });

        let wet = self.delay.process(send);
        self.frame += 1;
        [dry[0] + wet[0], dry[1] + wet[1]]
    }
}

impl Timeline for Mixer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_frame(&self) -> u64 {
        self.state.lock().frame
    }

    fn schedule(&self, channel: usize, start_frame: u64, voice: Voice) {
        let mut state = self.state.lock();
        // A voice scheduled in the past starts on the next rendered frame.
        let start_frame = start_frame.max(state.frame);
        if self.retrigger == RetriggerBehavior::Cut {
            for earlier in state
                .voices
                .iter_mut()
                .filter(|v| v.channel == channel && v.start_frame < start_frame)
            {
                earlier.voice.release_at(start_frame - earlier.start_frame);
            }
        }
        debug!(
            channel,
            start_frame,
            voice = voice.id(),
            "Voice scheduled"
        );
        state.scheduled_total += 1;
        state.voices.push(ScheduledVoice {
            channel,
            start_frame,
            voice,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChannelSignalChain;
    use crate::pattern::{ChannelSettings, SettingsUpdate};
    use crate::testutil::constant_buffer;

    fn options(retrigger: RetriggerBehavior) -> MixerOptions {
        MixerOptions {
            retrigger,
            ..MixerOptions::default()
        }
    }

    fn hard_left_chain() -> ChannelSignalChain {
        let mut settings = ChannelSettings::default();
        settings.apply(SettingsUpdate::Pan(-1.0)).unwrap();
        settings.apply(SettingsUpdate::Volume(1.0)).unwrap();
        ChannelSignalChain::new(&settings)
    }

    #[test]
    fn test_silence_without_voices() {
        let mixer = Mixer::new(44100, MixerOptions::default());
        let (left, right) = mixer.render(64);
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));
        assert_eq!(mixer.current_frame(), 64);
    }

    #[test]
    fn test_voice_starts_at_scheduled_frame() {
        let mixer = Mixer::new(44100, MixerOptions::default());
        let buffer = Arc::new(constant_buffer(0.5, 44100, 100));
        hard_left_chain().trigger(&mixer, 0, buffer, 10);
        assert_eq!(mixer.active_voices(), 1);

        let (left, right) = mixer.render(200);
        assert!(left[..10].iter().all(|s| *s == 0.0));
        assert!(left[10] > 0.0);
        assert!(right.iter().all(|s| s.abs() < 1e-6));
        assert!(left[110..].iter().all(|s| *s == 0.0));
        assert_eq!(mixer.active_voices(), 0);
        assert_eq!(mixer.scheduled_total(), 1);
    }

    #[test]
    fn test_voices_sum() {
        let mixer = Mixer::new(44100, options(RetriggerBehavior::Polyphonic));
        let buffer = Arc::new(constant_buffer(0.25, 44100, 2000));
        let chain = hard_left_chain();
        chain.trigger(&mixer, 0, buffer.clone(), 0);
        chain.trigger(&mixer, 1, buffer, 0);
        let (left, _) = mixer.render(2000);
        assert!((left[1500] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_cut_retrigger_releases_earlier_voice() {
        let mixer = Mixer::new(44100, options(RetriggerBehavior::Cut));
        let long = Arc::new(constant_buffer(0.25, 44100, 10_000));
        let chain = hard_left_chain();
        chain.trigger(&mixer, 0, long.clone(), 0);
        chain.trigger(&mixer, 0, long.clone(), 1000);
        // A different channel is never cut.
        chain.trigger(&mixer, 1, long, 0);

        let (left, _) = mixer.render(5000);
        // Three voices before the retrigger, two afterwards.
        assert!((left[900] - 0.5).abs() < 1e-3);
        assert!((left[3000] - 0.5).abs() < 1e-3);
        assert!(mixer.active_voices() == 2);
    }

    #[test]
    fn test_late_voice_is_cut_relative_to_actual_start() {
        let mixer = Mixer::new(44100, options(RetriggerBehavior::Cut));
        let long = Arc::new(constant_buffer(0.25, 44100, 10_000));
        let chain = hard_left_chain();
        mixer.render(100);

        // Already in the past, so it starts at frame 100.
        chain.trigger(&mixer, 0, long.clone(), 10);
        chain.trigger(&mixer, 0, long, 300);
        let starts: Vec<u64> = mixer.scheduled_voices().iter().map(|v| v.1).collect();
        assert_eq!(starts, vec![100, 300]);

        // Indices are relative to frame 100.
        let (left, _) = mixer.render(1000);
        assert!((left[150] - 0.25).abs() < 1e-3);
        assert!((left[250] - 0.25).abs() < 1e-3);
        assert!((left[500] - 0.25).abs() < 1e-3);
        assert_eq!(mixer.active_voices(), 1);
    }

    #[test]
    fn test_polyphonic_retrigger_overlaps() {
        let mixer = Mixer::new(44100, options(RetriggerBehavior::Polyphonic));
        let long = Arc::new(constant_buffer(0.25, 44100, 10_000));
        let chain = hard_left_chain();
        chain.trigger(&mixer, 0, long.clone(), 0);
        chain.trigger(&mixer, 0, long, 1000);
        let (left, _) = mixer.render(5000);
        assert!((left[3000] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_layered_clips_at_same_frame_do_not_cut() {
        let mixer = Mixer::new(44100, options(RetriggerBehavior::Cut));
        let buffer = Arc::new(constant_buffer(0.25, 44100, 2000));
        let chain = hard_left_chain();
        chain.trigger(&mixer, 0, buffer.clone(), 0);
        chain.trigger(&mixer, 0, buffer, 0);
        let (left, _) = mixer.render(2000);
        assert!((left[1500] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_delay_send_echoes() {
        let mixer = Mixer::new(
            1000,
            MixerOptions {
                retrigger: RetriggerBehavior::Cut,
                delay_time: Duration::from_millis(100),
                delay_feedback: 0.5,
            },
        );
        let mut settings = ChannelSettings::default();
        settings.apply(SettingsUpdate::Delay(1.0)).unwrap();
        let buffer = Arc::new(constant_buffer(0.5, 1000, 10));
        ChannelSignalChain::new(&settings).trigger(&mixer, 0, buffer, 0);

        let (left, _) = mixer.render(400);
        assert!(left[50].abs() < 1e-6);
        assert!(left[105].abs() > 0.0);
        assert!(left[205].abs() < left[105].abs());
        assert!(left[205].abs() > 0.0);
    }

    #[test]
    fn test_process_into_layouts() {
        let mixer = Mixer::new(44100, MixerOptions::default());
        let buffer = Arc::new(constant_buffer(0.5, 44100, 1000));
        hard_left_chain().trigger(&mixer, 0, buffer, 0);

        let mut four = vec![1.0f32; 4 * 8];
        mixer.process_into(&mut four, 4);
        for frame in four.chunks(4) {
            assert!(frame[0] > 0.0);
            assert!(frame[1].abs() < 1e-6);
            assert_eq!(&frame[2..], &[0.0, 0.0]);
        }

        let mut mono = vec![0.0f32; 8];
        mixer.process_into(&mut mono, 1);
        assert!(mono.iter().all(|s| *s > 0.0));
        assert_eq!(mixer.current_frame(), 16);
    }
}
