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
//! Helpers shared by unit tests: fixture clips, signal measurements and polling.

use std::{
    f32::consts::PI,
    io::Cursor,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::pattern::{Clip, ClipId};
use crate::samples::{DecodeError, Decoder, SampleBuffer, SymphoniaDecoder};

/// Encodes planar channels as a 32-bit float WAV payload.
pub fn wav_payload(sample_rate: u32, channels: &[Vec<f32>]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: channels.len() as u16,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        )
        .expect("wav writer");
        for frame in 0..channels[0].len() {
            for channel in channels {
                writer.write_sample(channel[frame]).expect("write sample");
            }
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

/// A mono sine clip.
pub fn tone_clip(id: &str, frequency: f32, sample_rate: u32, seconds: f32) -> Clip {
    let frames = (sample_rate as f32 * seconds) as usize;
    let samples = (0..frames)
        .map(|i| 0.5 * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect();
    Clip::with_id(
        ClipId::new(id),
        id,
        "tester",
        wav_payload(sample_rate, &[samples]),
    )
}

/// A mono clip holding a constant value, which makes gains easy to check.
pub fn constant_clip(id: &str, value: f32, sample_rate: u32, frames: usize) -> Clip {
    Clip::with_id(
        ClipId::new(id),
        id,
        "tester",
        wav_payload(sample_rate, &[vec![value; frames]]),
    )
}

/// A clip whose payload is not audio.
pub fn garbage_clip(id: &str) -> Clip {
    Clip::with_id(ClipId::new(id), id, "tester", b"garbage payload".repeat(32))
}

/// A constant mono buffer.
pub fn constant_buffer(value: f32, sample_rate: u32, frames: usize) -> SampleBuffer {
    SampleBuffer::new(sample_rate, vec![vec![value; frames]]).expect("buffer")
}

/// A mono buffer counting up from 0 by 1 per frame.
pub fn ramp_buffer(sample_rate: u32, frames: usize) -> SampleBuffer {
    SampleBuffer::new(sample_rate, vec![(0..frames).map(|i| i as f32).collect()]).expect("buffer")
}

/// Decodes with symphonia while counting calls, optionally slowing each decode down.
#[derive(Default)]
pub struct CountingDecoder {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingDecoder {
    pub fn with_delay(delay: Duration) -> CountingDecoder {
        CountingDecoder {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for CountingDecoder {
    fn decode(&self, clip: &Clip) -> Result<SampleBuffer, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        SymphoniaDecoder.decode(clip)
    }
}

/// Calculate RMS (Root Mean Square) of a signal
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
}

/// Wait for the given async predicate to return true or fail.
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed().expect("system time error");
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate().await {
            return;
        }
        tokio::time::sleep(tick).await;
    }
}
