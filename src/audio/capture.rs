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
//! Recording new clips from the default input device.

use std::{thread, time::Duration};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::CaptureError;
use crate::pattern::Clip;
use crate::render::wav::encode_pcm16;

/// Records `duration` of audio from the default input device into a new clip
/// holding a 16-bit WAV payload. Blocks for the length of the recording.
pub fn record(
    duration: Duration,
    name: &str,
    owner_id: &str,
) -> Result<Clip, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::NoInputDevice)?;
    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::Config(e.to_string()))?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(CaptureError::UnsupportedFormat(format!(
            "{:?}",
            supported.sample_format()
        )));
    }
    let channels = supported.channels();
    let sample_rate = supported.sample_rate();
    let config: cpal::StreamConfig = supported.into();

    let (data_tx, data_rx) = crossbeam_channel::unbounded::<Vec<f32>>();
    let (err_tx, err_rx) = crossbeam_channel::bounded::<String>(1);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = data_tx.send(data.to_vec());
            },
            move |err| {
                error!("CPAL input stream error: {}", err);
                let _ = err_tx.try_send(err.to_string());
            },
            None,
        )
        .map_err(|e| CaptureError::Stream(e.to_string()))?;
    stream
        .play()
        .map_err(|e| CaptureError::Denied(e.to_string()))?;

    info!(
        name,
        sample_rate,
        channels,
        duration = ?duration,
        "Recording clip"
    );
    thread::sleep(duration);
    drop(stream);

    if let Ok(err) = err_rx.try_recv() {
        return Err(CaptureError::Stream(err));
    }
    let samples: Vec<f32> = data_rx.try_iter().flatten().collect();
    clip_from_recording(&samples, channels, sample_rate, name, owner_id)
}

/// Turns interleaved recorded samples into a clip.
pub fn clip_from_recording(
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
    name: &str,
    owner_id: &str,
) -> Result<Clip, CaptureError> {
    if samples.is_empty() || channels == 0 {
        return Err(CaptureError::Empty);
    }
    let payload = encode_pcm16(samples, channels, sample_rate)?;
    let clip = Clip::new(name, owner_id, payload);
    info!(
        clip = %clip.id(),
        frames = samples.len() / channels as usize,
        "Recorded clip"
    );
    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{Decoder, SymphoniaDecoder};

    #[test]
    fn test_recording_becomes_decodable_clip() {
        let samples: Vec<f32> = (0..2000).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let clip = clip_from_recording(&samples, 2, 48000, "Vox", "user-1").unwrap();
        assert_eq!(clip.name(), "Vox");
        assert_eq!(clip.owner_id(), "user-1");

        let buffer = SymphoniaDecoder.decode(&clip).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.frames(), 1000);
        assert!((buffer.channel(0)[10] - 0.5).abs() < 1e-3);
        assert!((buffer.channel(1)[10] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_empty_recording_is_an_error() {
        let result = clip_from_recording(&[], 1, 44100, "Nothing", "");
        assert!(matches!(result, Err(CaptureError::Empty)));
    }
}
