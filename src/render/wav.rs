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
//! Uncompressed PCM WAV encoding.
//!
//! Output is a canonical 44 byte RIFF/WAVE header (PCM format tag, channel count,
//! sample rate, byte rate, block align, 16 bits per sample) followed by little-endian
//! 16-bit signed interleaved samples.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

/// Size of the header written ahead of the sample data.
pub const HEADER_LEN: usize = 44;

/// Converts a float sample to 16-bit PCM. Input is clamped to [-1, 1]; negative
/// values scale by 32768 and positive values by 32767, truncating toward zero.
#[inline]
pub fn to_pcm16(sample: f32) -> i16 {
    let sample = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    if sample < 0.0 {
        (sample * 32768.0) as i16
    } else {
        (sample * 32767.0) as i16
    }
}

/// Encodes interleaved float samples as a 16-bit PCM WAV file in memory.
pub fn encode_pcm16(
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(HEADER_LEN + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(to_pcm16(*sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
