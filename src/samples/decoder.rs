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
use std::io::Cursor;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::warn;

use super::{buffer::SampleBuffer, error::DecodeError};
use crate::pattern::Clip;

/// Turns a clip's encoded payload into a sample buffer. Decoding is blocking and
/// is run off the async runtime by the sample store.
pub trait Decoder: Send + Sync {
    fn decode(&self, clip: &Clip) -> Result<SampleBuffer, DecodeError>;
}

/// Decodes any container and codec symphonia can probe (WAV, FLAC, MP3, OGG, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl Decoder for SymphoniaDecoder {
    fn decode(&self, clip: &Clip) -> Result<SampleBuffer, DecodeError> {
        let id = clip.id();
        if clip.payload().is_empty() {
            return Err(DecodeError::EmptyPayload(id.clone()));
        }
        let codec_error = |e: SymphoniaError| DecodeError::Codec {
            clip: id.clone(),
            reason: e.to_string(),
        };

        let source = Cursor::new(clip.payload().clone());
        let mss = MediaSourceStream::new(Box::new(source), Default::default());
        let probed = get_probe()
            .format(
                &Hint::new(),
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::Format {
                clip: id.clone(),
                reason: e.to_string(),
            })?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::NoTrack(id.clone()))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(codec_error)?;

        let mut channels: Vec<Vec<f32>> = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                // Some readers report a decode error at the end of the stream.
                Err(SymphoniaError::DecodeError(_)) => break,
                Err(e) => return Err(codec_error(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!(clip = %id, reason, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(codec_error(e)),
            };
            sample_rate.get_or_insert(decoded.spec().rate);
            append_planar(&mut channels, decoded);
        }

        match sample_rate.and_then(|rate| SampleBuffer::new(rate, channels)) {
            Some(buffer) if buffer.frames() > 0 => Ok(buffer),
            _ => Err(DecodeError::NoAudio(id.clone())),
        }
    }
}

/// Converts a decoded packet to f32 and appends it channel by channel.
fn append_planar(channels: &mut Vec<Vec<f32>>, decoded: AudioBufferRef<'_>) {
    let mut planar = decoded.make_equivalent::<f32>();
    decoded.convert(&mut planar);
    let count = planar.spec().channels.count();
    if channels.len() < count {
        channels.resize_with(count, Vec::new);
    }
    for (index, channel) in channels.iter_mut().enumerate().take(count) {
        channel.extend_from_slice(planar.chan(index));
    }
}
