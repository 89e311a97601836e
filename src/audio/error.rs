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
/// Failures of the live output device.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OutputError {
    #[error("no output device found with name {0}")]
    NoDevice(String),

    #[error("unable to query output device configuration: {0}")]
    Config(String),

    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("failed to create output stream: {0}")]
    Build(String),

    #[error("failed to start output stream: {0}")]
    Play(String),

    #[error("output stream thread is no longer running")]
    Disconnected,
}

/// Failures while recording a new clip. These are reported to the caller as-is;
/// there is no fallback input.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("unable to query input device configuration: {0}")]
    Config(String),

    #[error("unsupported input sample format {0}")]
    UnsupportedFormat(String),

    #[error("input stream failed: {0}")]
    Stream(String),

    #[error("recording access was denied or the input could not start: {0}")]
    Denied(String),

    #[error("nothing was recorded")]
    Empty,

    #[error("unable to encode recording: {0}")]
    Encode(#[from] hound::Error),
}
