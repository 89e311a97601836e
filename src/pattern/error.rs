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
/// Rejected channel settings changes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("trim start ({start}) must be before trim end ({end})")]
    TrimOrder { start: f32, end: f32 },
}

/// Rejected track structure changes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackError {
    #[error("step count {0} must be a multiple of 4 between 4 and 64")]
    StepCount(usize),

    #[error("bpm must be a finite number")]
    Bpm,

    #[error("channel {channel} does not exist (track has {count} channels)")]
    NoSuchChannel { channel: usize, count: usize },

    #[error("step {step} does not exist (track has {count} steps)")]
    NoSuchStep { step: usize, count: usize },

    #[error("invalid settings for channel {channel}: {source}")]
    Settings {
        channel: usize,
        #[source]
        source: SettingsError,
    },
}
