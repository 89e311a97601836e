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
//! The sequencer data model: clips, channel settings, the step grid and tracks.
//!
//! Everything here is plain data. Audio is produced by the `chain`, `transport`
//! and `render` modules from snapshots of these types.

pub mod clip;
pub mod error;
pub mod grid;
pub mod proposal;
pub mod settings;
pub mod track;

pub use clip::{Clip, ClipId, ClipLibrary};
pub use error::{SettingsError, TrackError};
pub use grid::{CellKey, PatternGrid, RANDOMIZE_PROBABILITY};
pub use proposal::{Proposal, ProposalReport, ProposalRequest};
pub use settings::{ChannelSettings, SettingsUpdate};
pub use track::{seconds_per_step, ToggleOutcome, Track};
