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
//! beatgrid is a step-sequencer audio engine: a decoded sample cache, a per-channel
//! signal chain, a live step transport and an offline renderer that mixes a whole
//! pattern into a WAV file.

pub mod audio;
pub mod chain;
pub mod config;
pub mod pattern;
pub mod project;
pub mod render;
pub mod samples;
pub mod session;
pub mod transport;
pub mod util;

#[cfg(test)]
pub mod testutil;
