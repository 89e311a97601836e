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
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::clip::ClipId;

/// Probability that a step is activated by pattern randomization.
pub const RANDOMIZE_PROBABILITY: f64 = 0.15;

/// Addresses one grid cell. Orders by channel, then step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub channel: usize,
    pub step: usize,
}

impl CellKey {
    pub fn new(channel: usize, step: usize) -> CellKey {
        CellKey { channel, step }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.channel, self.step)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid grid key {0:?}, expected \"channel-step\"")]
pub struct GridKeyError(pub String);

impl FromStr for CellKey {
    type Err = GridKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (channel, step) = s
            .split_once('-')
            .ok_or_else(|| GridKeyError(s.to_string()))?;
        match (channel.trim().parse(), step.trim().parse()) {
            (Ok(channel), Ok(step)) => Ok(CellKey { channel, step }),
            _ => Err(GridKeyError(s.to_string())),
        }
    }
}

/// Sparse mapping of (channel, step) cells to the clips they trigger.
/// A cell whose list becomes empty is removed entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<ClipId>>",
    into = "BTreeMap<String, Vec<ClipId>>"
)]
pub struct PatternGrid {
    cells: BTreeMap<CellKey, Vec<ClipId>>,
}

impl PatternGrid {
    pub fn new() -> PatternGrid {
        PatternGrid::default()
    }

    /// Toggles a clip in a cell. If the clip is present it is removed (and the cell
    /// with it once empty), otherwise the cell is overwritten with just that clip.
    /// Returns true if the clip is present afterwards.
    pub fn toggle_cell(&mut self, channel: usize, step: usize, clip: &ClipId) -> bool {
        let key = CellKey::new(channel, step);
        match self.cells.get_mut(&key) {
            Some(clips) if clips.contains(clip) => {
                clips.retain(|existing| existing != clip);
                if clips.is_empty() {
                    self.cells.remove(&key);
                }
                false
            }
            _ => {
                self.cells.insert(key, vec![clip.clone()]);
                true
            }
        }
    }

    /// Returns the clips at a cell, in trigger order.
    pub fn cell(&self, channel: usize, step: usize) -> &[ClipId] {
        self.cells
            .get(&CellKey::new(channel, step))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replaces the contents of a cell. An empty list clears it.
    pub fn set_cell(&mut self, channel: usize, step: usize, clips: Vec<ClipId>) {
        let key = CellKey::new(channel, step);
        if clips.is_empty() {
            self.cells.remove(&key);
        } else {
            self.cells.insert(key, clips);
        }
    }

    pub fn clear_cell(&mut self, channel: usize, step: usize) {
        self.cells.remove(&CellKey::new(channel, step));
    }

    pub fn clear_channel(&mut self, channel: usize) {
        self.cells.retain(|key, _| key.channel != channel);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Independently activates each of the channel's steps with the given clip at
    /// `probability`, clearing the steps that are not activated. Returns the number
    /// of activated steps.
    pub fn randomize_channel<R: Rng>(
        &mut self,
        channel: usize,
        step_count: usize,
        clip: &ClipId,
        probability: f64,
        rng: &mut R,
    ) -> usize {
        let probability = probability.clamp(0.0, 1.0);
        let mut activated = 0;
        for step in 0..step_count {
            if rng.gen_bool(probability) {
                self.set_cell(channel, step, vec![clip.clone()]);
                activated += 1;
            } else {
                self.clear_cell(channel, step);
            }
        }
        activated
    }

    /// Drops every cell outside of the given bounds.
    pub fn retain_within(&mut self, channel_count: usize, step_count: usize) {
        self.cells
            .retain(|key, _| key.channel < channel_count && key.step < step_count);
    }

    /// Returns the non-empty cells at a step in ascending channel order.
    pub fn at_step(&self, step: usize) -> impl Iterator<Item = (usize, &[ClipId])> {
        self.cells
            .iter()
            .filter(move |(key, _)| key.step == step)
            .map(|(key, clips)| (key.channel, clips.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &[ClipId])> {
        self.cells.iter().map(|(key, clips)| (key, clips.as_slice()))
    }

    /// Every distinct clip referenced by the grid.
    pub fn clip_ids(&self) -> BTreeSet<ClipId> {
        self.cells.values().flatten().cloned().collect()
    }

    /// Number of non-empty cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Vec<ClipId>>> for PatternGrid {
    type Error = GridKeyError;

    fn try_from(value: BTreeMap<String, Vec<ClipId>>) -> Result<Self, Self::Error> {
        let mut grid = PatternGrid::new();
        for (key, clips) in value {
            let key: CellKey = key.parse()?;
            grid.set_cell(key.channel, key.step, clips);
        }
        Ok(grid)
    }
}

impl From<PatternGrid> for BTreeMap<String, Vec<ClipId>> {
    fn from(grid: PatternGrid) -> Self {
        grid.cells
            .into_iter()
            .map(|(key, clips)| (key.to_string(), clips))
            .collect()
    }
}
