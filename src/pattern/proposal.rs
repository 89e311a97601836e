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
//! Exchange format with an external pattern proposer. The proposer receives a
//! [ProposalRequest] and answers with a [Proposal] whose grid uses `"channel-step"` keys.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    clip::{ClipId, ClipLibrary},
    grid::{CellKey, PatternGrid},
    track::Track,
};

/// A clip the proposer may place on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableClip {
    pub id: ClipId,
    pub name: String,
}

/// Input handed to a proposer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    pub prompt: String,
    pub clips: Vec<AvailableClip>,
    pub channel_count: usize,
    pub step_count: usize,
}

impl ProposalRequest {
    pub fn new(prompt: impl Into<String>, track: &Track, clips: &ClipLibrary) -> ProposalRequest {
        ProposalRequest {
            prompt: prompt.into(),
            clips: clips
                .iter()
                .map(|clip| AvailableClip {
                    id: clip.id().clone(),
                    name: clip.name().to_string(),
                })
                .collect(),
            channel_count: track.channel_count(),
            step_count: track.step_count(),
        }
    }
}

/// A proposed pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub bpm: Option<f32>,
    #[serde(default)]
    pub grid: BTreeMap<String, Vec<ClipId>>,
}

/// What applying a proposal kept and what it threw away.
#[derive(Debug, Default, PartialEq)]
pub struct ProposalReport {
    pub cells_applied: usize,
    pub skipped_keys: Vec<String>,
    pub unknown_clips: BTreeSet<ClipId>,
}

impl Proposal {
    pub fn from_json(json: &str) -> Result<Proposal, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Replaces the track's pattern with the proposal. Malformed or out-of-range keys and
    /// clips missing from the library are dropped. The bpm is clamped like any other
    /// tempo change, and a non-finite bpm is ignored.
    pub fn apply_to(&self, track: &mut Track, clips: &ClipLibrary) -> ProposalReport {
        let mut report = ProposalReport::default();
        let mut grid = PatternGrid::new();

        for (key, ids) in &self.grid {
            let cell = match key.parse::<CellKey>() {
                Ok(cell) if cell.channel < track.channel_count() && cell.step < track.step_count() => {
                    cell
                }
                _ => {
                    warn!(key, "Dropping proposed cell outside the grid");
                    report.skipped_keys.push(key.clone());
                    continue;
                }
            };

            let mut known = Vec::with_capacity(ids.len());
            for id in ids {
                if clips.contains(id) {
                    known.push(id.clone());
                } else {
                    warn!(clip = %id, key, "Dropping unknown clip from proposal");
                    report.unknown_clips.insert(id.clone());
                }
            }
            if !known.is_empty() {
                grid.set_cell(cell.channel, cell.step, known);
                report.cells_applied += 1;
            }
        }

        track.replace_grid(grid);
        if let Some(bpm) = self.bpm {
            if let Err(e) = track.set_bpm(bpm) {
                warn!(err = %e, "Ignoring proposed bpm");
            }
        }
        if let Some(title) = &self.title {
            track.set_title(title.clone());
        }

        info!(
            cells = report.cells_applied,
            skipped = report.skipped_keys.len(),
            unknown_clips = report.unknown_clips.len(),
            "Applied pattern proposal"
        );
        report
    }
}
