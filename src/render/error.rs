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
use std::path::PathBuf;

/// Offline render and export failures. When one is returned, no output file exists.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("track cannot be rendered: {0}")]
    InvalidTrack(String),

    #[error("render task failed: {0}")]
    Task(String),

    #[error("unable to encode audio: {0}")]
    Encode(#[from] hound::Error),

    #[error("unable to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
