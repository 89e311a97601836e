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

use crate::pattern::TrackError;

/// A project document that cannot be imported. Nothing is imported when one is
/// returned.
#[derive(Debug, thiserror::Error)]
pub enum ImportFormatError {
    #[error("project is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("project must be a JSON object")]
    NotAnObject,

    #[error("not a beatgrid project (type is {})", .found.as_deref().unwrap_or("missing"))]
    WrongType { found: Option<String> },

    #[error("unsupported project version {0}")]
    Version(u64),

    #[error("invalid track: {0}")]
    TrackFields(#[source] serde_json::Error),

    #[error("invalid clips: {0}")]
    Clips(#[source] serde_json::Error),

    #[error(transparent)]
    Track(#[from] TrackError),
}

/// Project file errors.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Format(#[from] ImportFormatError),

    #[error("unable to serialize project: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("unable to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
