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
//! Self-contained project documents: a track and every clip it needs, as JSON.
//!
//! The canonical document nests the track:
//!
//! ```json
//! {"type": "beatgrid-project", "version": 1, "track": {...}, "clips": [...]}
//! ```
//!
//! Older documents put the track fields at the top level beside `clips`. Both are
//! accepted on import; export always writes the canonical shape.

use std::{fs, path::Path};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::pattern::{Clip, ClipLibrary, Track};
use crate::util::write_replacing;

mod error;

pub use error::{ImportFormatError, ProjectError};

/// The document type discriminator.
pub const PROJECT_TYPE: &str = "beatgrid-project";

/// The document version written on export.
pub const PROJECT_VERSION: u64 = 1;

/// A track together with its clips.
#[derive(Debug, Clone)]
pub struct Project {
    pub track: Track,
    pub clips: ClipLibrary,
}

#[derive(Serialize)]
struct Document<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    version: u64,
    track: &'a Track,
    clips: Vec<&'a Clip>,
}

impl Project {
    pub fn new(track: Track, clips: ClipLibrary) -> Project {
        Project { track, clips }
    }

    /// Parses a project document in either shape.
    pub fn from_json(json: &str) -> Result<Project, ImportFormatError> {
        let value: Value = serde_json::from_str(json).map_err(ImportFormatError::Json)?;
        let Value::Object(mut document) = value else {
            return Err(ImportFormatError::NotAnObject);
        };

        match document.remove("type") {
            Some(Value::String(kind)) if kind == PROJECT_TYPE => {}
            Some(other) => {
                return Err(ImportFormatError::WrongType {
                    found: Some(match other {
                        Value::String(kind) => kind,
                        other => other.to_string(),
                    }),
                })
            }
            None => return Err(ImportFormatError::WrongType { found: None }),
        }

        if let Some(version) = document.remove("version") {
            match version.as_u64() {
                Some(PROJECT_VERSION) => {}
                Some(version) => return Err(ImportFormatError::Version(version)),
                None => return Err(ImportFormatError::Version(0)),
            }
        }

        let clips: Vec<Clip> = match document.remove("clips") {
            Some(clips) => serde_json::from_value(clips).map_err(ImportFormatError::Clips)?,
            None => Vec::new(),
        };

        let track_value = match document.remove("track") {
            Some(track) => track,
            None => {
                info!("Importing legacy flattened project");
                Value::Object(document)
            }
        };
        let track: Track =
            serde_json::from_value(track_value).map_err(ImportFormatError::TrackFields)?;
        let track = track.validated()?;

        let mut library = ClipLibrary::new();
        for clip in clips {
            let id = clip.id().clone();
            if library.insert(clip).is_some() {
                warn!(clip = %id, "Project contains the same clip twice, keeping the last one");
            }
        }

        let missing = track
            .referenced_clips()
            .into_iter()
            .filter(|id| !library.contains(id))
            .count();
        if missing > 0 {
            warn!(missing, "Project references clips it does not contain");
        }

        Ok(Project {
            track,
            clips: library,
        })
    }

    /// Serializes the project in the canonical shape.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Document {
            kind: PROJECT_TYPE,
            version: PROJECT_VERSION,
            track: &self.track,
            clips: self.clips.iter().map(|clip| clip.as_ref()).collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Project, ProjectError> {
        let json = fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let project = Project::from_json(&json)?;
        info!(
            path = ?path,
            title = project.track.title(),
            clips = project.clips.len(),
            "Loaded project"
        );
        Ok(project)
    }

    /// Writes the project to `path`. An existing file is only replaced once the new
    /// document has been written completely.
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let json = self.to_json().map_err(ProjectError::Serialize)?;
        write_replacing(path, json.as_bytes()).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = ?path, "Saved project");
        Ok(())
    }
}
