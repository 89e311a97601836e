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
    collections::BTreeMap,
    fmt,
    sync::Arc,
};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::util::now_millis;

/// Identifies a clip. Grid cells and channel assignments refer to clips by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    pub fn new(id: impl Into<String>) -> ClipId {
        ClipId(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> ClipId {
        let value: u64 = rand::thread_rng().gen();
        ClipId(format!("clip-{:016x}", value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClipId {
    fn from(value: &str) -> Self {
        ClipId::new(value)
    }
}

/// A recorded or imported sound. Clips are immutable once created.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    id: ClipId,
    #[serde(default)]
    owner_id: String,
    name: String,
    /// The encoded audio (WAV, FLAC, MP3, ...). Decoded lazily by the sample store.
    #[serde(rename = "audio", with = "payload")]
    payload: Arc<[u8]>,
    #[serde(default)]
    color: String,
    #[serde(default)]
    created_at: u64,
}

impl Clip {
    /// Creates a new clip with a generated id and the current time as its creation time.
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>, payload: Vec<u8>) -> Clip {
        Clip::with_id(ClipId::generate(), name, owner_id, payload)
    }

    /// Creates a clip with an explicit id.
    pub fn with_id(
        id: ClipId,
        name: impl Into<String>,
        owner_id: impl Into<String>,
        payload: Vec<u8>,
    ) -> Clip {
        Clip {
            id,
            owner_id: owner_id.into(),
            name: name.into(),
            payload: payload.into(),
            color: String::new(),
            created_at: now_millis(),
        }
    }

    /// Sets the visual tag. Only used while building a clip.
    pub fn with_color(mut self, color: impl Into<String>) -> Clip {
        self.color = color.into();
        self
    }

    pub fn id(&self) -> &ClipId {
        &self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Arc<[u8]> {
        &self.payload
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("payload_bytes", &self.payload.len())
            .finish()
    }
}

/// All clips known to a session, keyed by id. Removing a clip never touches
/// the grids that reference it; such references are skipped at trigger time.
#[derive(Debug, Clone, Default)]
pub struct ClipLibrary {
    clips: BTreeMap<ClipId, Arc<Clip>>,
}

impl ClipLibrary {
    pub fn new() -> ClipLibrary {
        ClipLibrary::default()
    }

    /// Adds a clip, returning any clip previously stored under the same id.
    pub fn insert(&mut self, clip: Clip) -> Option<Arc<Clip>> {
        self.clips.insert(clip.id().clone(), Arc::new(clip))
    }

    pub fn remove(&mut self, id: &ClipId) -> Option<Arc<Clip>> {
        self.clips.remove(id)
    }

    pub fn get(&self, id: &ClipId) -> Option<Arc<Clip>> {
        self.clips.get(id).cloned()
    }

    pub fn contains(&self, id: &ClipId) -> bool {
        self.clips.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Clip>> {
        self.clips.values()
    }
}

impl FromIterator<Clip> for ClipLibrary {
    fn from_iter<T: IntoIterator<Item = Clip>>(iter: T) -> Self {
        let mut library = ClipLibrary::new();
        for clip in iter {
            library.insert(clip);
        }
        library
    }
}

/// Serializes clip payloads as base64 strings. Data URLs are accepted on input.
mod payload {
    use std::sync::Arc;

    use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_ENGINE.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u8]>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let encoded = match encoded.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => encoded.as_str(),
        };
        BASE64_ENGINE
            .decode(encoded.trim())
            .map(Arc::from)
            .map_err(|e| de::Error::custom(format!("invalid clip audio encoding: {}", e)))
    }
}
