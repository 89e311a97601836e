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
use crate::pattern::ClipId;

/// A clip whose payload could not be turned into audio. Failures are cached like
/// successful decodes, so the error is cheap to clone and hand to every requester.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("clip {0} has an empty audio payload")]
    EmptyPayload(ClipId),

    #[error("unrecognized audio format in clip {clip}: {reason}")]
    Format { clip: ClipId, reason: String },

    #[error("clip {0} contains no audio track")]
    NoTrack(ClipId),

    #[error("failed to decode clip {clip}: {reason}")]
    Codec { clip: ClipId, reason: String },

    #[error("clip {0} decoded to no audio")]
    NoAudio(ClipId),

    #[error("decode task for clip {clip} did not complete: {reason}")]
    Aborted { clip: ClipId, reason: String },
}
