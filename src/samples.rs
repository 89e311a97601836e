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
//! Decoding and caching of clip audio.
//!
//! - Decoding: a [Decoder] turns a clip's encoded payload into a [SampleBuffer].
//! - Caching: the [SampleStore] decodes each clip once, coalescing concurrent
//!   requests, and keeps the outcome for the rest of the session.

mod buffer;
mod decoder;
mod error;
mod store;

pub use buffer::SampleBuffer;
pub use decoder::{Decoder, SymphoniaDecoder};
pub use error::DecodeError;
pub use store::{DecodeResult, SampleStore};
