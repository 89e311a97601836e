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
use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::Mutex;
use tokio::{sync::OnceCell, task::JoinSet};
use tracing::{debug, info, warn};

use super::{
    buffer::SampleBuffer,
    decoder::{Decoder, SymphoniaDecoder},
    error::DecodeError,
};
use crate::pattern::{Clip, ClipId};

/// The settled outcome of decoding one clip.
pub type DecodeResult = Result<Arc<SampleBuffer>, DecodeError>;

/// Decodes clips on first use and keeps the result for the life of the store.
///
/// Each clip id maps to a single cell. The first requester runs the decode on a
/// blocking task; anyone else asking for the same clip in the meantime waits on the
/// same cell, so a clip is decoded at most once. Failures are kept too: clips are
/// immutable, so a payload that failed once will always fail.
pub struct SampleStore {
    decoder: Arc<dyn Decoder>,
    cells: Mutex<HashMap<ClipId, Arc<OnceCell<DecodeResult>>>>,
}

impl Default for SampleStore {
    fn default() -> Self {
        SampleStore::new()
    }
}

impl SampleStore {
    /// Creates a store backed by the symphonia decoder.
    pub fn new() -> SampleStore {
        SampleStore::with_decoder(Arc::new(SymphoniaDecoder))
    }

    pub fn with_decoder(decoder: Arc<dyn Decoder>) -> SampleStore {
        SampleStore {
            decoder,
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the decoded buffer for the clip, decoding it if this is the first request.
    pub async fn get(&self, clip: &Arc<Clip>) -> DecodeResult {
        let cell = self
            .cells
            .lock()
            .entry(clip.id().clone())
            .or_default()
            .clone();

        if let Some(result) = cell.get() {
            debug!(clip = %clip.id(), "Using cached sample");
            return result.clone();
        }

        cell.get_or_init(|| self.decode(clip.clone()))
            .await
            .clone()
    }

    async fn decode(&self, clip: Arc<Clip>) -> DecodeResult {
        info!(
            clip = %clip.id(),
            name = clip.name(),
            bytes = clip.payload().len(),
            "Decoding clip"
        );

        let decoder = self.decoder.clone();
        let id = clip.id().clone();
        let result = match tokio::task::spawn_blocking(move || decoder.decode(&clip)).await {
            Ok(result) => result.map(Arc::new),
            Err(e) => Err(DecodeError::Aborted {
                clip: id.clone(),
                reason: e.to_string(),
            }),
        };

        match &result {
            Ok(buffer) => info!(
                clip = %id,
                channels = buffer.channel_count(),
                sample_rate = buffer.sample_rate(),
                duration_ms = buffer.duration().as_millis(),
                memory_kb = buffer.memory_size() / 1024,
                "Clip decoded"
            ),
            Err(e) => warn!(clip = %id, err = %e, "Clip could not be decoded"),
        }
        result
    }

    /// Returns the settled result for a clip without triggering a decode.
    pub fn cached(&self, id: &ClipId) -> Option<DecodeResult> {
        self.cells
            .lock()
            .get(id)
            .and_then(|cell| cell.get().cloned())
    }

    /// Decodes all of the given clips concurrently. Returns the number that failed.
    pub async fn preload(self: &Arc<Self>, clips: impl IntoIterator<Item = Arc<Clip>>) -> usize {
        let mut tasks = JoinSet::new();
        for clip in clips {
            let store = self.clone();
            tasks.spawn(async move { store.get(&clip).await.is_err() });
        }

        let mut failures = 0;
        while let Some(joined) = tasks.join_next().await {
            if joined.unwrap_or(true) {
                failures += 1;
            }
        }
        failures
    }

    /// Number of clips with a settled decode result.
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total memory used by decoded buffers.
    pub fn total_memory_usage(&self) -> usize {
        self.cells
            .lock()
            .values()
            .filter_map(|cell| cell.get())
            .filter_map(|result| result.as_ref().ok())
            .map(|buffer| buffer.memory_size())
            .sum()
    }
}

impl fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleStore")
            .field("cached", &self.len())
            .field("memory_bytes", &self.total_memory_usage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testutil::{garbage_clip, tone_clip, CountingDecoder};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_requests_decode_once() {
        let decoder = Arc::new(CountingDecoder::with_delay(Duration::from_millis(50)));
        let store = Arc::new(SampleStore::with_decoder(decoder.clone()));
        let clip = Arc::new(tone_clip("kick", 440.0, 44100, 0.1));

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            let clip = clip.clone();
            tasks.spawn(async move { store.get(&clip).await });
        }
        let mut buffers = Vec::new();
        while let Some(result) = tasks.join_next().await {
            buffers.push(result.expect("join").expect("decode"));
        }

        assert_eq!(decoder.calls(), 1);
        assert_eq!(buffers.len(), 16);
        assert!(buffers.iter().all(|buffer| Arc::ptr_eq(buffer, &buffers[0])));
    }

    #[tokio::test]
    async fn test_cached_lookup_does_not_decode_again() {
        let decoder = Arc::new(CountingDecoder::default());
        let store = SampleStore::with_decoder(decoder.clone());
        let clip = Arc::new(tone_clip("hat", 8000.0, 44100, 0.05));

        assert!(store.cached(clip.id()).is_none());
        let first = store.get(&clip).await.expect("decode");
        let second = store.get(&clip).await.expect("decode");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(decoder.calls(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.cached(clip.id()).is_some());
        assert!(store.total_memory_usage() > 0);
    }

    #[tokio::test]
    async fn test_failures_are_scoped_and_memoized() {
        let decoder = Arc::new(CountingDecoder::default());
        let store = SampleStore::with_decoder(decoder.clone());
        let bad = Arc::new(garbage_clip("bad"));
        let good = Arc::new(tone_clip("good", 220.0, 44100, 0.05));

        let first = store.get(&bad).await;
        let second = store.get(&bad).await;
        assert!(matches!(first, Err(DecodeError::Format { .. })));
        assert_eq!(first, second);
        assert!(store.get(&good).await.is_ok());
        assert_eq!(decoder.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_preload_counts_failures() {
        let store = Arc::new(SampleStore::new());
        let clips = vec![
            Arc::new(tone_clip("a", 220.0, 44100, 0.05)),
            Arc::new(garbage_clip("b")),
            Arc::new(tone_clip("c", 330.0, 48000, 0.05)),
        ];
        assert_eq!(store.preload(clips).await, 1);
        assert_eq!(store.len(), 3);
    }
}
