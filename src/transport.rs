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
//! Live transport. A timer walks the step pointer across the pattern and triggers
//! every clip found at each channel's current step.
//!
//! Timing is driven by the tokio timer rather than the audio clock. Each tick
//! re-arms a fresh sleep of one step interval, so a tempo change lands on the next
//! re-arm and the transport can drift from the audio clock by up to one interval.
//! Triggers are scheduled a short latency ahead of the mixer's current frame so all
//! channels of a tick start together.

use std::{sync::Arc, time::Duration};

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, span, warn, Instrument, Level, Span};

use crate::audio::{Output, Timeline};
use crate::chain::ChannelSignalChain;
use crate::pattern::{ClipId, ClipLibrary, Track};
use crate::samples::{SampleBuffer, SampleStore};

mod error;

pub use error::TransportError;

/// A snapshot of the transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportStatus {
    pub running: bool,
    /// The step that fired most recently. None while stopped.
    pub current_step: Option<usize>,
    pub bpm: f32,
    pub step_count: usize,
}

#[derive(Default)]
struct Position {
    running: bool,
    step: Option<usize>,
}

/// State shared between the scheduler handle and its timer task.
struct Shared {
    output: Arc<dyn Output>,
    store: Arc<SampleStore>,
    clips: Arc<RwLock<ClipLibrary>>,
    track: Arc<RwLock<Track>>,
    latency: Duration,
    position: Mutex<Position>,
}

/// Drives live playback of a track. STOPPED until started, RUNNING until stopped.
pub struct StepScheduler {
    shared: Arc<Shared>,
    /// The timer task. There is at most one at a time.
    join: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    span: Span,
}

impl StepScheduler {
    pub fn new(
        output: Arc<dyn Output>,
        store: Arc<SampleStore>,
        clips: Arc<RwLock<ClipLibrary>>,
        track: Arc<RwLock<Track>>,
        latency: Duration,
    ) -> StepScheduler {
        StepScheduler {
            shared: Arc::new(Shared {
                output,
                store,
                clips,
                track,
                latency,
                position: Mutex::new(Position::default()),
            }),
            join: tokio::sync::Mutex::new(None),
            span: span!(Level::INFO, "transport"),
        }
    }

    /// Starts the transport. A suspended output is resumed, and the resume awaited,
    /// before anything is triggered. The first step fires immediately.
    pub async fn start(&self) -> Result<(), TransportError> {
        async {
            let mut join = self.join.lock().await;
            if join.is_some() {
                info!("Transport is already running.");
                return Ok(());
            }

            self.shared.ensure_output().await?;

            self.shared.position.lock().running = true;
            let (bpm, step_count) = {
                let track = self.shared.track.read();
                (track.bpm(), track.step_count())
            };
            info!(bpm, step_count, output = %self.shared.output, "Transport started");

            let shared = self.shared.clone();
            *join = Some(tokio::spawn(
                Shared::run(shared).instrument(self.span.clone()),
            ));
            Ok::<(), TransportError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Stops the transport. Future steps are cancelled at once; voices that are
    /// already sounding play out.
    pub async fn stop(&self) {
        async {
            let mut join = self.join.lock().await;
            let Some(handle) = join.take() else {
                info!("Transport is not running, nothing to stop.");
                return;
            };

            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(err = %e, "Transport task failed");
                }
            }

            let mut position = self.shared.position.lock();
            position.running = false;
            position.step = None;
            info!("Transport stopped");
        }
        .instrument(self.span.clone())
        .await
    }

    /// Triggers everything at `step` without moving the transport. Returns the
    /// number of clips triggered.
    pub async fn tick(&self, step: usize) -> usize {
        self.shared
            .tick(step)
            .instrument(self.span.clone())
            .await
    }

    /// Plays `clip` on `channel` right away, whether or not the transport is running.
    /// Returns false if the clip could not be played.
    pub async fn audition(&self, channel: usize, clip: &ClipId) -> Result<bool, TransportError> {
        async {
            self.shared.ensure_output().await?;

            let chain = ChannelSignalChain::new(&self.shared.track.read().settings(channel));
            let Some(buffer) = self.shared.resolve(clip).await else {
                return Ok(false);
            };

            let mixer = self.shared.output.mixer();
            let start_frame = mixer.current_frame() + self.shared.latency_frames();
            chain.trigger(mixer, channel, buffer, start_frame);
            debug!(channel, clip = %clip, start_frame, "Audition");
            Ok::<bool, TransportError>(true)
        }
        .instrument(self.span.clone())
        .await
    }

    pub fn status(&self) -> TransportStatus {
        let (bpm, step_count) = {
            let track = self.shared.track.read();
            (track.bpm(), track.step_count())
        };
        let position = self.shared.position.lock();
        TransportStatus {
            running: position.running,
            current_step: position.step,
            bpm,
            step_count,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.position.lock().running
    }

    pub fn current_step(&self) -> Option<usize> {
        self.shared.position.lock().step
    }
}

impl Shared {
    async fn run(shared: Arc<Shared>) {
        let mut step = 0;
        loop {
            shared.tick(step).await;

            let (interval, step_count) = {
                let track = shared.track.read();
                (track.step_interval(), track.step_count())
            };
            tokio::time::sleep(interval).await;
            step = (step + 1) % step_count;
        }
    }

    async fn tick(&self, step: usize) -> usize {
        // Settings are captured once per tick; edits made while clips decode apply
        // from the next tick on.
        let cells: Vec<(usize, ChannelSignalChain, Vec<ClipId>)> = {
            let track = self.track.read();
            track
                .grid()
                .at_step(step)
                .map(|(channel, ids)| {
                    (
                        channel,
                        ChannelSignalChain::new(&track.settings(channel)),
                        ids.to_vec(),
                    )
                })
                .collect()
        };
        self.position.lock().step = Some(step);

        let mixer = self.output.mixer();
        let start_frame = mixer.current_frame() + self.latency_frames();
        let mut fired = 0;
        for (channel, chain, ids) in cells {
            for id in ids {
                if let Some(buffer) = self.resolve(&id).await {
                    chain.trigger(mixer, channel, buffer, start_frame);
                    fired += 1;
                }
            }
        }

        debug!(step, fired, start_frame, "Step");
        fired
    }

    async fn resolve(&self, id: &ClipId) -> Option<Arc<SampleBuffer>> {
        let clip = self.clips.read().get(id);
        let Some(clip) = clip else {
            warn!(clip = %id, "Clip is not in the library, skipping trigger");
            return None;
        };
        match self.store.get(&clip).await {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                warn!(clip = %id, err = %e, "Clip could not be decoded, skipping trigger");
                None
            }
        }
    }

    async fn ensure_output(&self) -> Result<(), TransportError> {
        if !self.output.is_suspended() {
            return Ok(());
        }
        let output = self.output.clone();
        tokio::task::spawn_blocking(move || output.resume())
            .await
            .map_err(|e| TransportError::Task(e.to_string()))??;
        Ok(())
    }

    fn latency_frames(&self) -> u64 {
        (self.latency.as_secs_f64() * self.output.mixer().sample_rate() as f64).round() as u64
    }
}
