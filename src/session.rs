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
//! The engine context: one output, one sample store, one clip library and the
//! track being edited, with the transport that plays it.
//!
//! A session is created from a configuration and a project and torn down with
//! [Session::shutdown]. Every edit goes through it, so the transport always sees a
//! consistent track between ticks.

use std::{path::Path, sync::Arc, time::Duration};

use parking_lot::RwLock;
use tracing::{info, span, warn, Instrument, Level, Span};

use crate::{
    audio::{self, capture, Output},
    config::EngineConfig,
    pattern::{
        Clip, ClipId, ClipLibrary, Proposal, ProposalReport, ProposalRequest, SettingsUpdate,
        ToggleOutcome, Track,
    },
    project::Project,
    render::{OfflineRenderer, RenderedAudio},
    samples::SampleStore,
    transport::{StepScheduler, TransportStatus},
};

mod error;

pub use error::SessionError;

pub struct Session {
    config: EngineConfig,
    output: Arc<dyn Output>,
    store: Arc<SampleStore>,
    clips: Arc<RwLock<ClipLibrary>>,
    track: Arc<RwLock<Track>>,
    transport: StepScheduler,
    span: Span,
}

impl Session {
    /// Opens the configured output and decodes every clip of the project up front.
    pub async fn new(config: EngineConfig, project: Project) -> Result<Session, SessionError> {
        let output = {
            let config = config.clone();
            tokio::task::spawn_blocking(move || audio::get_output(&config))
                .await
                .map_err(|e| SessionError::Task(e.to_string()))??
        };
        Session::with_output(config, output, project).await
    }

    /// Starts a session on an output that is already open.
    pub async fn with_output(
        config: EngineConfig,
        output: Arc<dyn Output>,
        project: Project,
    ) -> Result<Session, SessionError> {
        let span = span!(Level::INFO, "session");
        async move {
            let store = Arc::new(SampleStore::new());
            let failures = store.preload(project.clips.iter().cloned()).await;
            if failures > 0 {
                warn!(failures, "Some clips could not be decoded and will be skipped");
            }

            let clips = Arc::new(RwLock::new(project.clips));
            let track = Arc::new(RwLock::new(project.track));
            let transport = StepScheduler::new(
                output.clone(),
                store.clone(),
                clips.clone(),
                track.clone(),
                config.trigger_latency()?,
            );

            info!(
                output = %output,
                clips = store.len(),
                memory = store.total_memory_usage(),
                "Session started"
            );
            Ok(Session {
                config,
                output,
                store,
                clips,
                track,
                transport,
                span: Span::current(),
            })
        }
        .instrument(span)
        .await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn output(&self) -> &Arc<dyn Output> {
        &self.output
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    /// A snapshot of the track.
    pub fn track(&self) -> Track {
        self.track.read().clone()
    }

    /// A self-contained snapshot of the track and its clips.
    pub fn project(&self) -> Project {
        Project::new(self.track(), self.clips.read().clone())
    }

    pub async fn play(&self) -> Result<(), SessionError> {
        Ok(self.transport.start().await?)
    }

    pub async fn stop(&self) {
        self.transport.stop().await
    }

    pub fn status(&self) -> TransportStatus {
        self.transport.status()
    }

    /// Toggles the channel's primary clip at `step`. Turning a step on auditions it.
    /// The edit stands even if the audition cannot be played.
    pub async fn toggle_step(
        &self,
        channel: usize,
        step: usize,
    ) -> Result<ToggleOutcome, SessionError> {
        let outcome = self.track.write().toggle_step(channel, step)?;
        if let ToggleOutcome::Added(clip) = &outcome {
            if let Err(e) = self.audition(channel, clip).await {
                let _enter = self.span.enter();
                warn!(channel, step, clip = %clip, err = %e, "Audition failed");
            }
        }
        Ok(outcome)
    }

    /// Plays a clip through the channel's chain right away.
    pub async fn audition(&self, channel: usize, clip: &ClipId) -> Result<bool, SessionError> {
        Ok(self.transport.audition(channel, clip).await?)
    }

    pub fn update_settings(
        &self,
        channel: usize,
        update: SettingsUpdate,
    ) -> Result<(), SessionError> {
        let _enter = self.span.enter();
        self.track.write().update_settings(channel, update)?;
        Ok(())
    }

    /// Changes the tempo. A running transport picks it up on its next step.
    pub fn set_bpm(&self, bpm: f32) -> Result<f32, SessionError> {
        let _enter = self.span.enter();
        let bpm = self.track.write().set_bpm(bpm)?;
        info!(bpm, "Tempo changed");
        Ok(bpm)
    }

    pub fn set_step_count(&self, step_count: usize) -> Result<(), SessionError> {
        let _enter = self.span.enter();
        self.track.write().set_step_count(step_count)?;
        info!(step_count, "Step count changed");
        Ok(())
    }

    pub fn set_title(&self, title: &str) {
        self.track.write().set_title(title);
    }

    pub fn add_channel(&self) -> usize {
        self.track.write().add_channel()
    }

    pub fn assign_clip(&self, channel: usize, clip: ClipId) -> Result<(), SessionError> {
        let _enter = self.span.enter();
        if !self.clips.read().contains(&clip) {
            warn!(channel, clip = %clip, "Assigning a clip that is not in the library");
        }
        self.track.write().assign_clip(channel, clip)?;
        Ok(())
    }

    /// Re-rolls the given channels with the configured probability. Returns the number
    /// of activated steps.
    pub fn randomize(&self, channels: &[usize]) -> usize {
        let _enter = self.span.enter();
        let probability = self.config.randomize_probability();
        let activated =
            self.track
                .write()
                .randomize_pattern(channels, probability, &mut rand::thread_rng());
        info!(channels = ?channels, activated, "Randomized pattern");
        activated
    }

    pub fn clear_pattern(&self) {
        self.track.write().clear_pattern();
    }

    /// The request a pattern proposer needs to suggest a grid for this track.
    pub fn proposal_request(&self, prompt: &str) -> ProposalRequest {
        ProposalRequest::new(prompt, &self.track.read(), &self.clips.read())
    }

    pub fn apply_proposal(&self, proposal: &Proposal) -> ProposalReport {
        let _enter = self.span.enter();
        let clips = self.clips.read();
        proposal.apply_to(&mut self.track.write(), &clips)
    }

    /// Adds a clip to the library and decodes it so its first trigger is not delayed.
    pub async fn add_clip(&self, clip: Clip) -> ClipId {
        let id = clip.id().clone();
        if self.clips.write().insert(clip).is_some() {
            warn!(clip = %id, "Replaced a clip with the same id");
        }
        let clip = self.clips.read().get(&id);
        if let Some(clip) = clip {
            if let Err(e) = self.store.get(&clip).await {
                warn!(clip = %id, err = %e, "Added clip cannot be decoded");
            }
        }
        id
    }

    /// Removes a clip from the library. Cells that still refer to it are skipped
    /// when they come up.
    pub fn remove_clip(&self, id: &ClipId) -> Option<Arc<Clip>> {
        let _enter = self.span.enter();
        let removed = self.clips.write().remove(id);
        if removed.is_some() && self.track.read().referenced_clips().contains(id) {
            info!(clip = %id, "Removed clip is still referenced by the track");
        }
        removed
    }

    /// Records a new clip from the default input and adds it to the library. With a
    /// channel, the clip also becomes that channel's primary clip.
    pub async fn capture(
        &self,
        name: &str,
        duration: Duration,
        channel: Option<usize>,
    ) -> Result<ClipId, SessionError> {
        let owner_id = self.track.read().owner_id().to_string();
        let name = name.to_string();
        let clip = tokio::task::spawn_blocking(move || capture::record(duration, &name, &owner_id))
            .await
            .map_err(|e| SessionError::Task(e.to_string()))??;

        let id = self.add_clip(clip).await;
        if let Some(channel) = channel {
            self.track.write().assign_clip(channel, id.clone())?;
        }
        Ok(id)
    }

    /// Renders the whole track offline.
    pub async fn render(&self) -> Result<RenderedAudio, SessionError> {
        let (track, clips) = self.snapshot();
        Ok(self.renderer()?.render(&track, &clips, &self.store).await?)
    }

    /// Renders the whole track offline and writes it to `path` as a WAV file.
    pub async fn export(&self, path: &Path) -> Result<RenderedAudio, SessionError> {
        let (track, clips) = self.snapshot();
        Ok(self
            .renderer()?
            .export(&track, &clips, &self.store, path)
            .await?)
    }

    /// Stops the transport and closes the output.
    pub async fn shutdown(self) {
        self.transport.stop().await;
        info!(parent: &self.span, output = %self.output, "Session closed");
    }

    fn snapshot(&self) -> (Track, ClipLibrary) {
        (self.track(), self.clips.read().clone())
    }

    fn renderer(&self) -> Result<OfflineRenderer, SessionError> {
        Ok(OfflineRenderer::with_sample_rate(
            self.config.export_sample_rate(),
            self.config.mixer_options()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{mock, MixerOptions};
    use crate::pattern::PatternGrid;
    use crate::testutil::{constant_clip, garbage_clip, peak};

    fn project() -> Project {
        let mut track = Track::new("Session", "user-1");
        track.assign_clip(0, ClipId::new("kick")).unwrap();
        track.assign_clip(1, ClipId::new("hat")).unwrap();
        let clips = [
            constant_clip("kick", 0.5, 44100, 2000),
            constant_clip("hat", 0.25, 22050, 500),
            garbage_clip("broken"),
        ]
        .into_iter()
        .collect();
        Project::new(track, clips)
    }

    async fn session() -> Session {
        Session::new(EngineConfig::new("mock"), project())
            .await
            .unwrap()
    }

    fn scheduled(session: &Session) -> u64 {
        session.output().mixer().scheduled_total()
    }

    #[tokio::test]
    async fn test_clips_are_decoded_up_front() {
        let session = session().await;
        assert_eq!(session.store().len(), 3);
        assert!(session.store().cached(&ClipId::new("kick")).unwrap().is_ok());
        assert!(session.store().cached(&ClipId::new("broken")).unwrap().is_err());
        assert_eq!(session.output().to_string(), "mock (Mock)");
    }

    #[tokio::test]
    async fn test_toggle_auditions_added_steps() {
        let session = session().await;

        let outcome = session.toggle_step(0, 3).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Added(ClipId::new("kick")));
        assert_eq!(scheduled(&session), 1);
        assert!(!session.output().is_suspended());

        let outcome = session.toggle_step(0, 3).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Removed(ClipId::new("kick")));
        assert_eq!(scheduled(&session), 1);
        assert!(session.track().grid().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_keeps_edit_when_audition_fails() {
        let output = Arc::new(mock::Output::get("mock", MixerOptions::default()));
        output.fail_resume(true);
        let session = Session::with_output(EngineConfig::new("mock"), output.clone(), project())
            .await
            .unwrap();

        let outcome = session.toggle_step(0, 3).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Added(ClipId::new("kick")));
        assert_eq!(session.track().grid().cell(0, 3), &[ClipId::new("kick")]);
        assert_eq!(scheduled(&session), 0);
        assert!(output.is_suspended());

        // The audition surfaces the failure when called directly.
        assert!(session.audition(0, &ClipId::new("kick")).await.is_err());
    }

    #[tokio::test]
    async fn test_toggle_without_primary_clip_changes_nothing() {
        let session = session().await;
        let before = session.track();
        let outcome = session.toggle_step(2, 0).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::NoPrimaryClip);
        assert_eq!(session.track(), before);
        assert_eq!(scheduled(&session), 0);

        assert!(matches!(
            session.toggle_step(9, 0).await,
            Err(SessionError::Track(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_and_stop() {
        let session = session().await;
        session.toggle_step(0, 0).await.unwrap();
        session.toggle_step(1, 1).await.unwrap();
        assert_eq!(scheduled(&session), 2);

        session.play().await.unwrap();
        tokio::time::sleep(Duration::from_millis(130)).await;
        let status = session.status();
        assert!(status.running);
        assert_eq!(status.current_step, Some(1));
        assert_eq!(scheduled(&session), 4);

        session.stop().await;
        assert!(!session.status().running);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_editing() {
        let session = session().await;
        assert_eq!(session.set_bpm(500.0).unwrap(), 240.0);
        session.set_step_count(32).unwrap();
        assert!(session.set_step_count(30).is_err());
        session
            .update_settings(1, SettingsUpdate::Volume(0.3))
            .unwrap();
        assert!(session
            .update_settings(1, SettingsUpdate::Pitch(f32::NAN))
            .is_err());
        let channel = session.add_channel();
        assert_eq!(channel, 4);
        session.assign_clip(channel, ClipId::new("hat")).unwrap();
        session.set_title("Renamed");

        let track = session.track();
        assert_eq!(track.bpm(), 240.0);
        assert_eq!(track.step_count(), 32);
        assert_eq!(track.settings(1).volume(), 0.3);
        assert_eq!(track.primary_clip(4), Some(&ClipId::new("hat")));
        assert_eq!(track.title(), "Renamed");
    }

    #[tokio::test]
    async fn test_randomize_uses_primary_clips() {
        let session = session().await;
        session.randomize(&[0, 2]);
        let track = session.track();
        for (cell, clips) in track.grid().iter() {
            assert_eq!(cell.channel, 0);
            assert_eq!(clips, &[ClipId::new("kick")]);
        }
        session.clear_pattern();
        assert!(session.track().grid().is_empty());
    }

    #[tokio::test]
    async fn test_proposals() {
        let session = session().await;
        let request = session.proposal_request("four on the floor");
        assert_eq!(request.clips.len(), 3);
        assert_eq!(request.step_count, 16);

        let proposal = Proposal::from_json(
            r#"{"title": "Floor", "bpm": 128, "grid": {"0-0": ["kick"], "0-4": ["kick", "ghost"], "7-0": ["kick"]}}"#,
        )
        .unwrap();
        let report = session.apply_proposal(&proposal);
        assert_eq!(report.cells_applied, 2);
        assert_eq!(report.skipped_keys, vec!["7-0".to_string()]);

        let track = session.track();
        assert_eq!(track.title(), "Floor");
        assert_eq!(track.bpm(), 128.0);
        assert_eq!(track.grid().cell(0, 4), &[ClipId::new("kick")]);
    }

    #[tokio::test]
    async fn test_clip_library_changes() {
        let session = session().await;
        let id = session.add_clip(constant_clip("snare", 0.1, 44100, 300)).await;
        assert!(session.store().cached(&id).unwrap().is_ok());

        session.toggle_step(0, 0).await.unwrap();
        assert!(session.remove_clip(&ClipId::new("kick")).is_some());
        assert!(session.remove_clip(&ClipId::new("kick")).is_none());
        // The reference stays in the grid and is skipped when rendered.
        assert_eq!(session.track().grid().cell(0, 0), &[ClipId::new("kick")]);
        let rendered = session.render().await.unwrap();
        assert_eq!(rendered.peak(), 0.0);
    }

    #[tokio::test]
    async fn test_export_and_project() {
        let dir = tempfile::tempdir().unwrap();
        let session = session().await;
        session.toggle_step(0, 0).await.unwrap();
        session.toggle_step(1, 8).await.unwrap();

        let path = dir.path().join("session.wav");
        let rendered = session.export(&path).await.unwrap();
        assert_eq!(rendered.frames(), 88200);
        assert!(peak(rendered.left()) > 0.1);
        assert!(path.exists());

        let project = session.project();
        assert_eq!(project.clips.len(), 3);
        let mut expected = PatternGrid::new();
        expected.set_cell(0, 0, vec![ClipId::new("kick")]);
        expected.set_cell(1, 8, vec![ClipId::new("hat")]);
        assert_eq!(project.track.grid(), &expected);
    }
}
