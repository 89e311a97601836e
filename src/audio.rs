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
use std::{fmt, sync::Arc};

use crate::chain::Voice;
use crate::config::EngineConfig;

pub mod capture;
pub mod cpal;
mod error;
pub mod mixer;
pub mod mock;

pub use error::{CaptureError, OutputError};
pub use mixer::{Mixer, MixerOptions};

/// Somewhere voices can be scheduled. The live output and the offline renderer
/// offer the same interface, so the signal chain does not care which one it feeds.
pub trait Timeline: Send + Sync {
    /// Frames per second of the timeline.
    fn sample_rate(&self) -> u32;

    /// The next frame that will be rendered.
    fn current_frame(&self) -> u64;

    /// Starts `voice` at `start_frame`. Frames in the past start immediately.
    fn schedule(&self, channel: usize, start_frame: u64, voice: Voice);
}

/// A live audio output.
pub trait Output: fmt::Display + Send + Sync {
    /// Resumes a suspended output, blocking until the device is running.
    fn resume(&self) -> Result<(), OutputError>;

    /// Returns true if the output has not been resumed yet.
    fn is_suspended(&self) -> bool;

    /// The mixer feeding this output.
    fn mixer(&self) -> &Mixer;
}

/// Lists the available audio output devices.
pub fn list_devices() -> Result<Vec<String>, OutputError> {
    cpal::list_devices()
}

/// Gets the output named in the configuration.
pub fn get_output(config: &EngineConfig) -> Result<Arc<dyn Output>, OutputError> {
    let options = config
        .mixer_options()
        .map_err(|e| OutputError::Config(e.to_string()))?;

    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Output::get(device, options)));
    };

    Ok(Arc::new(cpal::Output::get(device, options)?))
}
