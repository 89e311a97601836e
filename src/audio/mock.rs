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
    fmt,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use tracing::info;

use super::{Mixer, MixerOptions, OutputError};

/// Sample rate of the mock output.
pub const MOCK_SAMPLE_RATE: u32 = 44100;

/// A mock output. Doesn't actually play anything; the mixer only advances when
/// it is rendered explicitly.
pub struct Output {
    name: String,
    mixer: Mixer,
    suspended: AtomicBool,
    resumes: AtomicUsize,
    fail_resume: AtomicBool,
}

impl Output {
    /// Gets the given mock output. It starts out suspended.
    pub fn get(name: &str, options: MixerOptions) -> Output {
        Output {
            name: name.to_string(),
            mixer: Mixer::new(MOCK_SAMPLE_RATE, options),
            suspended: AtomicBool::new(true),
            resumes: AtomicUsize::new(0),
            fail_resume: AtomicBool::new(false),
        }
    }

    /// Number of times the output was actually resumed.
    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    /// Makes subsequent resumes fail, as a device that went away would.
    #[cfg(test)]
    pub fn fail_resume(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::SeqCst);
    }
}

impl super::Output for Output {
    fn resume(&self) -> Result<(), OutputError> {
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(OutputError::Play("mock output refused to resume".to_string()));
        }
        if self.suspended.swap(false, Ordering::SeqCst) {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            info!(device = self.name, "Mock output resumed");
        }
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    fn mixer(&self) -> &Mixer {
        &self.mixer
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
