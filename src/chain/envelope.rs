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
/// Linear attack/release amplitude envelope, measured in output frames.
///
/// The attack ramps from silence to full level starting at the trigger. The release
/// ramps back to silence so that it reaches zero at the natural end of the sound, or
/// it starts when the voice is cut by a retrigger on the same channel.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    attack: f64,
    release: f64,
    length: f64,
}

impl Envelope {
    pub fn new(attack_seconds: f32, release_seconds: f32, length_frames: f64, sample_rate: u32) -> Envelope {
        Envelope {
            attack: attack_seconds.max(0.0) as f64 * sample_rate as f64,
            release: release_seconds.max(0.0) as f64 * sample_rate as f64,
            length: length_frames,
        }
    }

    /// The level at `position` frames after the trigger. `cut_at` is the position at
    /// which a retrigger started the release, if any.
    #[inline]
    pub fn level(&self, position: f64, cut_at: Option<f64>) -> f32 {
        let attack = if self.attack > 0.0 {
            (position / self.attack).min(1.0)
        } else {
            1.0
        };

        let natural = if self.release > 0.0 {
            ((self.length - position) / self.release).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let cut = match cut_at {
            Some(cut_at) if position >= cut_at => {
                if self.release > 0.0 {
                    (1.0 - (position - cut_at) / self.release).max(0.0)
                } else {
                    0.0
                }
            }
            _ => 1.0,
        };

        (attack * natural.min(cut)) as f32
    }

    /// Returns true once a cut voice has fully released.
    pub fn is_silenced(&self, position: f64, cut_at: Option<f64>) -> bool {
        match cut_at {
            Some(cut_at) => position >= cut_at + self.release,
            None => false,
        }
    }
}
