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
/// Normalized tanh waveshaper. An amount of zero leaves the signal untouched.
#[derive(Debug, Clone, Copy)]
pub struct Shaper {
    drive: f32,
    normalize: f32,
}

impl Shaper {
    /// Creates a shaper for a 0..1 distortion amount. Drive ranges from 1 to 10.
    pub fn new(amount: f32) -> Shaper {
        let amount = amount.clamp(0.0, 1.0);
        if amount == 0.0 {
            return Shaper {
                drive: 0.0,
                normalize: 1.0,
            };
        }
        let drive = 1.0 + amount * 9.0;
        Shaper {
            drive,
            normalize: 1.0 / drive.tanh(),
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.drive == 0.0
    }

    #[inline]
    pub fn process(&self, input: f32) -> f32 {
        if self.is_bypassed() {
            return input;
        }
        (input * self.drive).tanh() * self.normalize
    }
}
