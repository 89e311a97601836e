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
use std::f32::consts::PI;

pub const MIN_CUTOFF_HZ: f32 = 200.0;
pub const MAX_CUTOFF_HZ: f32 = 20000.0;

/// Maps the 0..1 cutoff setting to Hz. The curve is quadratic so that more of
/// the control's travel is spent on the low end.
pub fn cutoff_hz(cutoff: f32) -> f32 {
    let cutoff = cutoff.clamp(0.0, 1.0);
    MIN_CUTOFF_HZ + cutoff * cutoff * (MAX_CUTOFF_HZ - MIN_CUTOFF_HZ)
}

/// A two-channel second order (RBJ) lowpass with a Butterworth Q.
#[derive(Debug, Clone)]
pub struct Lowpass {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: [f32; 2],
    z2: [f32; 2],
}

impl Lowpass {
    pub fn new(cutoff_hz: f32, sample_rate: u32) -> Lowpass {
        // Stay clear of Nyquist, where the coefficients degenerate.
        let nyquist_guard = sample_rate as f32 * 0.49;
        let frequency = cutoff_hz.clamp(1.0, nyquist_guard);
        let q = std::f32::consts::FRAC_1_SQRT_2;

        let w0 = 2.0 * PI * frequency / sample_rate as f32;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;

        Lowpass {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            z1: [0.0; 2],
            z2: [0.0; 2],
        }
    }

    /// Filters one sample of the given channel (0 or 1).
    #[inline]
    pub fn process(&mut self, channel: usize, input: f32) -> f32 {
        let output = self.b0 * input + self.z1[channel];
        self.z1[channel] = self.b1 * input - self.a1 * output + self.z2[channel];
        self.z2[channel] = self.b2 * input - self.a2 * output;
        output
    }
}
