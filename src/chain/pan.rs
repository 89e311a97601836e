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
use std::f32::consts::FRAC_PI_2;

/// Equal-power placement of a mono signal. -1 is hard left, 1 is hard right.
#[inline]
pub fn pan_mono(pan: f32, input: f32) -> [f32; 2] {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) / 2.0;
    [input * (x * FRAC_PI_2).cos(), input * (x * FRAC_PI_2).sin()]
}

/// Equal-power balance of a stereo signal. Panning toward one side folds the
/// opposite channel into it.
#[inline]
pub fn pan_stereo(pan: f32, left: f32, right: f32) -> [f32; 2] {
    let pan = pan.clamp(-1.0, 1.0);
    if pan <= 0.0 {
        let x = pan + 1.0;
        [
            left + right * (x * FRAC_PI_2).cos(),
            right * (x * FRAC_PI_2).sin(),
        ]
    } else {
        let x = pan;
        [
            left * (x * FRAC_PI_2).cos(),
            right + left * (x * FRAC_PI_2).sin(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_equal_power() {
        for pan in [-1.0f32, -0.5, 0.0, 0.3, 1.0] {
            let [left, right] = pan_mono(pan, 1.0);
            assert!((left * left + right * right - 1.0).abs() < 1e-6);
        }
        let [left, right] = pan_mono(0.0, 1.0);
        assert!((left - right).abs() < 1e-6);
        let [left, right] = pan_mono(-1.0, 1.0);
        assert!((left - 1.0).abs() < 1e-6 && right.abs() < 1e-6);
        let [left, right] = pan_mono(1.0, 1.0);
        assert!(left.abs() < 1e-6 && (right - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_center_is_unchanged() {
        let [left, right] = pan_stereo(0.0, 0.25, -0.5);
        assert!((left - 0.25).abs() < 1e-6);
        assert!((right + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_hard_pan_folds() {
        let [left, right] = pan_stereo(-1.0, 0.25, 0.5);
        assert!((left - 0.75).abs() < 1e-6);
        assert!(right.abs() < 1e-6);
        let [left, right] = pan_stereo(1.0, 0.25, 0.5);
        assert!(left.abs() < 1e-6);
        assert!((right - 0.75).abs() < 1e-6);
    }
}
