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
/// Pulls a playback rate toward the nearest equal-tempered semitone.
///
/// The rate is expressed as a semitone offset (`12 * log2(rate)`), moved toward the
/// nearest whole semitone by `amount` (0 leaves it alone, 1 snaps it) and turned back
/// into a rate.
pub fn quantize_rate(rate: f32, amount: f32) -> f32 {
    let amount = amount.clamp(0.0, 1.0);
    if amount == 0.0 || rate <= 0.0 {
        return rate;
    }
    let semitones = 12.0 * rate.log2();
    let tuned = semitones + (semitones.round() - semitones) * amount;
    2f32.powf(tuned / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_amount_is_identity() {
        for rate in [0.5f32, 0.77, 1.0, 1.5, 3.9] {
            assert_eq!(quantize_rate(rate, 0.0), rate);
        }
    }

    #[test]
    fn test_full_amount_snaps_to_semitone() {
        // 1.5 is about 7.02 semitones up, so it snaps to a fifth.
        let snapped = quantize_rate(1.5, 1.0);
        assert!((snapped - 2f32.powf(7.0 / 12.0)).abs() < 1e-5);

        // Octaves are already on the grid.
        for rate in [0.5f32, 1.0, 2.0, 4.0] {
            assert!((quantize_rate(rate, 1.0) - rate).abs() < 1e-5);
        }
    }

    #[test]
    fn test_partial_amount_is_proportional() {
        let rate = 1.06; // about 1.01 semitones
        let semitones = |r: f32| 12.0 * r.log2();
        let half = semitones(quantize_rate(rate, 0.5));
        let expected = semitones(rate) + (1.0 - semitones(rate)) * 0.5;
        assert!((half - expected).abs() < 1e-4);
    }
}
