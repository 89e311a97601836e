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
use std::time::Duration;

/// Highest feedback the bus accepts. Anything at or above 1 would grow without bound.
pub const MAX_FEEDBACK: f32 = 0.95;

/// A stereo feedback delay shared by every voice of a mixer. Voices feed it through
/// their delay send and the mixer adds its output to the dry signal.
#[derive(Debug, Clone)]
pub struct DelayBus {
    line: Vec<[f32; 2]>,
    position: usize,
    feedback: f32,
}

impl DelayBus {
    pub fn new(sample_rate: u32, time: Duration, feedback: f32) -> DelayBus {
        let length = (time.as_secs_f64() * sample_rate as f64).round().max(1.0) as usize;
        DelayBus {
            line: vec![[0.0; 2]; length],
            position: 0,
            feedback: clamp_feedback(feedback),
        }
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Delay time in frames.
    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// Feeds one frame of send signal and returns one frame of delayed output.
    #[inline]
    pub fn process(&mut self, send: [f32; 2]) -> [f32; 2] {
        let delayed = self.line[self.position];
        self.line[self.position] = [
            send[0] + delayed[0] * self.feedback,
            send[1] + delayed[1] * self.feedback,
        ];
        self.position = (self.position + 1) % self.line.len();
        delayed
    }
}

/// Clamps a feedback coefficient into `[0, MAX_FEEDBACK]`. Non-finite values disable feedback.
pub fn clamp_feedback(feedback: f32) -> f32 {
    if feedback.is_finite() {
        feedback.clamp(0.0, MAX_FEEDBACK)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_is_clamped_below_one() {
        assert_eq!(DelayBus::new(100, Duration::from_millis(100), 1.5).feedback(), MAX_FEEDBACK);
        assert_eq!(DelayBus::new(100, Duration::from_millis(100), -0.2).feedback(), 0.0);
        assert_eq!(DelayBus::new(100, Duration::from_millis(100), f32::NAN).feedback(), 0.0);
        assert_eq!(DelayBus::new(100, Duration::from_millis(100), 0.4).feedback(), 0.4);
    }

    #[test]
    fn test_echoes_decay() {
        let mut bus = DelayBus::new(100, Duration::from_millis(100), 0.5);
        assert_eq!(bus.len(), 10);

        let mut output = Vec::new();
        output.push(bus.process([1.0, -1.0]));
        for _ in 0..40 {
            output.push(bus.process([0.0, 0.0]));
        }
        assert_eq!(output[0], [0.0, 0.0]);
        assert_eq!(output[10], [1.0, -1.0]);
        assert_eq!(output[20], [0.5, -0.5]);
        assert_eq!(output[30], [0.25, -0.25]);
        assert_eq!(output[15], [0.0, 0.0]);
    }

    #[test]
    fn test_stays_bounded_at_max_feedback() {
        let mut bus = DelayBus::new(1000, Duration::from_millis(10), 10.0);
        let mut peak = 0.0f32;
        for _ in 0..100_000 {
            let [left, _] = bus.process([1.0, 1.0]);
            peak = peak.max(left.abs());
        }
        // Geometric series limit: 1 / (1 - 0.95).
        assert!(peak <= 20.0 + 1e-3, "peak {}", peak);
    }
}
