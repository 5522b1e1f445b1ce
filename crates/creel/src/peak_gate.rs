//! Peak gate driving catch-buffer recording.
//!
//! Tracks a per-channel peak envelope with instant attack and a linear release spread over
//! `VECTOR_FRAMES * 128` samples, and reports whether the envelope currently exceeds the caller's
//! threshold.  The smoothing keeps recording open across the short gaps inside a phrase instead of
//! chattering on every quiet vector.  All state is owned by the audio participant.

use crate::config::{Block, StereoBlock, VECTOR_FRAMES};

const RELEASE_SAMPLES: f32 = VECTOR_FRAMES as f32 * 128.0;

/// Snap the envelope to zero below this to avoid denormal tails holding the gate open.
const EPSILON: f32 = 1.0e-6;

/// Linear ramp toward a target value.
struct LinearGlide {
    value: f32,
    glide_samples: f32,
}

impl LinearGlide {
    fn new(glide_samples: f32) -> LinearGlide {
        LinearGlide {
            value: 0.0,
            glide_samples,
        }
    }

    /// Jump to `value` immediately.
    fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    /// Advance `frames` samples toward `target`; returns the largest value seen along the ramp.
    fn process_block(&mut self, target: f32, frames: usize) -> f32 {
        let step = (target - self.value) / self.glide_samples.max(1.0);
        let mut peak = self.value;
        for _ in 0..frames {
            if (step >= 0.0 && self.value >= target) || (step < 0.0 && self.value <= target) {
                self.value = target;
                break;
            }
            self.value += step;
            peak = peak.max(self.value);
        }
        peak.max(self.value)
    }
}

struct GateChannel {
    glide: LinearGlide,
    peak: f32,
}

/// Per-channel peak envelope + threshold comparison.
pub(crate) struct PeakGate {
    channels: Vec<GateChannel>,
}

impl PeakGate {
    pub(crate) fn new(channel_count: u16) -> PeakGate {
        let channels = (0..channel_count)
            .map(|_| GateChannel {
                glide: LinearGlide::new(RELEASE_SAMPLES),
                peak: 0.0,
            })
            .collect();
        PeakGate { channels }
    }

    fn process_channel(&mut self, channel: usize, input: &Block, threshold: f32) -> bool {
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for &s in input {
            lo = lo.min(s);
            hi = hi.max(s);
        }
        let peak = lo.abs().max(hi.abs());

        let c = &mut self.channels[channel];
        if peak > c.peak {
            // Instant attack: adopt a louder peak without smoothing.
            c.glide.set_value(peak);
        }
        c.peak = c.glide.process_block(peak, VECTOR_FRAMES);
        if c.peak < EPSILON {
            c.peak = 0.0;
        }
        c.peak > threshold
    }

    pub(crate) fn process_mono(&mut self, input: &Block, threshold: f32) -> bool {
        debug_assert_eq!(self.channels.len(), 1);
        self.process_channel(0, input, threshold)
    }

    /// The first channel whose envelope exceeds the threshold opens the gate; later channels are
    /// not processed for that vector, so their envelopes only advance while earlier channels stay
    /// below the threshold.
    pub(crate) fn process_stereo(&mut self, input: &StereoBlock, threshold: f32) -> bool {
        debug_assert_eq!(self.channels.len(), 2);
        for ch in 0..2 {
            if self.process_channel(ch, &input[ch], threshold) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(value: f32) -> Block {
        [value; VECTOR_FRAMES]
    }

    #[test]
    fn opens_immediately_on_signal() {
        let mut gate = PeakGate::new(1);
        assert!(gate.process_mono(&block(0.5), 0.1));
    }

    #[test]
    fn silence_never_opens_a_zero_threshold_gate() {
        let mut gate = PeakGate::new(1);
        assert!(!gate.process_mono(&block(0.0), 0.0));
    }

    #[test]
    fn negative_peaks_count() {
        let mut gate = PeakGate::new(1);
        assert!(gate.process_mono(&block(-0.8), 0.5));
    }

    #[test]
    fn release_holds_the_gate_open_briefly() {
        let mut gate = PeakGate::new(1);
        assert!(gate.process_mono(&block(1.0), 0.2));
        // One silent vector is far shorter than the release ramp.
        assert!(gate.process_mono(&block(0.0), 0.2));
    }

    #[test]
    fn release_eventually_closes_the_gate() {
        let mut gate = PeakGate::new(1);
        assert!(gate.process_mono(&block(1.0), 0.2));
        let mut open = true;
        for _ in 0..1000 {
            open = gate.process_mono(&block(0.0), 0.2);
            if !open {
                break;
            }
        }
        assert!(!open);
    }

    #[test]
    fn stereo_gate_is_the_or_of_channels() {
        let mut gate = PeakGate::new(2);
        assert!(gate.process_stereo(&[block(0.0), block(0.9)], 0.5));
        let mut gate = PeakGate::new(2);
        assert!(!gate.process_stereo(&[block(0.1), block(0.1)], 0.5));
    }
}
