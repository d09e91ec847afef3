use std::f64::consts::{PI, TAU};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// LFO waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Waveform {
    #[default]
    Triangle,
    RampUp,
    RampDown,
    Square,
    Random,
}

impl Waveform {
    pub fn name(self) -> &'static str {
        match self {
            Waveform::Triangle => "triangle",
            Waveform::RampUp => "ramp up",
            Waveform::RampDown => "ramp down",
            Waveform::Square => "square",
            Waveform::Random => "random",
        }
    }
}

/// Cached output of the random waveform and when it was last drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomHold {
    /// Uniform in [0, 1).
    pub value: f64,
    /// Milliseconds since the Unix epoch.
    pub updated_at: u64,
}

impl RandomHold {
    pub fn draw<R: Rng + ?Sized>(now_ms: u64, rng: &mut R) -> Self {
        RandomHold {
            value: rng.gen_range(0.0..1.0),
            updated_at: now_ms,
        }
    }

    /// The hold to use at `now_ms`: the existing one until more than
    /// `interval_ms` has elapsed, then a fresh draw. A missing hold is
    /// seeded lazily.
    pub fn advance<R: Rng + ?Sized>(
        hold: Option<RandomHold>,
        now_ms: u64,
        interval_ms: f64,
        rng: &mut R,
    ) -> RandomHold {
        match hold {
            Some(h) if (now_ms.saturating_sub(h.updated_at) as f64) > interval_ms => {
                Self::draw(now_ms, rng)
            }
            Some(h) => h,
            None => Self::draw(now_ms, rng),
        }
    }
}

/// Length of one cycle in milliseconds, or `None` for a frequency that
/// cannot drive an oscillator (zero, negative, NaN, infinite).
pub fn period_ms(frequency: f64) -> Option<f64> {
    if frequency.is_finite() && frequency > 0.0 {
        Some(1000.0 / frequency)
    } else {
        None
    }
}

/// Phase in [0, 2π) at wall-clock instant `now_ms`.
pub fn phase_at(now_ms: u64, period_ms: f64) -> f64 {
    ((now_ms as f64 % period_ms) / period_ms) * TAU
}

/// Map a phase onto the `min..max` amplitude range.
///
/// `random` is the held uniform value and is only read by
/// [`Waveform::Random`]. When `min > max` the sweep is inverted rather
/// than rejected.
pub fn evaluate(waveform: Waveform, phase: f64, min: u8, max: u8, random: f64) -> u8 {
    let unit = match waveform {
        Waveform::Triangle => ((2.0 / PI) * phase.sin().asin()).abs(),
        Waveform::RampUp => phase / TAU,
        Waveform::RampDown => 1.0 - phase / TAU,
        Waveform::Square => {
            if phase < PI {
                1.0
            } else {
                0.0
            }
        }
        Waveform::Random => random,
    };
    let (min, max) = (min as f64, max as f64);
    (unit * (max - min) + min).round() as u8
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn phase_zero_values() {
        assert_eq!(evaluate(Waveform::Triangle, 0.0, 0, 127, 0.0), 0);
        assert_eq!(evaluate(Waveform::RampUp, 0.0, 0, 127, 0.0), 0);
        assert_eq!(evaluate(Waveform::RampDown, 0.0, 0, 127, 0.0), 127);
        assert_eq!(evaluate(Waveform::Square, 0.0, 0, 127, 0.0), 127);
    }

    #[test]
    fn triangle_peaks_at_quarter_cycle() {
        assert_eq!(evaluate(Waveform::Triangle, PI / 2.0, 0, 127, 0.0), 127);
        assert_eq!(evaluate(Waveform::Triangle, PI / 2.0, 20, 100, 0.0), 100);
    }

    #[test]
    fn triangle_is_symmetric() {
        for i in 1..64 {
            let phase = TAU * (i as f64 + 0.3) / 64.0;
            assert_eq!(
                evaluate(Waveform::Triangle, phase, 0, 127, 0.0),
                evaluate(Waveform::Triangle, TAU - phase, 0, 127, 0.0),
                "phase {phase}"
            );
        }
    }

    #[test]
    fn square_steps_at_pi() {
        let below = PI - 1e-9;
        assert_eq!(evaluate(Waveform::Square, below, 10, 90, 0.0), 90);
        assert_eq!(evaluate(Waveform::Square, PI, 10, 90, 0.0), 10);
        assert_eq!(evaluate(Waveform::Square, 0.1, 10, 90, 0.0), 90);
        assert_eq!(evaluate(Waveform::Square, 5.0, 10, 90, 0.0), 10);
    }

    #[test]
    fn ramps_at_half_cycle() {
        assert_eq!(evaluate(Waveform::RampUp, PI, 0, 100, 0.0), 50);
        assert_eq!(evaluate(Waveform::RampDown, PI, 0, 100, 0.0), 50);
        assert_eq!(evaluate(Waveform::RampUp, PI * 1.5, 0, 100, 0.0), 75);
    }

    #[test]
    fn inverted_range_sweeps_backwards() {
        assert_eq!(evaluate(Waveform::RampUp, 0.0, 100, 20, 0.0), 100);
        assert_eq!(evaluate(Waveform::RampUp, PI, 100, 20, 0.0), 60);
        assert_eq!(evaluate(Waveform::Square, 0.0, 100, 20, 0.0), 20);
    }

    #[test]
    fn random_scales_held_value() {
        assert_eq!(evaluate(Waveform::Random, 1.0, 0, 100, 0.25), 25);
        assert_eq!(evaluate(Waveform::Random, 4.0, 0, 100, 0.25), 25);
    }

    #[test]
    fn phase_wraps_each_period() {
        let period = period_ms(2.0).unwrap();
        assert_eq!(period, 500.0);
        assert_eq!(phase_at(0, period), 0.0);
        assert_eq!(phase_at(500, period), 0.0);
        assert!((phase_at(1_000_250, period) - PI).abs() < 1e-9);
    }

    #[test]
    fn degenerate_frequency_has_no_period() {
        assert_eq!(period_ms(0.0), None);
        assert_eq!(period_ms(-1.0), None);
        assert_eq!(period_ms(f64::NAN), None);
        assert_eq!(period_ms(f64::INFINITY), None);
    }

    #[test]
    fn random_hold_regenerates_after_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let first = RandomHold::advance(None, 1_000, 100.0, &mut rng);
        assert_eq!(first.updated_at, 1_000);
        assert!((0.0..1.0).contains(&first.value));

        let held = RandomHold::advance(Some(first), 1_100, 100.0, &mut rng);
        assert_eq!(held, first);

        let fresh = RandomHold::advance(Some(first), 1_101, 100.0, &mut rng);
        assert_eq!(fresh.updated_at, 1_101);
    }
}
