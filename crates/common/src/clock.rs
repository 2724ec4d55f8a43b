//! Playback clock and frame pacing.
//!
//! Elapsed sample times are compressed by a speed factor into playback
//! timestamps measured from a zero epoch. The pacer uses consecutive
//! playback timestamps to throttle wall-clock frame generation; it has
//! no influence on the encoded stream, whose timing is fixed by its FPS.

use std::time::{Duration, Instant};

use crate::error::{InsituError, InsituResult};

/// Maps elapsed seconds onto playback offsets from a zero epoch.
///
/// Offsets stay signed: unsorted input produces offsets before the
/// epoch, and only the wait between two frames is clamped.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    speed_factor: f64,
}

impl PlaybackClock {
    /// Create a clock compressing time by `speed_factor` (must be finite and > 0).
    pub fn new(speed_factor: f64) -> InsituResult<Self> {
        if !speed_factor.is_finite() || speed_factor <= 0.0 {
            return Err(InsituError::config(format!(
                "speed factor must be a positive number, got {speed_factor}"
            )));
        }
        Ok(Self { speed_factor })
    }

    /// Playback offsets, in seconds, for a whole elapsed-seconds series.
    ///
    /// Fails when an offset is too large to wait for.
    pub fn playback_timestamps(&self, elapsed_secs: &[f64]) -> InsituResult<Vec<f64>> {
        elapsed_secs
            .iter()
            .map(|&secs| {
                let offset = secs / self.speed_factor;
                match Duration::try_from_secs_f64(offset.abs()) {
                    Ok(_) => Ok(offset),
                    Err(_) => Err(InsituError::parse(format!(
                        "elapsed time {secs} s is out of range for playback"
                    ))),
                }
            })
            .collect()
    }
}

/// Convert seconds to a `Duration`. Negatives and NaN become zero,
/// values beyond `Duration::MAX` saturate.
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Wait between frame `index` and `index + 1`, clamped to zero.
///
/// Returns `Duration::ZERO` for the last frame.
pub fn pacing_delay(timestamps: &[f64], index: usize) -> Duration {
    match (timestamps.get(index), timestamps.get(index + 1)) {
        (Some(current), Some(next)) => secs_to_duration(next - current),
        _ => Duration::ZERO,
    }
}

/// Something that can block the current thread.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks with `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Paces frame generation against a list of playback timestamps.
#[derive(Debug)]
pub struct FramePacer<S: Sleeper = ThreadSleeper> {
    timestamps: Vec<f64>,
    sleeper: S,
    started: Instant,
    total_slept: Duration,
}

impl<S: Sleeper> FramePacer<S> {
    /// `timestamps` are playback offsets in seconds, one per frame.
    pub fn with_sleeper(timestamps: Vec<f64>, sleeper: S) -> Self {
        Self {
            timestamps,
            sleeper,
            started: Instant::now(),
            total_slept: Duration::ZERO,
        }
    }

    /// Call after frame `index` has been written; suspends until the
    /// next frame is due. Returns the requested delay.
    pub fn after_frame(&mut self, index: usize) -> Duration {
        let delay = pacing_delay(&self.timestamps, index);
        self.sleeper.sleep(delay);
        self.total_slept = self.total_slept.saturating_add(delay);
        delay
    }

    /// Sum of all requested delays so far.
    pub fn total_slept(&self) -> Duration {
        self.total_slept
    }

    /// Wall time since the pacer was created.
    pub fn wall_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn into_sleeper(self) -> S {
        self.sleeper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSleeper {
        calls: Vec<Duration>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, duration: Duration) {
            self.calls.push(duration);
        }
    }

    #[test]
    fn test_speed_factor_must_be_positive() {
        assert!(PlaybackClock::new(0.0).is_err());
        assert!(PlaybackClock::new(-2.0).is_err());
        assert!(PlaybackClock::new(f64::NAN).is_err());
        assert!(PlaybackClock::new(50.0).is_ok());
    }

    #[test]
    fn test_playback_compresses_elapsed_time() {
        let clock = PlaybackClock::new(50.0).unwrap();
        let ts = clock.playback_timestamps(&[0.0, 50.0]).unwrap();
        assert_eq!(ts, vec![0.0, 1.0]);
        assert_eq!(pacing_delay(&ts, 0), Duration::from_secs(1));
        assert_eq!(pacing_delay(&ts, 1), Duration::ZERO);
    }

    #[test]
    fn test_pacing_delay_clamps_backwards_steps() {
        let ts = vec![0.5, 0.2];
        assert_eq!(pacing_delay(&ts, 0), Duration::ZERO);
    }

    #[test]
    fn test_unsorted_offsets_keep_their_sign() {
        let clock = PlaybackClock::new(1.0).unwrap();
        let ts = clock.playback_timestamps(&[0.0, -10.0, 5.0]).unwrap();
        assert_eq!(ts, vec![0.0, -10.0, 5.0]);
        assert_eq!(pacing_delay(&ts, 0), Duration::ZERO);
        assert_eq!(pacing_delay(&ts, 1), Duration::from_secs(15));
    }

    #[test]
    fn test_unrepresentable_offset_is_an_error() {
        let clock = PlaybackClock::new(50.0).unwrap();
        let err = clock.playback_timestamps(&[0.0, 3.6e23]).unwrap_err();
        assert!(matches!(err, InsituError::Parse { .. }));
    }

    #[test]
    fn test_seconds_conversion_clamps_and_saturates() {
        assert_eq!(secs_to_duration(-1.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::INFINITY), Duration::MAX);
        assert_eq!(secs_to_duration(1e30), Duration::MAX);
        assert_eq!(secs_to_duration(0.25), Duration::from_millis(250));
    }

    #[test]
    fn test_pacer_sleeps_between_frames_only() {
        let ts = vec![0.0, 0.1, 0.35];
        let mut pacer = FramePacer::with_sleeper(ts, RecordingSleeper::default());
        for i in 0..3 {
            pacer.after_frame(i);
        }
        let sleeper = pacer.into_sleeper();
        assert_eq!(sleeper.calls.len(), 3);
        assert!((sleeper.calls[0].as_secs_f64() - 0.1).abs() < 1e-9);
        assert!((sleeper.calls[1].as_secs_f64() - 0.25).abs() < 1e-9);
        assert_eq!(sleeper.calls[2], Duration::ZERO);
    }
}
