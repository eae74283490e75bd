//! Runtime performance telemetry
//!
//! The application's main loop calls `tick` once per emulated frame; menu
//! overlays and the launcher pull derived figures through `stats`. Counters
//! live behind a short critical section so ticks and stat reads from
//! different threads never observe torn values.

use crate::average::MovingAverage;
use parking_lot::Mutex;

/// Raw accumulators since the last reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeCounters {
    pub total_frames: u32,
    pub skipped_frames: u32,
    pub full_frames: u32,
    /// Cumulative time spent emulating, in microseconds
    pub busy_time_us: u64,
    /// Cumulative wall time covered by ticks, in microseconds
    pub real_time_us: u64,
    /// Timestamp of the last reset
    pub reset_time_us: u64,
    /// Timestamp of the last tick
    pub last_tick_us: u64,
}

/// Derived frame-timing figures, computed on demand
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    pub total_fps: f32,
    pub skipped_fps: f32,
    /// Frames neither fully rendered nor skipped
    pub partial_fps: f32,
    /// Actual frame rate over the configured target rate
    pub emulated_speed: f32,
    /// Share of wall time spent emulating, 0..=100
    pub busy_percent: f32,
    /// Smoothed frame duration in microseconds
    pub frame_time_avg_us: f32,
    pub last_tick_us: u64,
}

struct Inner {
    counters: RuntimeCounters,
    frame_time: MovingAverage,
}

/// Per-frame counter collector
pub struct Telemetry {
    frame_window: u16,
    target_fps: u32,
    inner: Mutex<Inner>,
}

impl Telemetry {
    pub fn new(frame_window: u16, target_fps: u32) -> Self {
        Self {
            frame_window,
            target_fps: target_fps.max(1),
            inner: Mutex::new(Inner {
                counters: RuntimeCounters::default(),
                frame_time: MovingAverage::new(frame_window),
            }),
        }
    }

    /// Account one emulated frame ending at `now_us`
    pub fn tick(&self, now_us: u64, skipped: bool, full: bool, busy_us: u64) {
        let mut inner = self.inner.lock();
        let Inner {
            counters,
            frame_time,
        } = &mut *inner;

        counters.total_frames += 1;
        if skipped {
            counters.skipped_frames += 1;
        }
        if full {
            counters.full_frames += 1;
        }
        counters.busy_time_us += busy_us;

        let elapsed = now_us.saturating_sub(counters.last_tick_us);
        counters.real_time_us += elapsed;
        frame_time.push(elapsed as f32);
        counters.last_tick_us = now_us;
    }

    /// Zero the counters and stamp `now_us` as the new session start
    pub fn reset(&self, now_us: u64) {
        let mut inner = self.inner.lock();
        inner.counters = RuntimeCounters {
            reset_time_us: now_us,
            last_tick_us: now_us,
            ..RuntimeCounters::default()
        };
        inner.frame_time = MovingAverage::new(self.frame_window);
        tracing::debug!(now_us, "telemetry reset");
    }

    /// Copy of the raw counters, without resetting them
    pub fn counters(&self) -> RuntimeCounters {
        self.inner.lock().counters
    }

    /// Derive frame statistics for the session ending at `now_us`
    pub fn stats(&self, now_us: u64) -> FrameStats {
        let inner = self.inner.lock();
        let c = inner.counters;

        let elapsed_us = now_us.saturating_sub(c.reset_time_us);
        if elapsed_us == 0 {
            return FrameStats {
                last_tick_us: c.last_tick_us,
                ..FrameStats::default()
            };
        }

        let seconds = elapsed_us as f32 / 1_000_000.0;
        let partial_frames = c
            .total_frames
            .saturating_sub(c.full_frames)
            .saturating_sub(c.skipped_frames);

        let total_fps = c.total_frames as f32 / seconds;
        let busy_percent = if c.real_time_us > 0 {
            c.busy_time_us as f32 / c.real_time_us as f32 * 100.0
        } else {
            0.0
        };

        FrameStats {
            total_fps,
            skipped_fps: c.skipped_frames as f32 / seconds,
            partial_fps: partial_frames as f32 / seconds,
            emulated_speed: total_fps / self.target_fps as f32,
            busy_percent,
            frame_time_avg_us: inner.frame_time.average(),
            last_tick_us: c.last_tick_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fps_from_counter_deltas() {
        let telemetry = Telemetry::new(32, 60);
        telemetry.reset(0);

        // 120 frames over two seconds, 10 of them skipped
        for i in 1..=120u64 {
            let skipped = i <= 10;
            telemetry.tick(i * 16_666, skipped, !skipped, 8_000);
        }

        let stats = telemetry.stats(2_000_000);
        assert_eq!(stats.total_fps, 60.0);
        assert_eq!(stats.skipped_fps, 5.0);
        assert_eq!(stats.partial_fps, 0.0);
        assert_eq!(stats.emulated_speed, 1.0);
    }

    #[test]
    fn test_busy_percent() {
        let telemetry = Telemetry::new(32, 60);
        telemetry.reset(0);

        // Each frame covers 16ms of wall time, 8ms of it emulating
        for i in 1..=100u64 {
            telemetry.tick(i * 16_000, false, true, 8_000);
        }

        let stats = telemetry.stats(1_600_000);
        assert!((stats.busy_percent - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_partial_frames() {
        let telemetry = Telemetry::new(32, 60);
        telemetry.reset(0);

        telemetry.tick(16_000, false, true, 0);
        telemetry.tick(32_000, true, false, 0);
        telemetry.tick(48_000, false, false, 0);

        let c = telemetry.counters();
        assert_eq!(c.total_frames, 3);
        assert_eq!(c.full_frames, 1);
        assert_eq!(c.skipped_frames, 1);

        let stats = telemetry.stats(1_000_000);
        assert_eq!(stats.partial_fps, 1.0);
    }

    #[test]
    fn test_reset_starts_a_new_session() {
        let telemetry = Telemetry::new(32, 60);
        telemetry.reset(0);
        for i in 1..=60u64 {
            telemetry.tick(i * 16_666, false, true, 4_000);
        }

        telemetry.reset(5_000_000);
        let c = telemetry.counters();
        assert_eq!(c.total_frames, 0);
        assert_eq!(c.busy_time_us, 0);
        assert_eq!(c.reset_time_us, 5_000_000);

        telemetry.tick(5_016_666, false, true, 4_000);
        assert_eq!(telemetry.counters().total_frames, 1);
    }

    #[test]
    fn test_frame_time_average_feeds_from_ticks() {
        let telemetry = Telemetry::new(8, 60);
        telemetry.reset(0);
        for i in 1..=20u64 {
            telemetry.tick(i * 10_000, false, true, 0);
        }
        let stats = telemetry.stats(200_000);
        assert!((stats.frame_time_avg_us - 10_000.0).abs() < 1.0);
    }

    #[test]
    fn test_stats_before_any_elapsed_time() {
        let telemetry = Telemetry::new(32, 60);
        telemetry.reset(1_000);
        let stats = telemetry.stats(1_000);
        assert_eq!(stats.total_fps, 0.0);
        assert_eq!(stats.busy_percent, 0.0);
    }

    #[test]
    fn test_concurrent_ticks_and_stats() {
        let telemetry = Arc::new(Telemetry::new(32, 60));
        telemetry.reset(0);

        let mut handles = Vec::new();
        for t in 0..4u64 {
            let telemetry = telemetry.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..250u64 {
                    telemetry.tick(t * 1_000_000 + i, false, true, 100);
                }
            }));
        }
        let reader = {
            let telemetry = telemetry.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let c = telemetry.counters();
                    // A snapshot is internally consistent
                    assert!(c.full_frames <= c.total_frames);
                    assert_eq!(c.busy_time_us, c.total_frames as u64 * 100);
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(telemetry.counters().total_frames, 1000);
        assert_eq!(telemetry.counters().busy_time_us, 100_000);
    }
}
