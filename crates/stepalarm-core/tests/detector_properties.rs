//! Property tests for the detectors and the progress counter.

use proptest::prelude::*;
use stepalarm_core::detect::{
    fuse, BlinkDetector, BlinkDetectorConfig, CounterAccumulator, MotionDetector,
    MotionDetectorConfig,
};
use stepalarm_core::ProgressTracker;

/// Strictly increasing timestamps with irregular gaps.
fn timed(values: impl Strategy<Value = f64>, len: usize) -> impl Strategy<Value = Vec<(u64, f64)>> {
    prop::collection::vec((1u64..400, values), 0..len).prop_map(|steps| {
        let mut t = 0;
        steps
            .into_iter()
            .map(|(gap, v)| {
                t += gap;
                (t, v)
            })
            .collect()
    })
}

// ─── Motion: accepted steps respect the debounce interval ──────────────

proptest! {
    #[test]
    fn motion_events_are_spaced_by_min_interval(samples in timed(-5.0f64..40.0, 300)) {
        let config = MotionDetectorConfig::default();
        let min_interval = config.min_interval_ms;
        let mut detector = MotionDetector::new(config);

        let mut last: Option<u64> = None;
        for (t, m) in samples {
            if detector.process(t, m) {
                if let Some(prev) = last {
                    prop_assert!(t - prev > min_interval, "steps at {} and {}", prev, t);
                }
                last = Some(t);
            }
            prop_assert!(detector.window().len() <= 10);
        }
    }

    #[test]
    fn motion_below_threshold_never_fires(samples in timed(0.0f64..12.0, 300)) {
        let mut detector = MotionDetector::default();
        for (t, m) in samples {
            prop_assert!(!detector.process(t, m));
        }
    }
}

// ─── Blink: no dark dip, no blink ──────────────────────────────────────

proptest! {
    #[test]
    fn blink_needs_a_dark_frame(samples in timed(80.0f64..=255.0, 500)) {
        let mut detector = BlinkDetector::new(BlinkDetectorConfig::default());
        for (t, luma) in samples {
            prop_assert!(!detector.process(t, luma));
            prop_assert!(detector.window().len() <= 15);
        }
    }

    #[test]
    fn blink_events_are_spaced_by_min_interval(samples in timed(0.0f64..=255.0, 500)) {
        let mut detector = BlinkDetector::default();
        let mut last: Option<u64> = None;
        for (t, luma) in samples {
            if detector.process(t, luma) {
                if let Some(prev) = last {
                    prop_assert!(t - prev > 100);
                }
                last = Some(t);
            }
        }
    }
}

// ─── Progress and fusion ───────────────────────────────────────────────

proptest! {
    #[test]
    fn progress_is_monotonic(goal in 1u32..100, units in 0usize..200) {
        let mut tracker = ProgressTracker::new(goal).unwrap();
        let mut previous = 0;
        for _ in 0..units {
            let count = tracker.record_unit();
            prop_assert_eq!(count, previous + 1);
            previous = count;
        }
        prop_assert_eq!(tracker.is_goal_reached(), units as u32 >= goal);
    }

    #[test]
    fn counter_delta_never_shrinks(values in prop::collection::vec(0.0f64..10_000.0, 1..100)) {
        let mut counter = CounterAccumulator::default();
        let mut previous = 0;
        for v in values {
            let delta = counter.observe(v);
            prop_assert!(delta >= previous);
            previous = delta;
        }
    }

    #[test]
    fn fuse_is_the_larger_count(a in any::<u32>(), b in any::<u32>()) {
        let fused = fuse(a, b);
        prop_assert!(fused >= a && fused >= b);
        prop_assert!(fused == a || fused == b);
    }
}
