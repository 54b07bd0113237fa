/// Replay segment detection from raw playback-position samples.
///
/// The detector is a small state machine: position samples keep the last
/// known forward position current, and a seek signal compares the position
/// just before the jump with the position just after it. A backward jump
/// larger than the configured threshold is a replay segment.

/// A backward jump in playback position, bounded by the position immediately
/// after the seek (start) and immediately before it (end).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySegment {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl ReplaySegment {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Position-tracking state machine that turns seek signals into replay
/// segments. Enablement is controlled externally (tied to whether a logging
/// session is active) and can change at any time.
#[derive(Debug)]
pub struct SegmentDetector {
    enabled: bool,
    last_position: f64,
    min_jump_secs: f64,
}

impl SegmentDetector {
    pub fn new(min_jump_secs: f64) -> Self {
        Self {
            enabled: false,
            last_position: 0.0,
            min_jump_secs,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a position sample. Only forward (or flat) movement updates the
    /// last known position; a backward sample is the tail of a seek and is
    /// handled by `observe_seek`.
    pub fn observe_position(&mut self, position_secs: f64) {
        if position_secs >= self.last_position {
            self.last_position = position_secs;
        }
    }

    /// Record a seek to `new_position_secs`. Emits a replay segment when the
    /// jump is backward by more than the threshold and the detector is
    /// enabled. The last known position always resets to the new position so
    /// the next seek is measured from reality.
    pub fn observe_seek(&mut self, new_position_secs: f64) -> Option<ReplaySegment> {
        let before = self.last_position;
        self.last_position = new_position_secs;

        if !self.enabled {
            return None;
        }
        if before - new_position_secs > self.min_jump_secs {
            return Some(ReplaySegment {
                start_secs: new_position_secs,
                end_secs: before,
            });
        }
        None
    }

    /// The underlying media element was replaced (e.g. the page re-rendered
    /// it). Keeps the enabled flag, resets the last known position to the new
    /// element's current position so no spurious segment is emitted.
    pub fn reattach(&mut self, position_secs: f64) {
        self.last_position = position_secs;
    }
}

impl Default for SegmentDetector {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backward_seek_emits_segment() {
        let mut detector = SegmentDetector::default();
        detector.set_enabled(true);
        detector.observe_position(30.0);

        let segment = detector.observe_seek(20.0).expect("segment expected");
        assert_eq!(segment.start_secs, 20.0);
        assert_eq!(segment.end_secs, 30.0);
        assert!((segment.duration_secs() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_small_jump_is_not_a_replay() {
        let mut detector = SegmentDetector::default();
        detector.set_enabled(true);
        detector.observe_position(30.0);
        assert!(detector.observe_seek(29.5).is_none());
    }

    #[test]
    fn test_forward_seek_is_not_a_replay() {
        let mut detector = SegmentDetector::default();
        detector.set_enabled(true);
        detector.observe_position(30.0);
        assert!(detector.observe_seek(60.0).is_none());
        // Position tracking continues from the new location
        let segment = detector.observe_seek(50.0).expect("segment expected");
        assert_eq!(segment.end_secs, 60.0);
    }

    #[test]
    fn test_disabled_detector_emits_nothing() {
        let mut detector = SegmentDetector::default();
        detector.observe_position(30.0);
        assert!(detector.observe_seek(10.0).is_none());

        // Enabling afterwards does not retroactively emit, and the position
        // was still tracked while disabled.
        detector.set_enabled(true);
        assert!(detector.observe_seek(9.5).is_none());
    }

    #[test]
    fn test_backward_samples_do_not_move_position_back() {
        let mut detector = SegmentDetector::default();
        detector.set_enabled(true);
        detector.observe_position(30.0);
        detector.observe_position(12.0);
        let segment = detector.observe_seek(5.0).expect("segment expected");
        assert_eq!(segment.end_secs, 30.0);
    }

    #[test]
    fn test_reattach_preserves_enabled_and_resets_position() {
        let mut detector = SegmentDetector::default();
        detector.set_enabled(true);
        detector.observe_position(300.0);

        // Element replaced; new element starts at 5s. Without the reset a
        // seek right after would look like a 295s replay.
        detector.reattach(5.0);
        assert!(detector.is_enabled());
        assert!(detector.observe_seek(4.8).is_none());

        detector.observe_position(20.0);
        assert!(detector.observe_seek(10.0).is_some());
    }
}
