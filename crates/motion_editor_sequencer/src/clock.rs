// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline clock driving playback.
//!
//! The clock owns the playhead. While playing, every animation frame advances
//! the playhead by the wall-clock delta since the previous frame and wraps it
//! into `[0, duration)`. Frames are requested through a [`FrameScheduler`],
//! which stands in for the host's animation-frame callback.

/// Handle for a pending animation-frame request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Host hook for animation-frame callbacks
pub trait FrameScheduler: Send {
    /// Ask the host to call back on the next frame
    fn request_frame(&mut self) -> FrameRequest;

    /// Withdraw a pending request
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Scheduler that only records requests; the host calls `tick` itself
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: u64,
    pending: Option<FrameRequest>,
    cancelled: u64,
}

impl ManualScheduler {
    /// Create a scheduler with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// The outstanding request, if any
    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    /// Number of requests cancelled so far
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next += 1;
        let request = FrameRequest(self.next);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Playhead holds still
    #[default]
    Paused,
    /// Playhead advances every frame
    Playing,
}

/// Looping playhead clock
pub struct TimelineClock {
    playhead: f64,
    state: PlaybackState,
    duration: f64,
    frame_rate: f64,
    last_tick: Option<f64>,
    pending_frame: Option<FrameRequest>,
    scheduler: Box<dyn FrameScheduler>,
}

impl TimelineClock {
    /// Create a paused clock at time zero
    pub fn new(duration: f64, frame_rate: f64, scheduler: Box<dyn FrameScheduler>) -> Self {
        Self {
            playhead: 0.0,
            state: PlaybackState::Paused,
            duration: positive_or(duration, 10.0),
            frame_rate: positive_or(frame_rate, 30.0),
            last_tick: None,
            pending_frame: None,
            scheduler,
        }
    }

    /// Current playhead time in seconds
    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    /// Playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Check if the playhead is held
    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    /// Loop span in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Change the loop span. Non-positive or non-finite values are ignored.
    pub fn set_duration(&mut self, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.duration = duration;
            self.playhead = self.wrap(self.playhead);
        }
    }

    /// Check if an animation frame is outstanding
    pub fn has_pending_frame(&self) -> bool {
        self.pending_frame.is_some()
    }

    /// Start advancing from `now` (host timestamp in seconds).
    ///
    /// The previous-frame timestamp is reset to `now`, so time spent paused is
    /// not replayed. Returns false if already playing.
    pub fn play(&mut self, now: f64) -> bool {
        if self.state == PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Playing;
        self.last_tick = Some(now);
        self.schedule();
        tracing::debug!(playhead = self.playhead, "Timeline playing");
        true
    }

    /// Hold the playhead and cancel the pending frame. Returns false if already paused.
    pub fn pause(&mut self) -> bool {
        if self.state == PlaybackState::Paused {
            return false;
        }
        self.state = PlaybackState::Paused;
        self.cancel_pending();
        tracing::debug!(playhead = self.playhead, "Timeline paused");
        true
    }

    /// Toggle play/pause
    pub fn toggle(&mut self, now: f64) {
        match self.state {
            PlaybackState::Playing => {
                self.pause();
            }
            PlaybackState::Paused => {
                self.play(now);
            }
        }
    }

    /// Pause and rewind to the start. Returns the new playhead.
    pub fn stop(&mut self) -> f64 {
        self.pause();
        self.playhead = 0.0;
        self.playhead
    }

    /// Handle an animation frame at host time `now`.
    ///
    /// Returns the new playhead to publish, or `None` while paused.
    pub fn tick(&mut self, now: f64) -> Option<f64> {
        self.pending_frame = None;
        if self.state == PlaybackState::Paused {
            return None;
        }

        let delta = self
            .last_tick
            .map(|last| now - last)
            .filter(|delta| delta.is_finite())
            .unwrap_or(0.0)
            .max(0.0);
        self.last_tick = Some(now);
        self.playhead = self.wrap(self.playhead + delta);
        self.schedule();

        tracing::trace!(playhead = self.playhead, delta, "Timeline tick");
        Some(self.playhead)
    }

    /// Move the playhead directly. Returns the new playhead to publish.
    pub fn scrub(&mut self, time: f64) -> f64 {
        let time = if time.is_finite() { time } else { 0.0 };
        self.playhead = time.clamp(0.0, self.duration);
        self.playhead
    }

    /// Cancel any pending frame and stop playing
    pub fn shutdown(&mut self) {
        self.cancel_pending();
        self.state = PlaybackState::Paused;
        self.last_tick = None;
    }

    /// Convert time to frame number
    pub fn time_to_frame(&self, time: f64) -> u64 {
        (time.max(0.0) * self.frame_rate).floor() as u64
    }

    /// Convert frame number to time
    pub fn frame_to_time(&self, frame: u64) -> f64 {
        frame as f64 / self.frame_rate
    }

    /// Current frame number
    pub fn current_frame(&self) -> u64 {
        self.time_to_frame(self.playhead)
    }

    fn wrap(&self, time: f64) -> f64 {
        if !time.is_finite() {
            return 0.0;
        }
        time.rem_euclid(self.duration)
    }

    fn schedule(&mut self) {
        if self.pending_frame.is_none() {
            self.pending_frame = Some(self.scheduler.request_frame());
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(request) = self.pending_frame.take() {
            self.scheduler.cancel_frame(request);
        }
    }
}

impl std::fmt::Debug for TimelineClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineClock")
            .field("playhead", &self.playhead)
            .field("state", &self.state)
            .field("duration", &self.duration)
            .field("pending_frame", &self.pending_frame)
            .finish()
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Scheduler shared with the test so requests can be observed
    struct SharedScheduler(Arc<Mutex<ManualScheduler>>);

    impl FrameScheduler for SharedScheduler {
        fn request_frame(&mut self) -> FrameRequest {
            self.0.lock().request_frame()
        }

        fn cancel_frame(&mut self, request: FrameRequest) {
            self.0.lock().cancel_frame(request);
        }
    }

    fn clock(duration: f64) -> (TimelineClock, Arc<Mutex<ManualScheduler>>) {
        let scheduler = Arc::new(Mutex::new(ManualScheduler::new()));
        let clock = TimelineClock::new(
            duration,
            30.0,
            Box::new(SharedScheduler(scheduler.clone())),
        );
        (clock, scheduler)
    }

    #[test]
    fn test_tick_advances_while_playing() {
        let (mut clock, scheduler) = clock(10.0);
        assert_eq!(clock.tick(1.0), None);

        clock.play(100.0);
        assert!(scheduler.lock().pending().is_some());
        assert_eq!(clock.tick(100.5), Some(0.5));
        assert_eq!(clock.tick(101.5), Some(1.5));
        assert!(clock.has_pending_frame());
    }

    #[test]
    fn test_wraps_to_remainder() {
        let (mut clock, _) = clock(4.0);
        clock.scrub(3.5);
        clock.play(0.0);
        let time = clock.tick(1.0).unwrap_or_default();
        assert!((time - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_pause_cancels_and_resume_skips_gap() {
        let (mut clock, scheduler) = clock(10.0);
        clock.play(0.0);
        clock.tick(1.0);

        assert!(clock.pause());
        assert!(!clock.pause());
        assert!(scheduler.lock().pending().is_none());
        assert_eq!(scheduler.lock().cancelled(), 1);

        clock.play(50.0);
        assert_eq!(clock.tick(50.25), Some(1.25));
    }

    #[test]
    fn test_scrub_clamps_and_sanitizes() {
        let (mut clock, _) = clock(5.0);
        assert_eq!(clock.scrub(-2.0), 0.0);
        assert_eq!(clock.scrub(2.5), 2.5);
        assert_eq!(clock.scrub(99.0), 5.0);
        assert_eq!(clock.scrub(f64::NAN), 0.0);
    }

    #[test]
    fn test_backwards_timestamp_is_ignored() {
        let (mut clock, _) = clock(10.0);
        clock.play(10.0);
        assert_eq!(clock.tick(9.0), Some(0.0));
        assert_eq!(clock.tick(9.5), Some(0.5));
    }

    #[test]
    fn test_frame_conversion_and_stop() {
        let (mut clock, _) = clock(10.0);
        clock.scrub(2.0);
        assert_eq!(clock.current_frame(), 60);
        assert_eq!(clock.frame_to_time(15), 0.5);

        clock.play(0.0);
        assert_eq!(clock.stop(), 0.0);
        assert!(clock.is_paused());
    }

    #[test]
    fn test_invalid_duration_falls_back() {
        let (mut clock, _) = clock(f64::NAN);
        assert_eq!(clock.duration(), 10.0);
        clock.set_duration(-1.0);
        assert_eq!(clock.duration(), 10.0);
        clock.scrub(8.0);
        clock.set_duration(3.0);
        assert_eq!(clock.playhead(), 2.0);
    }
}
