//! Refresh-paced frame clock.
//!
//! The host owns the event loop and calls [`FrameScheduler::poll`] once per
//! display refresh. The clock answers whether a frame is due and, if so, the
//! playback time in milliseconds to render it at. Nothing here spawns threads
//! or sleeps; a frame that is being rendered is never interrupted, and
//! [`FrameScheduler::stop`] simply makes the next `poll` return `None`.

use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("frame clock has been shut down")]
    ShutDown,
    #[error("cannot {action} a {from} frame clock")]
    InvalidTransition {
        from: ClockState,
        action: &'static str,
    },
}

/// Lifecycle of a [`FrameClock`].
///
/// `Stopped --start--> Running --pause--> Paused --resume--> Running`, `stop`
/// returns to `Stopped` from anywhere, and `shutdown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
    Paused,
    Shutdown,
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockState::Stopped => f.write_str("stopped"),
            ClockState::Running => f.write_str("running"),
            ClockState::Paused => f.write_str("paused"),
            ClockState::Shutdown => f.write_str("shut down"),
        }
    }
}

/// Options forwarded from the renderer's construction bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockOptions {
    /// Upper bound on delivered frames per second. `None`, zero and negative
    /// values mean one frame per poll.
    pub target_fps: Option<f32>,
}

impl ClockOptions {
    pub fn with_target_fps(target_fps: Option<f32>) -> Self {
        Self { target_fps }
    }

    fn frame_interval(&self) -> Option<Duration> {
        normalize_fps(self.target_fps).map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)))
    }
}

fn normalize_fps(value: Option<f32>) -> Option<f32> {
    value.and_then(|fps| if fps.is_finite() && fps > 0.0 { Some(fps) } else { None })
}

/// Tick source driving a renderer.
pub trait FrameScheduler {
    /// Begins a fresh timeline at `now`. Starting a running clock is a no-op
    /// and starting a paused one resumes it.
    fn start(&mut self, now: Instant) -> Result<(), SchedulerError>;
    /// Stops delivering frames and forgets the timeline.
    fn stop(&mut self);
    /// Freezes playback time at `now`.
    fn pause(&mut self, now: Instant) -> Result<(), SchedulerError>;
    /// Continues playback time from where `pause` froze it.
    fn resume(&mut self, now: Instant) -> Result<(), SchedulerError>;
    /// Stops for good; every later transition fails.
    fn shutdown(&mut self);
    fn state(&self) -> ClockState;
    /// Returns the playback time in milliseconds when a frame is due at `now`.
    /// Paused spans do not count towards playback time.
    fn poll(&mut self, now: Instant) -> Option<f64>;
    /// Earliest instant a capped clock will deliver its next frame. `None`
    /// when the clock is not running or delivers on every poll.
    fn next_deadline(&self) -> Option<Instant>;
}

/// Default [`FrameScheduler`] backed by `Instant` arithmetic.
#[derive(Debug, Clone)]
pub struct FrameClock {
    options: ClockOptions,
    state: ClockState,
    origin: Option<Instant>,
    banked: Duration,
    last_frame: Option<Instant>,
    frames: u64,
}

impl FrameClock {
    pub fn new(options: ClockOptions) -> Self {
        Self {
            options,
            state: ClockState::Stopped,
            origin: None,
            banked: Duration::ZERO,
            last_frame: None,
            frames: 0,
        }
    }

    /// Frames delivered since the last `start`.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn options(&self) -> &ClockOptions {
        &self.options
    }

    fn playback_time(&self, now: Instant) -> Duration {
        let live = self
            .origin
            .map(|origin| now.saturating_duration_since(origin))
            .unwrap_or_default();
        self.banked + live
    }

    fn reset_timeline(&mut self) {
        self.origin = None;
        self.banked = Duration::ZERO;
        self.last_frame = None;
        self.frames = 0;
    }

    fn invalid(&self, action: &'static str) -> SchedulerError {
        SchedulerError::InvalidTransition {
            from: self.state,
            action,
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(ClockOptions::default())
    }
}

impl FrameScheduler for FrameClock {
    fn start(&mut self, now: Instant) -> Result<(), SchedulerError> {
        match self.state {
            ClockState::Shutdown => Err(SchedulerError::ShutDown),
            ClockState::Running => Ok(()),
            ClockState::Paused => self.resume(now),
            ClockState::Stopped => {
                self.reset_timeline();
                self.origin = Some(now);
                self.state = ClockState::Running;
                tracing::debug!(
                    target_fps = ?normalize_fps(self.options.target_fps),
                    "frame clock started"
                );
                Ok(())
            }
        }
    }

    fn stop(&mut self) {
        if matches!(self.state, ClockState::Running | ClockState::Paused) {
            tracing::debug!(frames = self.frames, "frame clock stopped");
            self.reset_timeline();
            self.state = ClockState::Stopped;
        }
    }

    fn pause(&mut self, now: Instant) -> Result<(), SchedulerError> {
        match self.state {
            ClockState::Shutdown => Err(SchedulerError::ShutDown),
            ClockState::Stopped => Err(self.invalid("pause")),
            ClockState::Paused => Ok(()),
            ClockState::Running => {
                self.banked = self.playback_time(now);
                self.origin = None;
                self.state = ClockState::Paused;
                Ok(())
            }
        }
    }

    fn resume(&mut self, now: Instant) -> Result<(), SchedulerError> {
        match self.state {
            ClockState::Shutdown => Err(SchedulerError::ShutDown),
            ClockState::Stopped => Err(self.invalid("resume")),
            ClockState::Running => Ok(()),
            ClockState::Paused => {
                self.origin = Some(now);
                self.last_frame = None;
                self.state = ClockState::Running;
                Ok(())
            }
        }
    }

    fn shutdown(&mut self) {
        if self.state != ClockState::Shutdown {
            self.reset_timeline();
            self.state = ClockState::Shutdown;
            tracing::debug!("frame clock shut down");
        }
    }

    fn state(&self) -> ClockState {
        self.state
    }

    fn poll(&mut self, now: Instant) -> Option<f64> {
        if self.state != ClockState::Running {
            return None;
        }
        if let (Some(interval), Some(last)) = (self.options.frame_interval(), self.last_frame) {
            if now.saturating_duration_since(last) < interval {
                return None;
            }
        }
        self.last_frame = Some(now);
        self.frames = self.frames.saturating_add(1);
        Some(self.playback_time(now).as_nanos() as f64 / 1_000_000.0)
    }

    fn next_deadline(&self) -> Option<Instant> {
        if self.state != ClockState::Running {
            return None;
        }
        let interval = self.options.frame_interval()?;
        self.last_frame.map(|last| last + interval)
    }
}
