use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Number of frame timestamps kept for the rolling average.
pub const FPS_WINDOW: usize = 60;

/// Callback receiving one whole-number FPS value per report.
pub type FpsCallback = Box<dyn FnMut(u32)>;

/// Rolling frame-rate measurement with periodic reporting.
///
/// Samples are only collected while a callback is installed with
/// [`FpsTracker::watch`].
pub struct FpsTracker {
    samples: VecDeque<f64>,
    last_report: f64,
    interval_ms: f64,
    callback: Option<FpsCallback>,
}

impl FpsTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(FPS_WINDOW + 1),
            last_report: 0.0,
            interval_ms: interval.as_secs_f64() * 1000.0,
            callback: None,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.callback.is_some()
    }

    /// Installs `callback` and restarts the sampling window.
    pub fn watch(&mut self, callback: FpsCallback, interval: Duration) {
        self.callback = Some(callback);
        self.interval_ms = interval.as_secs_f64() * 1000.0;
        self.samples.clear();
        self.last_report = 0.0;
    }

    /// Drops the callback; it is never invoked again.
    pub fn unwatch(&mut self) {
        self.callback = None;
        self.samples.clear();
    }

    /// Adds a frame timestamp (milliseconds) and reports when the interval has
    /// elapsed since the previous report. Returns the reported value.
    pub fn record(&mut self, time_ms: f64) -> Option<u32> {
        let callback = self.callback.as_mut()?;
        self.samples.push_back(time_ms);
        while self.samples.len() > FPS_WINDOW {
            self.samples.pop_front();
        }
        if time_ms - self.last_report < self.interval_ms {
            return None;
        }
        let fps = calculate(&self.samples);
        callback(fps);
        self.last_report = time_ms;
        Some(fps)
    }

    /// Frames per second over the current window; 0 when it cannot be known.
    pub fn calculate(&self) -> u32 {
        calculate(&self.samples)
    }

    pub fn samples(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

fn calculate(samples: &VecDeque<f64>) -> u32 {
    let (Some(first), Some(last)) = (samples.front(), samples.back()) else {
        return 0;
    };
    let span = last - first;
    if samples.len() < 2 || span <= 0.0 || !span.is_finite() {
        return 0;
    }
    let frames = (samples.len() - 1) as f64;
    (frames * 1000.0 / span).round() as u32
}

impl fmt::Debug for FpsTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FpsTracker")
            .field("samples", &self.samples.len())
            .field("last_report", &self.last_report)
            .field("interval_ms", &self.interval_ms)
            .field("watching", &self.is_watching())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn watching(interval_ms: u64) -> (FpsTracker, Rc<RefCell<Vec<u32>>>) {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reports);
        let mut tracker = FpsTracker::new(Duration::from_millis(500));
        tracker.watch(
            Box::new(move |fps| sink.borrow_mut().push(fps)),
            Duration::from_millis(interval_ms),
        );
        (tracker, reports)
    }

    #[test]
    fn sixty_fps_from_sixteen_ms_frames() {
        let (mut tracker, _) = watching(10_000);
        for time in [0.0, 16.0, 33.0, 50.0] {
            tracker.record(time);
        }
        assert_eq!(tracker.calculate(), 60);
    }

    #[test]
    fn degenerate_windows_report_zero() {
        let (mut tracker, _) = watching(10_000);
        assert_eq!(tracker.calculate(), 0);
        tracker.record(5.0);
        assert_eq!(tracker.calculate(), 0);
        tracker.record(5.0);
        tracker.record(5.0);
        assert_eq!(tracker.calculate(), 0);
    }

    #[test]
    fn window_evicts_oldest_first() {
        let (mut tracker, _) = watching(1_000_000);
        for frame in 0..61 {
            tracker.record(f64::from(frame) * 16.0);
        }
        assert_eq!(tracker.samples().len(), FPS_WINDOW);
        assert_eq!(tracker.samples().next(), Some(16.0));
    }

    #[test]
    fn reports_once_per_interval() {
        let (mut tracker, reports) = watching(500);
        let mut time = 0.0;
        while time <= 1_000.0 {
            tracker.record(time);
            time += 20.0;
        }
        assert_eq!(*reports.borrow(), vec![50, 50]);
    }

    #[test]
    fn unwatch_silences_callback() {
        let (mut tracker, reports) = watching(0);
        assert!(tracker.is_watching());
        tracker.unwatch();
        assert!(!tracker.is_watching());
        assert_eq!(tracker.record(1_000.0), None);
        assert!(reports.borrow().is_empty());
        assert_eq!(tracker.samples().len(), 0);
    }

    #[test]
    fn nothing_is_sampled_without_a_watcher() {
        let mut tracker = FpsTracker::new(Duration::from_millis(500));
        assert!(!tracker.is_watching());
        tracker.record(0.0);
        tracker.record(16.0);
        assert_eq!(tracker.samples().len(), 0);
        assert_eq!(tracker.calculate(), 0);
    }
}
