//! Processing loop
//!
//! One tick reads a frame, runs the chain over it under the chain lock, sends
//! the result to the sink and the preview, then lets the control panel apply
//! whatever the effects asked for. Ticks are paced at the capture's native
//! rate unless the last tick declared a frame-rate override.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::camera::{CaptureError, FrameSource};
use crate::control::{ControlPanel, ControlRequests};
use crate::effects::{PipelineExecutor, SharedChain, TickOutput};
use crate::output::{FrameSink, OutputError, PreviewSender};

/// Errors that end the processing loop
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Ticks further behind than this many frames are dropped
const MAX_FRAMES_BEHIND: u32 = 2;

/// Decides how long to wait between ticks
#[derive(Debug, Clone)]
pub struct FramePacer {
    frame_duration: Duration,
    next_frame_at: Instant,
}

impl FramePacer {
    pub fn new(native_fps: f64) -> Self {
        Self::starting_at(native_fps, Instant::now())
    }

    pub fn starting_at(native_fps: f64, start: Instant) -> Self {
        let fps = if native_fps.is_finite() && native_fps > 0.0 {
            native_fps
        } else {
            30.0
        };
        let frame_duration = Duration::from_secs_f64(1.0 / fps);
        Self {
            frame_duration,
            next_frame_at: start + frame_duration,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Delay before the next tick, measured at `now`
    ///
    /// Without an override ticks follow fixed deadlines; if the loop falls
    /// more than two frames behind, the schedule restarts from `now`. With an
    /// override the delay is simply one override period.
    pub fn next_delay(&mut self, now: Instant, frame_rate_override: Option<f64>) -> Duration {
        match frame_rate_override.filter(|fps| fps.is_finite() && *fps > 0.0) {
            Some(fps) => {
                let delay = Duration::from_secs_f64(1.0 / fps);
                self.next_frame_at = now + delay + self.frame_duration;
                delay
            }
            None => {
                let delay = self.next_frame_at.saturating_duration_since(now);
                let woke_at = now + delay;
                self.next_frame_at += self.frame_duration;
                if woke_at > self.next_frame_at + self.frame_duration * MAX_FRAMES_BEHIND {
                    self.next_frame_at = woke_at + self.frame_duration;
                }
                delay
            }
        }
    }

    /// Sleep until the next tick is due
    pub fn wait(&mut self, frame_rate_override: Option<f64>) {
        let delay = self.next_delay(Instant::now(), frame_rate_override);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// The capture → chain → output loop
pub struct Pipeline {
    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    preview: Option<PreviewSender>,
    chain: SharedChain,
    panel: Arc<Mutex<ControlPanel>>,
    executor: PipelineExecutor,
    requests: ControlRequests,
    pacer: FramePacer,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        chain: SharedChain,
        panel: Arc<Mutex<ControlPanel>>,
    ) -> Self {
        let pacer = FramePacer::new(source.frame_rate());
        Self {
            source,
            sink,
            preview: None,
            chain,
            panel,
            executor: PipelineExecutor::from_os_rng(),
            requests: ControlRequests::new(),
            pacer,
        }
    }

    pub fn with_preview(mut self, preview: PreviewSender) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Replace the executor (e.g. with a seeded one)
    pub fn with_executor(mut self, executor: PipelineExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Run one tick
    pub fn tick(&mut self) -> Result<TickOutput, PipelineError> {
        let frame = self.source.read()?;

        let output = {
            let mut chain = self.chain.lock();
            self.executor.run(&mut chain, frame, &mut self.requests)
        };
        for (id, err) in &output.failures {
            log::debug!("Effect {} failed this tick: {}", id, err);
        }

        self.sink.send(&output.frame)?;
        if let Some(preview) = &self.preview {
            preview.send(&output.frame);
        }

        let mut panel = self.panel.lock();
        panel.apply_requests(&mut self.requests);
        panel.reset_if_pending();

        Ok(output)
    }

    /// Tick until the control panel closes or capture fails
    pub fn run(&mut self) -> Result<(), PipelineError> {
        let open = self.panel.lock().open_flag();
        log::info!(
            "Pipeline running at {:.1} fps",
            1.0 / self.pacer.frame_duration().as_secs_f64()
        );

        while open.load(Ordering::Acquire) {
            match self.tick() {
                Ok(output) => self.pacer.wait(output.frame_rate_override),
                Err(err) => {
                    log::error!("Pipeline stopped: {err}");
                    self.panel.lock().close();
                    return Err(err);
                }
            }
        }

        log::info!("Pipeline stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SyntheticSource;
    use crate::effects::{EffectRegistry, PriorityChain};
    use crate::frame::{self, Frame};
    use crate::output::preview_channel;
    use crate::settings::PanelLayout;
    use serde_json::json;

    #[derive(Clone, Default)]
    struct CollectingSink {
        frames: Arc<Mutex<Vec<Frame>>>,
    }

    impl FrameSink for CollectingSink {
        fn send(&mut self, frame: &Frame) -> Result<(), OutputError> {
            self.frames.lock().push(frame.clone());
            Ok(())
        }
    }

    struct Harness {
        pipeline: Pipeline,
        sink: CollectingSink,
        panel: Arc<Mutex<ControlPanel>>,
        chain: SharedChain,
    }

    fn harness(buttons: serde_json::Value, source: SyntheticSource) -> Harness {
        let layout: PanelLayout = serde_json::from_value(json!({ "buttons": buttons })).unwrap();
        let chain = PriorityChain::shared();
        let panel = ControlPanel::from_layout(layout, Arc::new(EffectRegistry::with_builtin()), Arc::clone(&chain))
            .unwrap();
        let panel = Arc::new(Mutex::new(panel));
        let sink = CollectingSink::default();
        let pipeline = Pipeline::new(Box::new(source), Box::new(sink.clone()), Arc::clone(&chain), Arc::clone(&panel))
            .with_executor(PipelineExecutor::new(7));
        Harness {
            pipeline,
            sink,
            panel,
            chain,
        }
    }

    fn source() -> SyntheticSource {
        SyntheticSource::new(6, 4, 1000.0)
    }

    #[test]
    fn test_defaults_applied_after_first_tick() {
        let mut h = harness(json!([[{"filter": "MirrorX", "enabled": true}]]), source());
        let mut reference = source();

        let first = h.pipeline.tick().unwrap();
        assert_eq!(first.frame, reference.read().unwrap());
        assert_eq!(h.chain.lock().len(), 1);

        let second = h.pipeline.tick().unwrap();
        assert_eq!(second.frame, frame::mirrored(&reference.read().unwrap()));
        assert_eq!(h.sink.frames.lock().len(), 2);
    }

    #[test]
    fn test_requests_applied_after_pass() {
        let mut h = harness(
            json!([[{"filter": "MirrorX", "enabled": true}, {"filter": "DeactivateAll"}]]),
            source(),
        );
        let mut reference = source();
        h.pipeline.tick().unwrap();
        reference.read().unwrap();

        h.panel.lock().activate(1).unwrap();
        let output = h.pipeline.tick().unwrap();
        // The pass itself still ran MirrorX: DeactivateAll yields no frame
        assert_eq!(output.frame, frame::mirrored(&reference.read().unwrap()));
        assert!(h.chain.lock().is_empty());
        assert!(h.panel.lock().toggles().iter().all(|t| !t.is_enabled()));
    }

    #[test]
    fn test_reload_resets_same_tick() {
        let mut h = harness(
            json!([[{"filter": "Negative", "enabled": true}, {"filter": "ReloadGUI"}, {"filter": "Blur"}]]),
            source(),
        );
        h.pipeline.tick().unwrap();
        {
            let mut panel = h.panel.lock();
            panel.activate(1).unwrap();
            panel.activate(2).unwrap();
        }

        h.pipeline.tick().unwrap();
        let enabled: Vec<bool> = h.panel.lock().toggles().iter().map(|t| t.is_enabled()).collect();
        assert_eq!(enabled, vec![true, false, false]);
        assert_eq!(h.chain.lock().len(), 1);
    }

    #[test]
    fn test_frame_rate_override_reported() {
        let mut h = harness(json!([[{"filter": "FPS", "enabled": true}]]), source());
        assert_eq!(h.pipeline.tick().unwrap().frame_rate_override, None);
        assert_eq!(h.pipeline.tick().unwrap().frame_rate_override, Some(3.0));
    }

    #[test]
    fn test_preview_gets_copy() {
        let (tx, rx) = preview_channel(true);
        let mut h = harness(json!([]), source());
        h.pipeline = h.pipeline.with_preview(tx);
        let output = h.pipeline.tick().unwrap();
        assert_eq!(rx.try_latest(), Some(frame::mirrored(&output.frame)));
    }

    #[test]
    fn test_run_ends_on_capture_failure() {
        let mut h = harness(json!([]), source().with_frame_limit(3));
        let result = h.pipeline.run();
        assert!(matches!(result, Err(PipelineError::Capture(_))));
        assert_eq!(h.sink.frames.lock().len(), 3);
        assert!(!h.panel.lock().is_open());
    }

    #[test]
    fn test_run_stops_when_closed() {
        let mut h = harness(json!([]), source());
        h.panel.lock().close();
        h.pipeline.run().unwrap();
        assert!(h.sink.frames.lock().is_empty());
    }

    /// A source that must stay on the thread that opened it
    struct ThreadBoundSource {
        inner: SyntheticSource,
        _not_send: std::rc::Rc<()>,
    }

    impl FrameSource for ThreadBoundSource {
        fn dimensions(&self) -> (u32, u32) {
            self.inner.dimensions()
        }

        fn frame_rate(&self) -> f64 {
            self.inner.frame_rate()
        }

        fn read(&mut self) -> Result<Frame, CaptureError> {
            self.inner.read()
        }
    }

    #[test]
    fn test_thread_bound_source() {
        let h = harness(json!([]), source());
        let bound = ThreadBoundSource {
            inner: source(),
            _not_send: std::rc::Rc::new(()),
        };
        let mut pipeline = Pipeline::new(Box::new(bound), Box::new(h.sink.clone()), h.chain, h.panel);
        assert_eq!(pipeline.tick().unwrap().frame, source().read().unwrap());
        assert_eq!(h.sink.frames.lock().len(), 1);
    }

    #[test]
    fn test_pacer_follows_deadlines() {
        let start = Instant::now();
        let ms = Duration::from_millis;
        let mut pacer = FramePacer::starting_at(10.0, start);

        assert_eq!(pacer.next_delay(start, None), ms(100));
        assert_eq!(pacer.next_delay(start + ms(150), None), ms(50));
        // Late ticks get no delay but keep the schedule
        assert_eq!(pacer.next_delay(start + ms(320), None), Duration::ZERO);
        assert_eq!(pacer.next_delay(start + ms(330), None), ms(70));
    }

    #[test]
    fn test_pacer_resets_when_far_behind() {
        let start = Instant::now();
        let ms = Duration::from_millis;
        let mut pacer = FramePacer::starting_at(10.0, start);

        assert_eq!(pacer.next_delay(start + ms(1000), None), Duration::ZERO);
        assert_eq!(pacer.next_delay(start + ms(1000), None), ms(100));
    }

    #[test]
    fn test_pacer_override() {
        let start = Instant::now();
        let mut pacer = FramePacer::starting_at(30.0, start);
        assert_eq!(pacer.next_delay(start, Some(4.0)), Duration::from_millis(250));
        // A non-positive override falls back to the native schedule
        let resumed = start + Duration::from_millis(250);
        assert_eq!(pacer.next_delay(resumed, Some(0.0)), pacer.frame_duration());
    }
}
