//! Looping video source
//!
//! The stream is opened on the first `apply` and sized to that first frame.
//! Frames are read sequentially; at end of stream the stream is dropped and
//! reopened from the start, so the clip loops without a visible gap.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::still::{fit, Backing};
use super::transform::positive_fps;
use crate::effects::traits::{Effect, EffectDefinition, Priority, TickContext};
use crate::effects::{EffectArgs, EffectError, EffectRegistry, ParameterDescriptor};
use crate::frame::Frame;
use crate::video::{self, FrameStream, VideoError};

/// Opens a stream for a video path
pub type StreamOpener = Arc<dyn Fn(&Path) -> Result<Box<dyn FrameStream>, VideoError> + Send + Sync>;

/// Video replacing the camera frame
pub struct VideoLoop {
    video_path: PathBuf,
    resize: bool,
    global_fps: Option<f64>,
    size: Option<(u32, u32)>,
    stream: Backing<Box<dyn FrameStream>>,
    opener: StreamOpener,
}

impl VideoLoop {
    pub fn new(video_path: impl Into<PathBuf>, resize: bool, global_fps: Option<f64>, opener: StreamOpener) -> Self {
        Self {
            video_path: video_path.into(),
            resize,
            global_fps,
            size: None,
            stream: Backing::Pending,
            opener,
        }
    }

    fn open(&mut self) -> Result<(), EffectError> {
        match (self.opener)(&self.video_path) {
            Ok(stream) => {
                self.stream = Backing::Ready(stream);
                Ok(())
            }
            Err(err) => {
                self.stream = Backing::Failed;
                let err = match err {
                    VideoError::Unsupported => {
                        EffectError::Unsupported("video support is not compiled in (build with --features video)")
                    }
                    other => EffectError::ResourceUnavailable {
                        path: self.video_path.clone(),
                        reason: other.to_string(),
                    },
                };
                log::warn!("Video: {err}");
                Err(err)
            }
        }
    }

    fn fail(&mut self, err: EffectError) -> Result<Option<Frame>, EffectError> {
        log::warn!("Video: {}: {}", self.video_path.display(), err);
        self.stream = Backing::Failed;
        Err(err)
    }
}

impl Effect for VideoLoop {
    fn effect_type(&self) -> &'static str {
        "Video"
    }

    fn priority(&self) -> Priority {
        Priority::Fast
    }

    fn frame_rate_override(&self) -> Option<f64> {
        self.global_fps
    }

    fn apply(&mut self, frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        let (width, height) = *self.size.get_or_insert_with(|| frame.dimensions());
        let mut reopened = false;

        loop {
            if let Backing::Pending = self.stream {
                self.open()?;
            }
            let Backing::Ready(stream) = &mut self.stream else {
                return Ok(None);
            };

            match stream.next_frame() {
                Ok(Some(next)) => return Ok(Some(fit(&next, width, height, self.resize))),
                Ok(None) if reopened => {
                    return self.fail(EffectError::Decode("stream yields no frames".to_string()));
                }
                Ok(None) => {
                    log::debug!("Video: {} looped", self.video_path.display());
                    self.stream = Backing::Pending;
                    reopened = true;
                }
                Err(err) => return self.fail(EffectError::Decode(err.to_string())),
            }
        }
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        if name == "global_fps" {
            self.global_fps
        } else {
            None
        }
    }
}

pub struct VideoDefinition {
    opener: StreamOpener,
}

impl VideoDefinition {
    /// Definition that opens streams with a custom opener
    pub fn with_opener(opener: StreamOpener) -> Self {
        Self { opener }
    }
}

impl Default for VideoDefinition {
    fn default() -> Self {
        Self::with_opener(Arc::new(video::open_stream))
    }
}

impl EffectDefinition for VideoDefinition {
    fn effect_type(&self) -> &'static str {
        "Video"
    }

    fn display_name(&self) -> &'static str {
        "Video"
    }

    fn category(&self) -> &'static str {
        "Source"
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::fps(35.0)]
    }

    fn create(&self, args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        let path = args.string("Video", 0, "video_path")?;
        let resize = args.bool_or("Video", 1, "resize", false)?;
        let global_fps = positive_fps(args, "Video", 2)?;
        Ok(Box::new(VideoLoop::new(path, resize, global_fps, Arc::clone(&self.opener))))
    }
}
