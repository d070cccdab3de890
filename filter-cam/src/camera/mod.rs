//! Capture sources
//!
//! A `FrameSource` is opened and read on the thread that runs the processing
//! loop, once per tick. Native cameras are provided by nokhwa behind the `camera` feature;
//! `SyntheticSource` generates a moving test pattern and needs no hardware.

use image::Rgb;

use crate::frame::Frame;
use crate::settings::{CameraId, CameraSettings};

/// Errors raised by capture sources
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Could not open video source: {0}")]
    OpenFailed(String),

    #[error("Error fetching frame: {0}")]
    SourceUnavailable(String),
}

/// Producer of camera frames
pub trait FrameSource {
    /// Frame size in pixels
    fn dimensions(&self) -> (u32, u32);

    /// Native frame rate reported by the device
    fn frame_rate(&self) -> f64;

    /// Block until the next frame is available
    fn read(&mut self) -> Result<Frame, CaptureError>;
}

/// Open the source named in the camera settings
pub fn open_source(settings: &CameraSettings) -> Result<Box<dyn FrameSource>, CaptureError> {
    match settings.camera_id {
        CameraId::Synthetic => Ok(Box::new(SyntheticSource::new(
            settings.width,
            settings.height,
            settings.frame_rate,
        ))),
        CameraId::Index(index) => open_camera(index, settings),
    }
}

#[cfg(feature = "camera")]
fn open_camera(index: u32, settings: &CameraSettings) -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(CameraSource::open(index, settings.width, settings.height)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(index: u32, _settings: &CameraSettings) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::OpenFailed(format!(
        "camera {index}: native capture is not compiled in (build with --features camera, or use \"synthetic\")"
    )))
}

#[cfg(feature = "camera")]
pub use native::CameraSource;

#[cfg(feature = "camera")]
mod native {
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
    use nokhwa::Camera;

    use super::{CaptureError, FrameSource};
    use crate::frame::Frame;

    /// Native webcam
    pub struct CameraSource {
        camera: Camera,
        width: u32,
        height: u32,
        frame_rate: f64,
    }

    impl CameraSource {
        /// Open camera `index`, preferring the requested resolution
        pub fn open(index: u32, width: u32, height: u32) -> Result<Self, CaptureError> {
            let camera_index = CameraIndex::Index(index);
            let attempts = [
                RequestedFormatType::HighestResolution(Resolution::new(width, height)),
                RequestedFormatType::AbsoluteHighestResolution,
                RequestedFormatType::None,
            ];

            let mut last_err = None;
            let mut camera = None;
            for requested in attempts {
                let label = format!("{requested:?}");
                match Camera::new(camera_index.clone(), RequestedFormat::new::<RgbFormat>(requested)) {
                    Ok(c) => {
                        camera = Some(c);
                        break;
                    }
                    Err(e) => {
                        log::warn!("Camera {} rejected {}: {:?}", index, label, e);
                        last_err = Some(e);
                    }
                }
            }
            let mut camera = camera.ok_or_else(|| {
                CaptureError::OpenFailed(format!("camera {index}: {:?}", last_err))
            })?;

            camera
                .open_stream()
                .map_err(|e| CaptureError::OpenFailed(format!("camera {index}: {e}")))?;

            let resolution = camera.resolution();
            let frame_rate = camera.frame_rate() as f64;
            log::info!(
                "Camera opened: {} ({}x{} @ {} fps)",
                camera.info().human_name(),
                resolution.width(),
                resolution.height(),
                frame_rate
            );

            Ok(Self {
                camera,
                width: resolution.width(),
                height: resolution.height(),
                frame_rate,
            })
        }
    }

    impl FrameSource for CameraSource {
        fn dimensions(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn frame_rate(&self) -> f64 {
            self.frame_rate
        }

        fn read(&mut self) -> Result<Frame, CaptureError> {
            let buffer = self
                .camera
                .frame()
                .map_err(|e| CaptureError::SourceUnavailable(e.to_string()))?;
            let image = buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| CaptureError::SourceUnavailable(e.to_string()))?;
            let (width, height) = (image.width(), image.height());
            Frame::from_raw(width, height, image.into_raw())
                .ok_or_else(|| CaptureError::SourceUnavailable("short frame buffer".to_string()))
        }
    }

    impl Drop for CameraSource {
        fn drop(&mut self) {
            if let Err(e) = self.camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {e}");
            }
        }
    }
}

/// Moving gradient test pattern
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_rate: f64,
    frame_number: u64,
    limit: Option<u64>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, frame_rate: f64) -> Self {
        log::info!("Synthetic source: {}x{} @ {} fps", width, height, frame_rate);
        Self {
            width: width.max(1),
            height: height.max(1),
            frame_rate: if frame_rate > 0.0 { frame_rate } else { 30.0 },
            frame_number: 0,
            limit: None,
        }
    }

    /// Report the source as unavailable after `frames` reads
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }
}

impl FrameSource for SyntheticSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        if self.limit.is_some_and(|limit| self.frame_number >= limit) {
            return Err(CaptureError::SourceUnavailable("synthetic source exhausted".to_string()));
        }
        let shift = self.frame_number;
        self.frame_number += 1;

        let (w, h) = (self.width as u64, self.height as u64);
        Ok(Frame::from_fn(self.width, self.height, |x, y| {
            let x = (x as u64 + shift) % w;
            Rgb([
                (x * 255 / w.max(2).saturating_sub(1)) as u8,
                (y as u64 * 255 / h.max(2).saturating_sub(1)) as u8,
                (shift % 256) as u8,
            ])
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_pattern_moves() {
        let mut source = SyntheticSource::new(16, 4, 25.0);
        assert_eq!(source.dimensions(), (16, 4));
        assert_eq!(source.frame_rate(), 25.0);

        let first = source.read().unwrap();
        let second = source.read().unwrap();
        assert_eq!(first.dimensions(), (16, 4));
        assert_ne!(first, second);
        assert_eq!(first.get_pixel(1, 0)[0], second.get_pixel(0, 0)[0]);
    }

    #[test]
    fn test_synthetic_limit() {
        let mut source = SyntheticSource::new(2, 2, 0.0).with_frame_limit(1);
        assert_eq!(source.frame_rate(), 30.0);
        assert!(source.read().is_ok());
        let err = source.read().unwrap_err();
        assert!(err.to_string().starts_with("Error fetching frame"));
    }

    #[test]
    fn test_open_synthetic_from_settings() {
        let settings = CameraSettings {
            camera_id: CameraId::Synthetic,
            width: 8,
            height: 6,
            ..CameraSettings::default()
        };
        let mut source = open_source(&settings).unwrap();
        assert_eq!(source.read().unwrap().dimensions(), (8, 6));
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_native_camera_needs_feature() {
        let result = open_source(&CameraSettings::default());
        assert!(matches!(result, Err(CaptureError::OpenFailed(_))));
    }
}
