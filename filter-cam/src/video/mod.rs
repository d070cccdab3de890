//! Video file decoding
//!
//! Looping video effects read frames through the [`FrameStream`] trait. With
//! the `video` feature enabled, streams are decoded with FFmpeg via the
//! `ffmpeg-next` crate; without it, opening a stream reports
//! [`VideoError::Unsupported`].

#[cfg(feature = "video")]
mod decoder;

use std::path::Path;

use crate::frame::Frame;

#[cfg(feature = "video")]
pub use decoder::VideoDecoder;

/// Errors that can occur while opening or decoding a video
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    /// Failed to open the video file
    #[error("failed to open video file: {0}")]
    OpenFailed(String),
    /// No video stream found in the file
    #[error("no video stream found in file")]
    NoVideoStream,
    /// Failed to create decoder
    #[error("failed to create decoder: {0}")]
    DecoderCreationFailed(String),
    /// Failed to create scaler
    #[error("failed to create scaler: {0}")]
    ScalerCreationFailed(String),
    /// Decoding error
    #[error("decoding failed: {0}")]
    DecodeFailed(String),
    /// Built without the `video` feature
    #[error("video support is not compiled in (build with --features video)")]
    Unsupported,
}

/// A sequential source of decoded frames
pub trait FrameStream: Send {
    /// Next frame in presentation order, `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<Frame>, VideoError>;
}

/// Open a video file for sequential decoding
#[cfg(feature = "video")]
pub fn open_stream(path: &Path) -> Result<Box<dyn FrameStream>, VideoError> {
    Ok(Box::new(VideoDecoder::open(path)?))
}

/// Open a video file for sequential decoding
#[cfg(not(feature = "video"))]
pub fn open_stream(_path: &Path) -> Result<Box<dyn FrameStream>, VideoError> {
    Err(VideoError::Unsupported)
}
