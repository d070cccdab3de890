//! Video decoder using FFmpeg
//!
//! Decodes video files to packed RGB24 frames using the ffmpeg-next crate.

use std::path::Path;

use super::{FrameStream, VideoError};
use crate::frame::{Frame, BYTES_PER_PIXEL};

impl From<ffmpeg_next::Error> for VideoError {
    fn from(e: ffmpeg_next::Error) -> Self {
        VideoError::DecodeFailed(e.to_string())
    }
}

/// Video decoder that reads frames from a video file
pub struct VideoDecoder {
    /// The input format context
    input: ffmpeg_next::format::context::Input,
    /// Index of the video stream
    video_stream_index: usize,
    /// Video decoder
    decoder: ffmpeg_next::decoder::Video,
    /// Scaler for converting to RGB24
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    /// Whether we've reached end of file
    eof: bool,
}

impl VideoDecoder {
    /// Open a video file for decoding
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VideoError> {
        // Initialize FFmpeg (safe to call multiple times)
        ffmpeg_next::init()?;

        let path = path.as_ref();
        let input = ffmpeg_next::format::input(&path)
            .map_err(|e| VideoError::OpenFailed(format!("{}: {}", path.display(), e)))?;

        let video_stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(VideoError::NoVideoStream)?;
        let video_stream_index = video_stream.index();

        let rate = video_stream.avg_frame_rate();
        let frame_rate = if rate.denominator() > 0 && rate.numerator() > 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            30.0
        };

        let context = ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| VideoError::DecoderCreationFailed(e.to_string()))?;

        let width = decoder.width();
        let height = decoder.height();

        log::info!(
            "Opened video {}: {}x{} @ {:.2}fps",
            path.display(),
            width,
            height,
            frame_rate
        );

        let scaler = Self::scaler_for(decoder.format(), width, height)?;

        Ok(Self {
            input,
            video_stream_index,
            decoder,
            scaler,
            width,
            height,
            eof: false,
        })
    }

    fn scaler_for(
        format: ffmpeg_next::format::Pixel,
        width: u32,
        height: u32,
    ) -> Result<ffmpeg_next::software::scaling::Context, VideoError> {
        ffmpeg_next::software::scaling::Context::get(
            format,
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| VideoError::ScalerCreationFailed(e.to_string()))
    }

    /// Decode the next frame, returning None at end of file
    pub fn decode_next_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        if self.eof {
            return Ok(None);
        }

        let mut decoded = ffmpeg_next::frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return self.convert(&decoded).map(Some),
                Err(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::error::EAGAIN,
                }) => {
                    // Need more input
                }
                Err(ffmpeg_next::Error::Eof) => {
                    self.eof = true;
                    return Ok(None);
                }
                Err(e) => return Err(VideoError::DecodeFailed(e.to_string())),
            }

            loop {
                match self.input.packets().next() {
                    Some((stream, packet)) => {
                        if stream.index() == self.video_stream_index {
                            self.decoder.send_packet(&packet)?;
                            break;
                        }
                    }
                    None => {
                        self.decoder.send_eof()?;
                        break;
                    }
                }
            }
        }
    }

    fn convert(&mut self, decoded: &ffmpeg_next::frame::Video) -> Result<Frame, VideoError> {
        // Recreate scaler if format changed mid-stream
        if decoded.format() != self.scaler.input().format {
            self.scaler = Self::scaler_for(decoded.format(), self.width, self.height)?;
        }

        let mut rgb = ffmpeg_next::frame::Video::empty();
        self.scaler.run(decoded, &mut rgb)?;

        let data = rgb.data(0);
        let stride = rgb.stride(0);
        let row = self.width as usize * BYTES_PER_PIXEL;

        let mut packed = Vec::with_capacity(row * self.height as usize);
        for y in 0..self.height as usize {
            let start = y * stride;
            packed.extend_from_slice(&data[start..start + row]);
        }

        Frame::from_raw(self.width, self.height, packed)
            .ok_or_else(|| VideoError::DecodeFailed("short frame buffer".to_string()))
    }
}

// SAFETY: the FFmpeg contexts are owned exclusively by this decoder and are
// only touched through `&mut self`, so moving the whole decoder to another
// thread never shares them.
unsafe impl Send for VideoDecoder {}

impl FrameStream for VideoDecoder {
    fn next_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        self.decode_next_frame()
    }
}
