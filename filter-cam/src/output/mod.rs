//! Output collaborators
//!
//! Processed frames leave the pipeline two ways:
//! - a `FrameSink` (the virtual camera device, or nothing)
//! - a preview channel carrying a copy for whoever displays it
//!
//! The preview channel holds one frame. The processing loop never blocks on
//! it: a frame the consumer has not picked up yet is replaced by the newer one.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::frame::{self, Frame};

/// `EBUSY`: another process holds the device
const EBUSY: i32 = 16;

/// Errors raised by frame sinks
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error(
        "Virtual camera {} is in use, you need to close any apps that can write into it and restart the program.",
        path.display()
    )]
    SinkBusy { path: PathBuf },

    #[error("Could not open output device {}: {source}", path.display())]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error writing frame: {0}")]
    Write(#[source] io::Error),
}

/// Consumer of processed frames
pub trait FrameSink: Send {
    fn send(&mut self, frame: &Frame) -> Result<(), OutputError>;
}

/// Sink that discards every frame
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn send(&mut self, _frame: &Frame) -> Result<(), OutputError> {
        Ok(())
    }
}

fn is_busy(err: &io::Error) -> bool {
    err.raw_os_error() == Some(EBUSY)
}

/// Writes raw RGB24 frames to a loopback video device node
///
/// The device has a fixed format, so frames are stretched to the size given
/// at open.
pub struct DeviceSink<W: Write + Send = File> {
    path: PathBuf,
    writer: W,
    width: u32,
    height: u32,
}

impl DeviceSink<File> {
    pub fn open(path: impl AsRef<Path>, width: u32, height: u32) -> Result<Self, OutputError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().write(true).open(&path).map_err(|source| {
            if is_busy(&source) {
                OutputError::SinkBusy { path: path.clone() }
            } else {
                OutputError::SinkUnavailable {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        log::info!("Output device {} opened ({}x{} RGB24)", path.display(), width, height);
        Ok(Self::with_writer(path, file, width, height))
    }
}

impl<W: Write + Send> DeviceSink<W> {
    /// Sink over any writer (used for pipes and tests)
    pub fn with_writer(path: impl Into<PathBuf>, writer: W, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            writer,
            width,
            height,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> FrameSink for DeviceSink<W> {
    fn send(&mut self, frame: &Frame) -> Result<(), OutputError> {
        let fitted;
        let frame = if frame.dimensions() == (self.width, self.height) {
            frame
        } else {
            fitted = frame::fit_stretch(frame, self.width, self.height);
            &fitted
        };
        debug_assert_eq!(frame.as_raw().len(), frame::expected_size(self.width, self.height));

        self.writer
            .write_all(frame.as_raw())
            .and_then(|()| self.writer.flush())
            .map_err(|err| {
                if is_busy(&err) {
                    OutputError::SinkBusy { path: self.path.clone() }
                } else {
                    OutputError::Write(err)
                }
            })
    }
}

/// Create a preview channel; `mirrored` flips the copy left to right
pub fn preview_channel(mirrored: bool) -> (PreviewSender, PreviewReceiver) {
    let (tx, rx) = bounded(1);
    (
        PreviewSender {
            tx,
            stale: rx.clone(),
            mirrored,
        },
        PreviewReceiver { rx },
    )
}

/// Producer side of the preview channel
#[derive(Clone)]
pub struct PreviewSender {
    tx: Sender<Frame>,
    stale: Receiver<Frame>,
    mirrored: bool,
}

impl PreviewSender {
    /// Publish a copy of `frame`, replacing any frame not yet picked up.
    /// Never blocks.
    pub fn send(&self, frame: &Frame) {
        let mut copy = if self.mirrored {
            frame::mirrored(frame)
        } else {
            frame.clone()
        };

        for _ in 0..2 {
            match self.tx.try_send(copy) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(returned)) => {
                    let _ = self.stale.try_recv();
                    copy = returned;
                }
            }
        }
    }
}

/// Consumer side of the preview channel
#[derive(Clone)]
pub struct PreviewReceiver {
    rx: Receiver<Frame>,
}

impl PreviewReceiver {
    /// Most recent frame, waiting up to `timeout` if none is queued
    pub fn latest(&self, timeout: Duration) -> Option<Frame> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(_) => self.rx.recv_timeout(timeout).ok(),
        }
    }

    pub fn try_latest(&self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> Frame {
        Frame::from_fn(w, h, |x, y| Rgb([x as u8 * 10, y as u8 * 10, 1]))
    }

    #[test]
    fn test_device_sink_writes_raw_rgb() {
        let mut sink = DeviceSink::with_writer("/dev/null", Vec::new(), 4, 2);
        let frame = gradient(4, 2);
        sink.send(&frame).unwrap();
        sink.send(&gradient(8, 8)).unwrap();

        let written = sink.into_inner();
        assert_eq!(written.len(), 2 * frame::expected_size(4, 2));
        assert_eq!(&written[..24], frame.as_raw().as_slice());
    }

    struct BusyWriter;

    impl Write for BusyWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from_raw_os_error(EBUSY))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_busy_device_maps_to_sink_busy() {
        let mut sink = DeviceSink::with_writer("/dev/video9", BusyWriter, 2, 2);
        let err = sink.send(&gradient(2, 2)).unwrap_err();
        assert!(matches!(err, OutputError::SinkBusy { .. }));
        assert!(err.to_string().contains("close any apps"));
    }

    #[test]
    fn test_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let result = DeviceSink::open(dir.path().join("missing").join("video0"), 2, 2);
        assert!(matches!(result, Err(OutputError::SinkUnavailable { .. })));
    }

    #[test]
    fn test_preview_latest_wins() {
        let (tx, rx) = preview_channel(false);
        assert_eq!(rx.try_latest(), None);

        tx.send(&Frame::from_pixel(1, 1, Rgb([1, 1, 1])));
        tx.send(&Frame::from_pixel(1, 1, Rgb([2, 2, 2])));
        assert_eq!(rx.try_latest(), Some(Frame::from_pixel(1, 1, Rgb([2, 2, 2]))));
        assert_eq!(rx.latest(Duration::from_millis(5)), None);
    }

    #[test]
    fn test_preview_mirrored_copy() {
        let (tx, rx) = preview_channel(true);
        let frame = gradient(3, 1);
        tx.send(&frame);
        assert_eq!(rx.try_latest(), Some(frame::mirrored(&frame)));

        drop(rx);
        tx.send(&frame);
    }
}
