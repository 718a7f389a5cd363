//! Video4Linux2 camera backend.
//!
//! Requests packed `BGR3` frames, which the Raspberry Pi camera driver and
//! most UVC webcams provide natively.

use std::io;

use v4l::{
    buffer::Type,
    io::{mmap::Stream, traits::CaptureStream},
    video::{capture::Parameters, Capture},
    Device, FourCC,
};

use super::{Camera, RawImage};
use crate::error::{Error, Result};

const PIXEL_FORMAT: &[u8; 4] = b"BGR3";
const BUFFER_COUNT: u32 = 4;

/// Memory-mapped V4L2 capture stream.
pub struct V4lCamera {
    stream: Stream<'static>,
    width: u32,
    height: u32,
    stride: usize,
}

impl V4lCamera {
    /// Open `/dev/video{index}` at the requested resolution and frame rate.
    ///
    /// The driver may adjust the resolution; the negotiated one is used.
    pub fn open(
        index: usize,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Result<Self> {
        let init = |what: &str, e: io::Error| Error::FatalInit(format!("video{index}: {what}: {e}"));

        let dev = Device::new(index).map_err(|e| init("open", e))?;
        let mut fmt = dev.format().map_err(|e| init("read format", e))?;
        fmt.width = width;
        fmt.height = height;
        fmt.fourcc = FourCC::new(PIXEL_FORMAT);
        let fmt = dev.set_format(&fmt).map_err(|e| init("set format", e))?;

        if fmt.fourcc != FourCC::new(PIXEL_FORMAT) {
            return Err(Error::FatalInit(format!(
                "video{index}: driver does not support BGR3, offered {}",
                fmt.fourcc
            )));
        }
        if let Err(e) = dev.set_params(&Parameters::with_fps(frame_rate)) {
            tracing::warn!(frame_rate, "could not set frame rate: {}", e);
        }

        let stream = Stream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| init("map buffers", e))?;

        tracing::info!(index, width = fmt.width, height = fmt.height, "V4L2 camera opened");
        Ok(V4lCamera {
            stream,
            width: fmt.width,
            height: fmt.height,
            stride: fmt.stride as usize,
        })
    }
}

impl Camera for V4lCamera {
    type Error = io::Error;

    fn capture(&mut self) -> core::result::Result<RawImage<'_>, Self::Error> {
        let (buf, _meta) = self.stream.next()?;
        Ok(RawImage {
            width: self.width,
            height: self.height,
            stride: self.stride,
            data: buf,
        })
    }
}

impl Drop for V4lCamera {
    fn drop(&mut self) {
        tracing::info!("V4L2 camera closed");
    }
}
