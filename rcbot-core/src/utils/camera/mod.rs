//! Camera backends and frame handling.
//!
//! A [`Camera`] hands out full-resolution packed 3-channel images. The
//! [`producer`] thread shrinks each one into a fixed-size [`Frame`] and
//! publishes it to the shared slot.

pub mod frame;
pub mod producer;
#[cfg(feature = "v4l")]
pub mod v4l2;

use std::{
    thread,
    time::{Duration, Instant},
};

use crate::error::{Error, Result};

pub use frame::{Frame, FRAME_DTYPE, FRAME_LEN, FRAME_SHAPE};

/// Bytes per pixel of every raw image.
pub const RAW_BYTES_PER_PIXEL: usize = 3;

/// Borrowed full-resolution image, 3 bytes per pixel, rows `stride` bytes
/// apart.
#[derive(Debug, Clone, Copy)]
pub struct RawImage<'a> {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> RawImage<'a> {
    /// Tightly packed image without row padding.
    pub fn packed(
        width: u32,
        height: u32,
        data: &'a [u8],
    ) -> Self {
        RawImage {
            width,
            height,
            stride: width as usize * RAW_BYTES_PER_PIXEL,
            data,
        }
    }

    /// Check that the buffer really holds `width x height` pixels.
    pub fn validate(&self) -> Result<()> {
        let row = self.width as usize * RAW_BYTES_PER_PIXEL;
        if self.width == 0 || self.height == 0 {
            return Err(Error::TransientHardware(format!(
                "empty image {}x{}",
                self.width, self.height
            )));
        }
        if self.stride < row {
            return Err(Error::TransientHardware(format!(
                "stride {} shorter than row of {} bytes",
                self.stride, row
            )));
        }
        let needed = self.stride * (self.height as usize - 1) + row;
        if self.data.len() < needed {
            return Err(Error::TransientHardware(format!(
                "image buffer holds {} bytes, {}x{} needs {}",
                self.data.len(),
                self.width,
                self.height,
                needed
            )));
        }
        Ok(())
    }
}

/// Source of full-resolution images.
pub trait Camera {
    type Error: core::fmt::Display;

    /// Block until the next image is available.
    fn capture(&mut self) -> core::result::Result<RawImage<'_>, Self::Error>;
}

/// Synthetic camera producing a moving colour gradient.
pub struct TestPatternCamera {
    width: u32,
    height: u32,
    interval: Option<Duration>,
    next_due: Option<Instant>,
    tick: u32,
    buffer: Vec<u8>,
}

impl TestPatternCamera {
    /// `frame_rate` of zero captures as fast as the caller asks.
    pub fn new(
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Self {
        let interval = (frame_rate > 0).then(|| Duration::from_secs(1) / frame_rate);
        tracing::info!(width, height, frame_rate, "test pattern camera opened");
        TestPatternCamera {
            width,
            height,
            interval,
            next_due: None,
            tick: 0,
            buffer: vec![0; width as usize * height as usize * RAW_BYTES_PER_PIXEL],
        }
    }

    fn pace(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + interval);
    }
}

impl Camera for TestPatternCamera {
    type Error = core::convert::Infallible;

    fn capture(&mut self) -> core::result::Result<RawImage<'_>, Self::Error> {
        self.pace();
        let tick = self.tick;
        self.tick = self.tick.wrapping_add(1);

        let width = self.width as usize;
        for (i, px) in self.buffer.chunks_exact_mut(RAW_BYTES_PER_PIXEL).enumerate() {
            let (x, y) = ((i % width) as u32, (i / width) as u32);
            px[0] = x.wrapping_add(tick) as u8;
            px[1] = y.wrapping_add(tick) as u8;
            px[2] = tick as u8;
        }

        Ok(RawImage::packed(self.width, self.height, &self.buffer))
    }
}

impl Drop for TestPatternCamera {
    fn drop(&mut self) {
        tracing::info!(frames = self.tick, "test pattern camera closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_buffer() {
        let data = [0u8; 10];
        assert!(RawImage::packed(4, 4, &data).validate().is_err());
        assert!(RawImage::packed(0, 4, &data).validate().is_err());
        assert!(RawImage::packed(2, 1, &data).validate().is_ok());
    }

    #[test]
    fn test_validate_allows_padded_rows() {
        // Two rows of 2 pixels, each row padded to 8 bytes; last row unpadded.
        let data = [0u8; 14];
        let raw = RawImage {
            width: 2,
            height: 2,
            stride: 8,
            data: &data,
        };
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_pattern_moves_between_captures() {
        let mut cam = TestPatternCamera::new(8, 4, 0);
        let first = cam.capture().unwrap().data.to_vec();
        let second = cam.capture().unwrap();
        assert_eq!(second.data.len(), 8 * 4 * 3);
        assert_ne!(first.as_slice(), second.data);
    }
}
