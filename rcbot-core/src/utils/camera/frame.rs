//! Fixed-size downsized frames.
//!
//! Frames are `[width, height, channels]` = `[80, 60, 3]` bytes, laid out
//! row-major over that shape: x is the outermost axis, then y, then channel.
//! Channel order is whatever the camera delivers.

use std::time::Instant;

use super::{RawImage, RAW_BYTES_PER_PIXEL};
use crate::{
    config::{FRAME_CHANNELS, FRAME_HEIGHT, FRAME_WIDTH},
    error::{Error, Result},
    utils::connection::messages::FrameHeader,
};

/// Shape advertised in every reply header.
pub const FRAME_SHAPE: [usize; 3] = [FRAME_WIDTH, FRAME_HEIGHT, FRAME_CHANNELS];
/// Element type advertised in every reply header.
pub const FRAME_DTYPE: &str = "uint8";
/// Payload size in bytes.
pub const FRAME_LEN: usize = FRAME_WIDTH * FRAME_HEIGHT * FRAME_CHANNELS;

/// One downsized camera image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    seq: u64,
    captured_at: Instant,
    data: Box<[u8]>,
}

impl Frame {
    /// Shrink `raw` to the frame shape by nearest-neighbour sampling.
    ///
    /// Source pixel `(x * W / 80, y * H / 60)` lands at `(x, y)`, which is
    /// plain stride slicing whenever the source is an integer multiple of the
    /// frame size.
    pub fn downsample(
        raw: &RawImage<'_>,
        seq: u64,
    ) -> Result<Self> {
        raw.validate()?;
        let (src_w, src_h) = (raw.width as usize, raw.height as usize);

        let mut data = vec![0u8; FRAME_LEN];
        for x in 0..FRAME_WIDTH {
            let sx = x * src_w / FRAME_WIDTH;
            for y in 0..FRAME_HEIGHT {
                let sy = y * src_h / FRAME_HEIGHT;
                let src = sy * raw.stride + sx * RAW_BYTES_PER_PIXEL;
                let dst = Self::offset(x, y);
                data[dst..dst + FRAME_CHANNELS]
                    .copy_from_slice(&raw.data[src..src + FRAME_CHANNELS]);
            }
        }

        Ok(Frame {
            seq,
            captured_at: Instant::now(),
            data: data.into_boxed_slice(),
        })
    }

    /// Wrap an already downsized buffer of exactly [`FRAME_LEN`] bytes.
    pub fn from_bytes(
        seq: u64,
        data: Vec<u8>,
    ) -> Result<Self> {
        if data.len() != FRAME_LEN {
            return Err(Error::TransientHardware(format!(
                "frame holds {} bytes, expected {}",
                data.len(),
                FRAME_LEN
            )));
        }
        Ok(Frame {
            seq,
            captured_at: Instant::now(),
            data: data.into_boxed_slice(),
        })
    }

    fn offset(
        x: usize,
        y: usize,
    ) -> usize {
        (x * FRAME_HEIGHT + y) * FRAME_CHANNELS
    }

    /// Capture sequence number, increasing by one per published frame.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Channels of the pixel at column `x`, row `y`.
    pub fn pixel(
        &self,
        x: usize,
        y: usize,
    ) -> [u8; FRAME_CHANNELS] {
        let at = Self::offset(x, y);
        let mut px = [0; FRAME_CHANNELS];
        px.copy_from_slice(&self.data[at..at + FRAME_CHANNELS]);
        px
    }

    /// Reply header describing this frame.
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            dtype: FRAME_DTYPE.to_string(),
            shape: FRAME_SHAPE.to_vec(),
        }
    }
}
