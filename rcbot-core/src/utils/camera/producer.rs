//! Camera thread feeding the shared frame slot.
//!
//! The camera is opened on the thread that uses it, so backends holding
//! thread-bound handles (mmap'd V4L2 buffers) never cross threads. Open
//! failures are reported back to [`FrameProducer::spawn`] before it returns.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
};

use super::{Camera, Frame};
use crate::{
    error::{Error, Result},
    utils::slot::FrameSlot,
};

/// Captures frames until the shared running flag clears.
pub struct FrameProducer<C> {
    camera: C,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    max_failures: u32,
    seq: u64,
}

/// Join handle of a spawned producer.
pub struct ProducerHandle {
    handle: JoinHandle<Result<()>>,
}

impl<C> FrameProducer<C>
where
    C: Camera,
{
    /// `max_failures` consecutive capture errors end the producer; zero is
    /// treated as one.
    pub fn new(
        camera: C,
        slot: Arc<FrameSlot>,
        running: Arc<AtomicBool>,
        max_failures: u32,
    ) -> Self {
        FrameProducer {
            camera,
            slot,
            running,
            max_failures: max_failures.max(1),
            seq: 0,
        }
    }

    /// Capture, downsample and publish one frame.
    ///
    /// Returns the sequence number of the published frame, or `None` when the
    /// slot already held a newer one and kept it.
    pub fn capture_once(&mut self) -> Result<Option<u64>> {
        let raw = self
            .camera
            .capture()
            .map_err(|e| Error::TransientHardware(format!("capture failed: {e}")))?;
        let frame = Frame::downsample(&raw, self.seq + 1)?;
        self.seq += 1;
        Ok(self.slot.publish(frame).then_some(self.seq))
    }

    /// Capture loop. Clears the running flag before giving up on a camera
    /// that keeps failing, which takes the rest of the process down with it.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("camera thread started");
        let mut failures = 0u32;

        while self.running.load(Ordering::Relaxed) {
            match self.capture_once() {
                Ok(published) => {
                    if failures > 0 {
                        tracing::info!(seq = self.seq, failures, "camera recovered");
                    }
                    failures = 0;
                    match published {
                        Some(seq) => tracing::trace!(seq, "frame published"),
                        None => tracing::debug!(seq = self.seq, "slot kept a newer frame"),
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(failures, "{}", e);
                    if failures >= self.max_failures {
                        tracing::error!(failures, "camera keeps failing, shutting down");
                        self.running.store(false, Ordering::Relaxed);
                        return Err(Error::CameraExhausted(failures));
                    }
                }
            }
        }

        tracing::info!(frames = self.seq, "camera thread exiting");
        Ok(())
    }

    /// Spawn the producer thread, opening the camera with `open` on it.
    ///
    /// Returns once the camera is open; an open failure is returned as is
    /// (normally [`Error::FatalInit`]).
    pub fn spawn<F>(
        open: F,
        slot: Arc<FrameSlot>,
        running: Arc<AtomicBool>,
        max_failures: u32,
    ) -> Result<ProducerHandle>
    where
        F: FnOnce() -> Result<C> + Send + 'static,
        C: 'static,
    {
        let (init_tx, init_rx) = mpsc::sync_channel::<Result<()>>(1);

        let handle = thread::Builder::new()
            .name("camera".into())
            .spawn(move || {
                let camera = match open() {
                    Ok(camera) => {
                        let _ = init_tx.send(Ok(()));
                        camera
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return Ok(());
                    }
                };
                let mut producer = FrameProducer::new(camera, slot, running, max_failures);
                producer.run()
            })
            .map_err(|e| Error::FatalInit(format!("failed to spawn camera thread: {e}")))?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(ProducerHandle { handle }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::ThreadPanic("camera"))
            }
        }
    }
}

impl ProducerHandle {
    /// Wait for the producer to exit and return its result.
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| Error::ThreadPanic("camera"))?
    }
}
