//! Command Server Module
//!
//! Polls the endpoint for drive commands, runs them on the motor controller
//! and answers every request with the freshest camera frame.
//!
//! Drive actions are pulses: the motors run for a fixed time and then stop.
//! The reply to a drive action is held back until the pulse has finished, so
//! the peer sees its frame after the motors are stopped again. While a pulse
//! runs the server keeps polling for requests and checking the running flag
//! instead of sleeping through it.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use super::{
    endpoint::Endpoint,
    messages::{encode_header, parse_command, ErrorReply},
};
use crate::{
    config::ServerConfig,
    error::{Error, Result},
    utils::{
        controllers::{Action, Command, MotorController, MotorDriver, Pulse},
        slot::FrameSlot,
    },
};

/// Single-threaded request/reply loop.
pub struct CommandServer<E, D> {
    endpoint: E,
    motors: MotorController<D>,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    pulse: Pulse,
    poll_timeout: Duration,
    pulse_duration: Duration,
}

impl<E, D> CommandServer<E, D>
where
    E: Endpoint,
    D: MotorDriver,
{
    pub fn new(
        endpoint: E,
        motors: MotorController<D>,
        slot: Arc<FrameSlot>,
        running: Arc<AtomicBool>,
        config: &ServerConfig,
    ) -> Self {
        CommandServer {
            endpoint,
            motors,
            slot,
            running,
            pulse: Pulse::Idle,
            poll_timeout: config.poll_timeout,
            pulse_duration: config.pulse_duration,
        }
    }

    /// Serve until the running flag clears or the transport fails.
    ///
    /// A pulse still in progress at exit is cut short and the motors are
    /// stopped; its reply is never sent.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("poller ready");

        let result = loop {
            if !self.running.load(Ordering::Relaxed) {
                tracing::info!("stopping server");
                break Ok(());
            }
            if let Err(e) = self.tick() {
                tracing::error!("command server error: {}", e);
                break Err(e);
            }
        };

        if let Some(action) = self.pulse.cancel() {
            tracing::warn!(action = action.name(), "pulse interrupted");
            self.drive(0.0, 0.0);
        }
        result
    }

    /// One poll cycle: finish a due pulse, or wait for and handle a request.
    ///
    /// A request arriving mid-pulse ends the pulse early. The held-back reply
    /// goes out first so replies stay in request order.
    pub fn tick(&mut self) -> Result<()> {
        let now = Instant::now();
        if let Some(action) = self.pulse.poll(now) {
            return self.finish_pulse(action);
        }

        let timeout = match self.pulse.remaining(now) {
            Some(remaining) => remaining.min(self.poll_timeout),
            None => self.poll_timeout,
        };
        if let Some(request) = self.endpoint.poll_request(timeout)? {
            if let Some(action) = self.pulse.cancel() {
                tracing::info!(action = action.name(), "pulse cut short by new request");
                self.finish_pulse(action)?;
            }
            self.handle_message(&request)?;
        }
        Ok(())
    }

    /// Handle one raw request. Only transport failures are returned; bad
    /// requests are answered with an error reply.
    pub fn handle_message(
        &mut self,
        request: &[u8],
    ) -> Result<()> {
        let command = match parse_command(request) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("{}", e);
                return self.send_error(&e);
            }
        };

        match command {
            Command::Reset => {
                tracing::info!("got reset command");
                self.drive(0.0, 0.0);
            }
            Command::Action { action } => {
                tracing::info!(action = action.as_str(), "received action");
                match Action::from_name(&action) {
                    Some(known) => {
                        if self.start_action(known) {
                            // Reply goes out when the pulse ends.
                            return Ok(());
                        }
                    }
                    None => tracing::warn!(action = action.as_str(), "ignoring unknown action"),
                }
            }
        }

        self.send_frame()
    }

    /// Returns `true` when a pulse was started.
    fn start_action(
        &mut self,
        action: Action,
    ) -> bool {
        match action.speeds() {
            Some((left, right)) => {
                self.drive(left, right);
                self.pulse
                    .start(action, Instant::now(), self.pulse_duration);
                true
            }
            None => {
                self.drive(0.0, 0.0);
                false
            }
        }
    }

    fn finish_pulse(
        &mut self,
        action: Action,
    ) -> Result<()> {
        tracing::debug!(action = action.name(), "pulse finished");
        self.drive(0.0, 0.0);
        self.send_frame()
    }

    /// Motor faults never reach the peer.
    fn drive(
        &mut self,
        left: f32,
        right: f32,
    ) {
        if let Err(e) = self.motors.set_motors(left, right) {
            tracing::warn!(left, right, "{}", e);
        }
    }

    fn send_frame(&mut self) -> Result<()> {
        let Some(frame) = self.slot.latest() else {
            tracing::warn!("no frame captured yet");
            return self.send_error(&Error::Unavailable);
        };

        tracing::debug!(
            seq = frame.seq(),
            age_ms = frame.captured_at().elapsed().as_millis() as u64,
            "sending image"
        );
        let header = encode_header(&frame.header())?;
        self.endpoint.send_reply(&header, frame.as_bytes())?;
        tracing::debug!(seq = frame.seq(), "sent image");
        Ok(())
    }

    fn send_error(
        &mut self,
        error: &Error,
    ) -> Result<()> {
        let header = encode_header(&ErrorReply::from(error))?;
        self.endpoint.send_reply(&header, &[])
    }

    pub fn motors(&self) -> &MotorController<D> {
        &self.motors
    }

    pub fn pulse(&self) -> &Pulse {
        &self.pulse
    }

    /// Hand back the motor controller, e.g. to release the motors at exit.
    pub fn into_motors(self) -> MotorController<D> {
        self.motors
    }
}
