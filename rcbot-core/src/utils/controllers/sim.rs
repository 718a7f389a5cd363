//! Simulated motors for running the rover without a HAT attached.

use std::{
    convert::Infallible,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{Motor, MotorDriver};
use crate::utils::math::drive::MotorSpeed;

#[derive(Debug)]
struct SimState {
    left: MotorSpeed,
    right: MotorSpeed,
    history: Vec<(Motor, MotorSpeed)>,
}

/// Read side of a [`SimMotors`], usable from any thread.
#[derive(Debug, Clone)]
pub struct SimProbe(Arc<Mutex<SimState>>);

impl SimProbe {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Speed currently applied to `motor`.
    pub fn current(
        &self,
        motor: Motor,
    ) -> MotorSpeed {
        let state = self.lock();
        match motor {
            Motor::Left => state.left,
            Motor::Right => state.right,
        }
    }

    /// Signed `(left, right)` magnitudes.
    pub fn signed(&self) -> (i16, i16) {
        let state = self.lock();
        (state.left.signed(), state.right.signed())
    }

    /// Every command received so far, oldest first.
    pub fn history(&self) -> Vec<(Motor, MotorSpeed)> {
        self.lock().history.clone()
    }
}

/// Motor driver that logs commands instead of driving hardware.
#[derive(Debug)]
pub struct SimMotors {
    probe: SimProbe,
}

impl SimMotors {
    pub fn new() -> Self {
        SimMotors {
            probe: SimProbe(Arc::new(Mutex::new(SimState {
                left: MotorSpeed::RELEASED,
                right: MotorSpeed::RELEASED,
                history: Vec::new(),
            }))),
        }
    }

    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }
}

impl Default for SimMotors {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorDriver for SimMotors {
    type Error = Infallible;

    fn drive(
        &mut self,
        motor: Motor,
        speed: MotorSpeed,
    ) -> Result<(), Self::Error> {
        tracing::info!(?motor, direction = ?speed.direction, magnitude = speed.magnitude, "sim motor");
        let mut state = self.probe.lock();
        match motor {
            Motor::Left => state.left = speed,
            Motor::Right => state.right = speed,
        }
        state.history.push((motor, speed));
        Ok(())
    }
}
