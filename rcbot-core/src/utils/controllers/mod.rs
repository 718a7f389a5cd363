//! Module Exports
//!
//! Commands accepted by the rover and the controller that turns them into
//! motor activity.
//!
//! - `motor_hat`: PCA9685 based DC motor HAT driver.
//! - `pulse`: timed drive state machine.
//! - `sim`: logging motor driver for running without hardware.

/// Module for the I2C motor HAT.
pub mod motor_hat;
pub mod pulse;
pub mod sim;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    utils::math::drive::MotorSpeed,
};

pub use motor_hat::MotorHat;
pub use pulse::Pulse;
pub use sim::{SimMotors, SimProbe};

/// Requests accepted on the command endpoint.
///
/// Serialized as JSON with tag `"command"`, e.g.
/// `{"command":"action","action":"move_forward"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Run a named action. Unknown names are accepted and ignored.
    Action { action: String },
    /// Stop both motors.
    Reset,
}

/// Named actions understood by the rover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveForward,
    MoveBack,
    TurnLeft,
    TurnRight,
    Done,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::MoveForward,
        Action::MoveBack,
        Action::TurnLeft,
        Action::TurnRight,
        Action::Done,
    ];

    /// Look up an action by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::MoveForward => "move_forward",
            Action::MoveBack => "move_back",
            Action::TurnLeft => "turn_left",
            Action::TurnRight => "turn_right",
            Action::Done => "done",
        }
    }

    /// `(left, right)` speeds held for one pulse, or `None` for actions that
    /// only stop the motors.
    pub fn speeds(&self) -> Option<(f32, f32)> {
        match self {
            Action::MoveForward => Some((0.4, 0.4)),
            Action::MoveBack => Some((-0.4, -0.4)),
            Action::TurnLeft => Some((-0.4, 0.4)),
            Action::TurnRight => Some((0.4, -0.4)),
            Action::Done => None,
        }
    }
}

/// Which side of the rover a motor drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    Left,
    Right,
}

/// Hardware that can run a single DC motor at a given speed.
pub trait MotorDriver {
    type Error: core::fmt::Debug;

    /// Set direction and magnitude of one motor.
    fn drive(
        &mut self,
        motor: Motor,
        speed: MotorSpeed,
    ) -> core::result::Result<(), Self::Error>;
}

/// Differential drive on top of a [`MotorDriver`].
///
/// Remembers the last normalized pair it was asked for so the server and tests
/// can inspect it.
pub struct MotorController<D> {
    driver: D,
    speeds: (f32, f32),
}

impl<D> MotorController<D>
where
    D: MotorDriver,
{
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            speeds: (0.0, 0.0),
        }
    }

    /// Drive both motors from normalized speeds in `[-1.0, 1.0]`.
    ///
    /// Both motors are always commanded; the first driver error is returned as
    /// a transient hardware fault.
    pub fn set_motors(
        &mut self,
        left: f32,
        right: f32,
    ) -> Result<()> {
        let l = MotorSpeed::from_normalized(left);
        let r = MotorSpeed::from_normalized(right);
        tracing::debug!(left, right, ?l, ?r, "setting motors");

        let left_result = self.driver.drive(Motor::Left, l);
        let right_result = self.driver.drive(Motor::Right, r);
        self.speeds = (clamp_unit(left), clamp_unit(right));

        left_result
            .and(right_result)
            .map_err(|e| Error::TransientHardware(format!("motor driver: {e:?}")))
    }

    /// Drive both motors to zero, which releases them.
    pub fn stop(&mut self) -> Result<()> {
        self.set_motors(0.0, 0.0)
    }

    /// Release both motors regardless of the last command.
    pub fn release(&mut self) -> Result<()> {
        let left_result = self.driver.drive(Motor::Left, MotorSpeed::RELEASED);
        let right_result = self.driver.drive(Motor::Right, MotorSpeed::RELEASED);
        self.speeds = (0.0, 0.0);
        tracing::info!("motors released");

        left_result
            .and(right_result)
            .map_err(|e| Error::TransientHardware(format!("motor release: {e:?}")))
    }

    /// Last commanded `(left, right)` pair after clamping.
    pub fn speeds(&self) -> (f32, f32) {
        self.speeds
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_inner(self) -> D {
        self.driver
    }
}

fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(-1.0, 1.0)
    }
}
