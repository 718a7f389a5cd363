//! Normalized speed to motor magnitude conversion.
//!
//! Drive requests arrive as floats in `[-1.0, 1.0]`. The motor HAT wants an
//! 8-bit magnitude plus a direction, with an exact zero releasing the H-bridge
//! instead of braking it.
//!
//! # Example
//! ```rust
//! use rcbot_core::utils::math::drive::{Direction, MotorSpeed};
//! let speed = MotorSpeed::from_normalized(-0.5);
//! assert_eq!(speed.direction, Direction::Backward);
//! assert_eq!(speed.magnitude, 128);
//! ```

/// Largest magnitude the motor HAT accepts.
pub const MAX_MAGNITUDE: u8 = 255;

/// H-bridge state for one motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    /// Both bridge inputs low; the motor coasts.
    Release,
}

/// Direction and 8-bit magnitude for one motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorSpeed {
    pub direction: Direction,
    pub magnitude: u8,
}

impl MotorSpeed {
    /// Released motor, magnitude zero.
    pub const RELEASED: MotorSpeed = MotorSpeed {
        direction: Direction::Release,
        magnitude: 0,
    };

    /// Convert a normalized speed into a direction and magnitude.
    ///
    /// The input is clamped to `[-1.0, 1.0]` and NaN is treated as zero. The
    /// magnitude is `round(|x| * 255)`; a magnitude of zero releases the motor.
    pub fn from_normalized(speed: f32) -> Self {
        let speed = if speed.is_nan() { 0.0 } else { speed.clamp(-1.0, 1.0) };
        let magnitude = (speed.abs() * MAX_MAGNITUDE as f32).round() as u8;

        let direction = if magnitude == 0 {
            Direction::Release
        } else if speed > 0.0 {
            Direction::Forward
        } else {
            Direction::Backward
        };

        MotorSpeed {
            direction,
            magnitude,
        }
    }

    /// Signed magnitude in `[-255, 255]`.
    pub fn signed(&self) -> i16 {
        match self.direction {
            Direction::Forward => self.magnitude as i16,
            Direction::Backward => -(self.magnitude as i16),
            Direction::Release => 0,
        }
    }

    /// Back to a normalized value, for logging and inspection.
    pub fn normalized(&self) -> f32 {
        self.signed() as f32 / MAX_MAGNITUDE as f32
    }
}
