//! DC motor HAT driver for the rover.
//!
//! The HAT pairs a PCA9685 PWM chip with two TB6612 H-bridges. Each motor uses
//! three PCA9685 channels: one PWM channel for speed and two logic inputs for
//! direction. Channels are driven fully on or off to emulate the logic pins.

use embedded_hal::i2c::I2c;
use pwm_pca9685::{Address as PwmAddress, Channel, Error as PwmError, Pca9685};

use super::{Motor, MotorDriver};
use crate::utils::math::drive::{Direction, MotorSpeed};

/// Full-scale PCA9685 duty value.
const MAX_DUTY: u16 = 4095;
/// Magnitude to duty scaling (255 * 16 = 4080).
const DUTY_PER_STEP: u16 = 16;

/// Errors that can occur when talking to the motor HAT.
#[derive(Debug)]
pub enum DeviceError<E: core::fmt::Debug> {
    PwmError(PwmError<E>),
}

/// PCA9685 channels wired to one H-bridge.
#[derive(Debug, Clone, Copy)]
struct MotorPins {
    pwm: Channel,
    in1: Channel,
    in2: Channel,
}

/// High-level driver for the two DC motor ports of the HAT.
pub struct MotorHat<I2C> {
    pwm: Pca9685<I2C>,
    left: MotorPins,
    right: MotorPins,
}

impl<I2C, E> MotorHat<I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    /// Create a driver for the HAT at `address`. Does not touch the bus.
    pub fn new(
        i2c: I2C,
        address: u8,
    ) -> Result<Self, DeviceError<E>> {
        let pwm = Pca9685::new(i2c, PwmAddress::from(address)).map_err(DeviceError::PwmError)?;
        Ok(MotorHat {
            pwm,
            // M1
            left: MotorPins {
                pwm: Channel::C8,
                in1: Channel::C10,
                in2: Channel::C9,
            },
            // M2
            right: MotorPins {
                pwm: Channel::C13,
                in1: Channel::C11,
                in2: Channel::C12,
            },
        })
    }

    /// Enable the PWM chip and set its prescale.
    pub fn init(
        &mut self,
        prescale: u8,
    ) -> Result<(), DeviceError<E>> {
        self.pwm.enable().map_err(DeviceError::PwmError)?;
        tracing::info!("PWM enabled");
        self.pwm
            .set_prescale(prescale)
            .map_err(DeviceError::PwmError)?;
        tracing::info!(prescale, "PWM prescale set");
        Ok(())
    }

    /// Release both motors.
    pub fn release_all(&mut self) -> Result<(), DeviceError<E>> {
        self.drive_pins(self.left, MotorSpeed::RELEASED)?;
        self.drive_pins(self.right, MotorSpeed::RELEASED)
    }

    /// Give the I2C bus back.
    pub fn destroy(self) -> I2C {
        self.pwm.destroy()
    }

    fn set_pin(
        &mut self,
        channel: Channel,
        high: bool,
    ) -> Result<(), DeviceError<E>> {
        self.pwm
            .set_channel_on_off(channel, 0, if high { MAX_DUTY } else { 0 })
            .map_err(DeviceError::PwmError)
    }

    fn drive_pins(
        &mut self,
        pins: MotorPins,
        speed: MotorSpeed,
    ) -> Result<(), DeviceError<E>> {
        match speed.direction {
            Direction::Forward => {
                self.set_pin(pins.in2, false)?;
                self.set_pin(pins.in1, true)?;
            }
            Direction::Backward => {
                self.set_pin(pins.in1, false)?;
                self.set_pin(pins.in2, true)?;
            }
            Direction::Release => {
                self.set_pin(pins.in1, false)?;
                self.set_pin(pins.in2, false)?;
            }
        }

        let duty = speed.magnitude as u16 * DUTY_PER_STEP;
        self.pwm
            .set_channel_on_off(pins.pwm, 0, duty)
            .map_err(DeviceError::PwmError)
    }
}

impl<I2C, E> MotorDriver for MotorHat<I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    type Error = DeviceError<E>;

    fn drive(
        &mut self,
        motor: Motor,
        speed: MotorSpeed,
    ) -> Result<(), Self::Error> {
        let pins = match motor {
            Motor::Left => self.left,
            Motor::Right => self.right,
        };
        self.drive_pins(pins, speed)
    }
}

/// Probe every 7-bit address on the bus and return the ones that ACK.
pub fn scan_bus<I2C: I2c>(i2c: &mut I2C) -> Vec<u8> {
    let mut found = Vec::new();
    for addr in 0x03..0x78 {
        if i2c.write(addr, &[]).is_ok() {
            tracing::warn!("I2C device found at 0x{:02X}", addr);
            found.push(addr);
        }
    }
    found
}
