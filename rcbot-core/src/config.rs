//! Compile-time defaults and the runtime configuration built from them.
//!
//! The `rover` binary starts from [`RobotConfig::default`] and overrides
//! individual fields from its command line.

use core::time::Duration;

/// TCP port the PAIR socket binds to.
pub const SERVER_PORT: u16 = 7777;
/// How long one endpoint poll waits for a request.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(10);
/// How long a drive action holds the motors before stopping them.
pub const PULSE_DURATION: Duration = Duration::from_millis(200);

/// Camera capture resolution (width, height).
pub const CAMERA_RESOLUTION: (u32, u32) = (1640, 1232);
/// Camera frame rate in frames per second.
pub const CAMERA_FRAMERATE: u32 = 30;
/// Consecutive capture failures tolerated before the producer gives up.
pub const MAX_CAPTURE_FAILURES: u32 = 10;

/// Downsized frame width in pixels.
pub const FRAME_WIDTH: usize = 80;
/// Downsized frame height in pixels.
pub const FRAME_HEIGHT: usize = 60;
/// Samples per pixel.
pub const FRAME_CHANNELS: usize = 3;

/// Default I2C address of the motor HAT.
pub const MOTOR_HAT_ADDRESS: u8 = 0x60;
/// PCA9685 prescale for a ~1.6 kHz PWM frequency.
pub const MOTOR_HAT_PRESCALE: u8 = 3;

/// Runtime configuration for the whole rover.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub motors: MotorConfig,
}

/// Command server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub poll_timeout: Duration,
    pub pulse_duration: Duration,
}

/// Camera and frame producer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub max_failures: u32,
}

/// Motor HAT settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorConfig {
    pub address: u8,
    pub prescale: u8,
}

impl ServerConfig {
    /// ZeroMQ endpoint string for binding on all interfaces.
    pub fn bind_address(&self) -> String {
        format!("tcp://*:{}", self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: SERVER_PORT,
            poll_timeout: POLL_TIMEOUT,
            pulse_duration: PULSE_DURATION,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: CAMERA_RESOLUTION.0,
            height: CAMERA_RESOLUTION.1,
            frame_rate: CAMERA_FRAMERATE,
            max_failures: MAX_CAPTURE_FAILURES,
        }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            address: MOTOR_HAT_ADDRESS,
            prescale: MOTOR_HAT_PRESCALE,
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            camera: CameraConfig::default(),
            motors: MotorConfig::default(),
        }
    }
}
