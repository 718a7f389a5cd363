use clap::Parser;
use rcbot_core::config::{self, CameraConfig, RobotConfig};
use rcbot_core::utils::camera::producer::ProducerHandle;
use rcbot_core::utils::camera::TestPatternCamera;
use rcbot_core::utils::connection::PairEndpoint;
use rcbot_core::utils::controllers::{MotorDriver, SimMotors};
use rcbot_core::utils::{CommandServer, FrameProducer, FrameSlot, MotorController};
use rcbot_core::{Error, Result};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "hardware")]
use linux_embedded_hal::I2cdev;
#[cfg(feature = "hardware")]
use rcbot_core::config::MotorConfig;
#[cfg(feature = "hardware")]
use rcbot_core::utils::camera::v4l2::V4lCamera;
#[cfg(feature = "hardware")]
use rcbot_core::utils::controllers::motor_hat::{MotorHat, scan_bus};

/// Time given to the motor driver to settle after the final release.
const SETTLE_TIME: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// TCP port the PAIR socket binds to
    #[clap(long, default_value_t = config::SERVER_PORT)]
    port: u16,
    /// how long a drive action runs the motors, in milliseconds
    #[clap(long, default_value_t = config::PULSE_DURATION.as_millis() as u64)]
    pulse_ms: u64,
    /// how long one socket poll waits for a request, in milliseconds
    #[clap(long, default_value_t = config::POLL_TIMEOUT.as_millis() as u64)]
    poll_ms: u64,
    /// camera frame rate
    #[clap(long, default_value_t = config::CAMERA_FRAMERATE)]
    frame_rate: u32,
    /// camera capture width
    #[clap(long, default_value_t = config::CAMERA_RESOLUTION.0)]
    capture_width: u32,
    /// camera capture height
    #[clap(long, default_value_t = config::CAMERA_RESOLUTION.1)]
    capture_height: u32,
    /// consecutive capture failures before the rover shuts down
    #[clap(long, default_value_t = config::MAX_CAPTURE_FAILURES)]
    max_capture_failures: u32,
    /// I2C bus of the motor HAT (hardware builds)
    #[cfg_attr(not(feature = "hardware"), allow(dead_code))]
    #[clap(long, default_value = "/dev/i2c-1")]
    i2c_bus: String,
    /// V4L2 device index of the camera (hardware builds)
    #[cfg_attr(not(feature = "hardware"), allow(dead_code))]
    #[clap(long, default_value_t = 0)]
    video_device: usize,
    /// use simulated motors and a test pattern camera
    #[clap(long)]
    sim: bool,
}

impl Opts {
    fn config(&self) -> RobotConfig {
        let mut config = RobotConfig::default();
        config.server.port = self.port;
        config.server.pulse_duration = Duration::from_millis(self.pulse_ms);
        config.server.poll_timeout = Duration::from_millis(self.poll_ms);
        config.camera.width = self.capture_width;
        config.camera.height = self.capture_height;
        config.camera.frame_rate = self.frame_rate;
        config.camera.max_failures = self.max_capture_failures;
        config
    }

    fn use_hardware(&self) -> bool {
        cfg!(feature = "hardware") && !self.sim
    }
}

#[cfg_attr(not(feature = "hardware"), allow(unused_variables))]
fn spawn_camera(
    opts: &Opts,
    config: &CameraConfig,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
) -> Result<ProducerHandle> {
    let (width, height, frame_rate) = (config.width, config.height, config.frame_rate);

    #[cfg(feature = "hardware")]
    if opts.use_hardware() {
        let index = opts.video_device;
        return FrameProducer::spawn(
            move || V4lCamera::open(index, width, height, frame_rate),
            slot,
            running,
            config.max_failures,
        );
    }

    info!(width, height, frame_rate, "using test pattern camera");
    FrameProducer::spawn(
        move || Ok(TestPatternCamera::new(width, height, frame_rate)),
        slot,
        running,
        config.max_failures,
    )
}

#[cfg(feature = "hardware")]
fn open_motor_hat(
    bus: &str,
    config: &MotorConfig,
) -> Result<MotorController<MotorHat<I2cdev>>> {
    let i2c = I2cdev::new(bus).map_err(|e| Error::FatalInit(format!("failed to open {bus}: {e}")))?;
    let mut hat = MotorHat::new(i2c, config.address)
        .map_err(|e| Error::FatalInit(format!("motor HAT: {e:?}")))?;

    if let Err(e) = hat.init(config.prescale) {
        error!("motor HAT not responding at 0x{:02X}: {:?}", config.address, e);
        let mut i2c = hat.destroy();
        let found = scan_bus(&mut i2c);
        return Err(Error::FatalInit(format!(
            "no motor HAT at 0x{:02X} on {bus}, devices found: {:02X?}",
            config.address, found
        )));
    }
    info!(bus, address = config.address, "motor HAT ready");
    Ok(MotorController::new(hat))
}

/// Run the command server until shutdown, then stop the camera and release
/// the motors.
fn serve<D: MotorDriver>(
    motors: MotorController<D>,
    endpoint: PairEndpoint,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    producer: ProducerHandle,
    config: &RobotConfig,
) -> Result<()> {
    let mut server = CommandServer::new(endpoint, motors, slot, Arc::clone(&running), &config.server);
    let served = server.run();

    running.store(false, Ordering::Relaxed);
    let captured = producer.join();

    let mut motors = server.into_motors();
    if let Err(e) = motors.release() {
        warn!("failed to release motors: {}", e);
    }
    thread::sleep(SETTLE_TIME);

    served.and(captured)
}

/// Stop a producer whose server never started.
fn abort(
    running: &AtomicBool,
    producer: ProducerHandle,
    cause: Error,
) -> Result<()> {
    running.store(false, Ordering::Relaxed);
    if let Err(e) = producer.join() {
        warn!("camera thread: {}", e);
    }
    Err(cause)
}

fn run(opts: &Opts) -> Result<()> {
    let config = opts.config();
    let running = Arc::new(AtomicBool::new(true));

    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received Ctrl-C, shutting down...");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::FatalInit(format!("failed to set Ctrl-C handler: {e}")))?;

    let slot = Arc::new(FrameSlot::new());
    let producer = spawn_camera(opts, &config.camera, Arc::clone(&slot), Arc::clone(&running))?;

    let endpoint = match PairEndpoint::bind(&config.server.bind_address()) {
        Ok(endpoint) => endpoint,
        Err(e) => return abort(&running, producer, e),
    };

    #[cfg(feature = "hardware")]
    if opts.use_hardware() {
        let motors = match open_motor_hat(&opts.i2c_bus, &config.motors) {
            Ok(motors) => motors,
            Err(e) => return abort(&running, producer, e),
        };
        return serve(motors, endpoint, slot, running, producer, &config);
    }

    info!("using simulated motors");
    serve(MotorController::new(SimMotors::new()), endpoint, slot, running, producer, &config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts: Opts = Opts::parse();
    info!(hardware = opts.use_hardware(), port = opts.port, "starting rover");

    match run(&opts) {
        Ok(()) => {
            info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Opts::command().debug_assert();
    }

    #[test]
    fn test_defaults_match_core_config() {
        let opts = Opts::parse_from(["rover"]);
        assert_eq!(opts.config(), RobotConfig::default());
        assert_eq!(opts.i2c_bus, "/dev/i2c-1");
    }

    #[test]
    fn test_flags_override_config() {
        let opts = Opts::parse_from([
            "rover",
            "--port",
            "5555",
            "--pulse-ms",
            "150",
            "--capture-width",
            "640",
            "--capture-height",
            "480",
            "--sim",
        ]);
        let config = opts.config();
        assert_eq!(config.server.bind_address(), "tcp://*:5555");
        assert_eq!(config.server.pulse_duration, Duration::from_millis(150));
        assert_eq!((config.camera.width, config.camera.height), (640, 480));
        assert!(!opts.use_hardware());
    }
}
