//! Core drivers and services for the rcbot rover.
//!
//! A camera thread keeps the freshest downsized frame in a shared slot while
//! the command server drives the motor HAT and answers every request with that
//! frame. The `rover` binary in `rcbot-app/` wires the pieces together.

pub mod config;
pub mod error;
pub mod utils;

pub use config::RobotConfig;
pub use error::{Error, Result};
