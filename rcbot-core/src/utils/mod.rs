//! Utility re-exports for the rover.
//!
//! - `camera`: camera backends, frame downsampling and the producer thread
//! - `connection`: request/reply endpoint and the command server
//! - `controllers`: commands, motor controller and motor drivers
//! - `math`: normalized speed to motor magnitude conversion
//! - `slot`: single-frame mailbox shared between producer and server

pub mod camera;
pub mod connection;
pub mod controllers;
pub mod math;
pub mod slot;

pub use camera::{producer::FrameProducer, Frame};
pub use connection::server::CommandServer;
pub use controllers::{Command, MotorController};
pub use slot::FrameSlot;
