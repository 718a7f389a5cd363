//! Math utilities for the rover.
//!
//! This module converts normalized drive requests into motor HAT magnitudes.

pub mod drive;
