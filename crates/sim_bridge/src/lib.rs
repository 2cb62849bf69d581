//! # Sim Bridge
//!
//! Simulation control interface.
//!
//! Responsibilities:
//! - Abstract simulator control behind the `Simulator` trait
//! - Clamp and de-duplicate vehicle commands (`CommandFilter`)
//! - Decode camera frames
//! - Plan the two track directions of a judging run
//! - Provide an in-memory simulator with a scripted course for tests

pub mod camera;
pub mod client;
pub mod error;
pub mod mock_client;
pub mod track;
pub mod vehicle;

pub use camera::{CameraFrame, CAMERA_HEIGHT, CAMERA_WIDTH};
pub use client::{CarState, Simulator};
pub use error::{Result, SimError};
pub use mock_client::{CrossingCallback, MockConfig, MockCourse, MockSimulator, SimCommand};
pub use track::{PlannedAttempt, TrackPlanner};
pub use vehicle::{CommandFilter, VehicleLimits};
