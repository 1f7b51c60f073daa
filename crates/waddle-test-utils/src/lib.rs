//! Shared test fixtures and utilities for waddle crates.
//!
//! Provides engine configurations sized for tests, a ready-to-walk engine,
//! recording/scripted stand-ins for the actuator and contact collaborators,
//! and deterministic RNG setup.

pub mod fixtures;
pub mod mocks;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{default_engine_config, duck_robot, fast_engine_config, walking_engine};
pub use mocks::{FailingActuator, RecordingActuator, ScriptedContacts};
pub use rng::{random_command, seeded_rng};
