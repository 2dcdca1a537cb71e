// Motor control module for the thruster controller
//
// Provides:
// - Thrust mixing (logical slot -> signed physical magnitude)
// - ASCII command frame encoding
// - Serial link and RPM telemetry protocol
// - High-level motor controller API

pub mod command;
mod driver;
pub mod mixer;
pub mod protocol;
pub mod telemetry;

pub use driver::MotorController;
pub use mixer::{AxisMixer, MixerError, NUM_MOTORS, ScaleTable, Slot};
pub use protocol::{LinkError, SerialTransport, Transport};
pub use telemetry::{RpmSamples, TelemetryError};
