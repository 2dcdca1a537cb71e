// High-level motor controller driver
//
// Combines thrust mixing, frame encoding and the serial link to provide a
// simple API for commanding thrusters and reading back their RPMs.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::messages::MotorEnums;

use super::command::{Frame, encode_drive, encode_drive_all, encode_stop, encode_stop_all};
use super::mixer::{AxisMixer, NUM_MOTORS, Slot};
use super::protocol::{LinkError, SerialTransport, Transport};
use super::telemetry::{RpmSamples, TelemetryError, fetch_rpms};

/// Owns the link to the motor controller. Dropping it stops every motor.
pub struct MotorController<T: Transport> {
    transport: T,
    mixer: AxisMixer,
}

impl MotorController<SerialTransport> {
    /// Open the serial device and take ownership of the link
    pub fn open(
        port: &str,
        baudrate: u32,
        timeout: Duration,
        mixer: AxisMixer,
    ) -> Result<Self, LinkError> {
        info!("Connecting to motor controller on {} ({} baud)", port, baudrate);
        let transport = SerialTransport::open(port, baudrate, timeout)?;
        Ok(Self::new(transport, mixer))
    }
}

impl<T: Transport> MotorController<T> {
    pub fn new(transport: T, mixer: AxisMixer) -> Self {
        Self { transport, mixer }
    }

    fn send(&mut self, frame: Frame) -> Result<(), LinkError> {
        debug!("Sending frame {}", frame);
        self.transport.write(frame.as_bytes())
    }

    /// Drive one motor; `pwm` is mixed, then clamped to the firmware range
    pub fn set_motor_pwm(&mut self, slot: Slot, pwm: i32) -> Result<(), LinkError> {
        let magnitude = self.mixer.scale(slot, pwm);
        self.send(encode_drive(slot.number(), magnitude))
    }

    /// Drive all motors; `pwms` is indexed by physical slot
    pub fn set_all_motors_pwm(&mut self, pwms: &[i32; NUM_MOTORS]) -> Result<(), LinkError> {
        let magnitudes = self.mixer.scale_all(pwms);
        self.send(encode_drive_all(&magnitudes))
    }

    pub fn stop_motor(&mut self, slot: Slot) -> Result<(), LinkError> {
        self.send(encode_stop(slot.number()))
    }

    pub fn stop_all(&mut self) -> Result<(), LinkError> {
        info!("Stopping all motors");
        self.send(encode_stop_all())
    }

    /// Read current RPMs for all motors
    pub fn get_rpms(&mut self) -> Result<RpmSamples, TelemetryError> {
        fetch_rpms(&mut self.transport)
    }

    pub fn motor_enums(&self) -> MotorEnums {
        MotorEnums::default()
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Drop for MotorController<T> {
    fn drop(&mut self) {
        // Stop motors before the link closes with the transport
        if let Err(e) = self.stop_all() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
