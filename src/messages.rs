// Message types exchanged with the runtime over zenoh

use serde::{Deserialize, Serialize};

use crate::motor::{NUM_MOTORS, RpmSamples, Slot};

/// Drive one motor. `motor_num` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotorRequest {
    pub motor_num: u8,
    pub pwm: i32,
}

/// Drive all motors, indexed by physical slot (see `MotorEnums`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotorsRequest {
    pub pwms: [i32; NUM_MOTORS],
}

/// Stop one motor. `motor_num` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopMotorRequest {
    pub motor_num: u8,
}

/// Reply to every command query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// RPMs for all motors, in physical order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpmReport {
    pub rpms: Vec<f64>,
}

impl From<&RpmSamples> for RpmReport {
    fn from(samples: &RpmSamples) -> Self {
        Self {
            rpms: samples.to_vec(),
        }
    }
}

/// Slot name -> physical index map, for callers building `MotorsRequest`s
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MotorEnums {
    pub surge_right_idx: usize,
    pub surge_left_idx: usize,
    pub lateral_front_idx: usize,
    pub lateral_back_idx: usize,
    pub heave_front_right_idx: usize,
    pub heave_front_left_idx: usize,
    pub heave_back_right_idx: usize,
    pub heave_back_left_idx: usize,
}

impl Default for MotorEnums {
    fn default() -> Self {
        Self {
            surge_right_idx: Slot::SurgeRight.index(),
            surge_left_idx: Slot::SurgeLeft.index(),
            lateral_front_idx: Slot::LateralFront.index(),
            lateral_back_idx: Slot::LateralBack.index(),
            heave_front_right_idx: Slot::HeaveFrontRight.index(),
            heave_front_left_idx: Slot::HeaveFrontLeft.index(),
            heave_back_right_idx: Slot::HeaveBackRight.index(),
            heave_back_left_idx: Slot::HeaveBackLeft.index(),
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    TelemetryFailed,
}
