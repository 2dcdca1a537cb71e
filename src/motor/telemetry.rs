// RPM telemetry acquisition
//
// A telemetry message carries at most 4 motor speeds, so the 8 readings are
// fetched as two banks (low = slots 0-3, high = slots 4-7) and reassembled
// in physical order. A fetch succeeds only if both banks arrive.

use tracing::debug;

use super::mixer::{NUM_MOTORS, Slot};
use super::protocol::{LinkError, MessageId, RequestCode, Transport};

/// Motor speeds carried by one telemetry message
pub const MOTORS_PER_BANK: usize = 4;

const SPEED_FIELD_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpmBank {
    Low,
    High,
}

impl RpmBank {
    /// Banks in reassembly order
    pub const ALL: [RpmBank; 2] = [RpmBank::Low, RpmBank::High];

    pub fn request_code(self) -> RequestCode {
        match self {
            RpmBank::Low => RequestCode::RpmLow,
            RpmBank::High => RequestCode::RpmHigh,
        }
    }

    pub fn message_id(self) -> MessageId {
        match self {
            RpmBank::Low => MessageId::MotorRpmLow,
            RpmBank::High => MessageId::MotorRpmHigh,
        }
    }

    /// Physical index of the bank's first motor
    pub fn first_index(self) -> usize {
        match self {
            RpmBank::Low => 0,
            RpmBank::High => MOTORS_PER_BANK,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("RPM {bank:?} bank exchange failed: {source}")]
    Exchange {
        bank: RpmBank,
        #[source]
        source: LinkError,
    },

    #[error("RPM {bank:?} bank payload has {len} bytes, expected {expected}")]
    Payload {
        bank: RpmBank,
        len: usize,
        expected: usize,
    },
}

/// One decoded RPM bank message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryMessage {
    pub bank: RpmBank,
    pub motor_speed: [i16; MOTORS_PER_BANK],
}

impl TelemetryMessage {
    pub const PAYLOAD_LEN: usize = MOTORS_PER_BANK * SPEED_FIELD_LEN;

    /// Decode 4 little-endian signed speeds
    pub fn decode(bank: RpmBank, payload: &[u8]) -> Result<Self, TelemetryError> {
        if payload.len() != Self::PAYLOAD_LEN {
            return Err(TelemetryError::Payload {
                bank,
                len: payload.len(),
                expected: Self::PAYLOAD_LEN,
            });
        }

        let mut motor_speed = [0i16; MOTORS_PER_BANK];
        for (speed, bytes) in motor_speed
            .iter_mut()
            .zip(payload.chunks_exact(SPEED_FIELD_LEN))
        {
            *speed = i16::from_le_bytes([bytes[0], bytes[1]]);
        }

        Ok(Self { bank, motor_speed })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.motor_speed
            .iter()
            .flat_map(|speed| speed.to_le_bytes())
            .collect()
    }
}

/// RPM readings for all motors, in physical order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RpmSamples([f64; NUM_MOTORS]);

impl RpmSamples {
    pub fn get(&self, slot: Slot) -> f64 {
        self.0[slot.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

/// Fetch one bank
pub fn fetch_bank<T: Transport + ?Sized>(
    transport: &mut T,
    bank: RpmBank,
) -> Result<TelemetryMessage, TelemetryError> {
    let payload = transport
        .exchange(bank.request_code(), bank.message_id())
        .map_err(|source| TelemetryError::Exchange { bank, source })?;
    TelemetryMessage::decode(bank, &payload)
}

/// Fetch both banks and reassemble all 8 readings.
///
/// Either bank failing fails the whole fetch; no partial sample set is returned.
pub fn fetch_rpms<T: Transport + ?Sized>(transport: &mut T) -> Result<RpmSamples, TelemetryError> {
    let mut rpms = [0.0; NUM_MOTORS];

    for bank in RpmBank::ALL {
        let message = fetch_bank(transport, bank)?;
        let start = bank.first_index();
        for (rpm, &speed) in rpms[start..start + MOTORS_PER_BANK]
            .iter_mut()
            .zip(&message.motor_speed)
        {
            *rpm = f64::from(speed);
        }
    }

    debug!("Motor RPMs: {:?}", rpms);
    Ok(RpmSamples(rpms))
}
