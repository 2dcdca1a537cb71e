// ASCII command frames for the motor controller firmware
//
// Frame formats (no terminator, no checksum):
//   M<slot><dir><ddd>       drive one motor
//   MSA(<dir><ddd>){8}      drive all motors, physical order
//   SM<slot>                stop one motor
//   STP                     stop all motors

use std::fmt;

use super::mixer::NUM_MOTORS;

/// Largest magnitude the firmware accepts in a `<ddd>` field
pub const MAX_MAGNITUDE: u16 = 999;

/// Length of an `MSA` frame: prefix + 8 x (direction + 3 digits)
pub const DRIVE_ALL_FRAME_LEN: usize = 3 + NUM_MOTORS * 4;

const DRIVE_ALL_PREFIX: &[u8] = b"MSA";
const STOP_ALL: &[u8] = b"STP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn as_byte(self) -> u8 {
        match self {
            Direction::Forward => b'F',
            Direction::Reverse => b'R',
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'F' => Some(Direction::Forward),
            b'R' => Some(Direction::Reverse),
            _ => None,
        }
    }
}

/// Sign-split, saturated drive value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalDrive {
    pub magnitude: u16,
    pub direction: Direction,
}

impl PhysicalDrive {
    /// Split a signed magnitude into direction and a magnitude rounded, then
    /// clamped to 999. The direction follows the sign before rounding.
    pub fn from_signed(value: f64) -> Self {
        let direction = if value < 0.0 {
            Direction::Reverse
        } else {
            Direction::Forward
        };
        let magnitude = value.abs().round().min(f64::from(MAX_MAGNITUDE)) as u16;
        Self {
            magnitude,
            direction,
        }
    }

    pub fn stopped() -> Self {
        Self::from_signed(0.0)
    }
}

/// A complete command frame, ready to be written to the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    fn with_prefix(prefix: &[u8], capacity: usize) -> Self {
        let mut bytes = Vec::with_capacity(capacity);
        bytes.extend_from_slice(prefix);
        Self { bytes }
    }

    /// Append `<dir><ddd>`, one ASCII digit per position
    fn push_drive(&mut self, drive: PhysicalDrive) {
        let m = drive.magnitude;
        self.bytes.push(drive.direction.as_byte());
        self.bytes.push(b'0' + (m / 100) as u8);
        self.bytes.push(b'0' + ((m % 100) / 10) as u8);
        self.bytes.push(b'0' + (m % 10) as u8);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Frames are built from ASCII only
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

/// Drive a single motor. `slot_number` is 1-based.
pub fn encode_drive(slot_number: u8, magnitude: f64) -> Frame {
    let prefix = format!("M{}", slot_number);
    let mut frame = Frame::with_prefix(prefix.as_bytes(), prefix.len() + 4);
    frame.push_drive(PhysicalDrive::from_signed(magnitude));
    frame
}

/// Drive all motors, values given in physical order
pub fn encode_drive_all(magnitudes: &[f64; NUM_MOTORS]) -> Frame {
    let mut frame = Frame::with_prefix(DRIVE_ALL_PREFIX, DRIVE_ALL_FRAME_LEN);
    for &magnitude in magnitudes {
        frame.push_drive(PhysicalDrive::from_signed(magnitude));
    }
    frame
}

/// Stop a single motor. `slot_number` is 1-based.
pub fn encode_stop(slot_number: u8) -> Frame {
    Frame {
        bytes: format!("SM{}", slot_number).into_bytes(),
    }
}

pub fn encode_stop_all() -> Frame {
    Frame {
        bytes: STOP_ALL.to_vec(),
    }
}

/// Error parsing a frame with the firmware grammar
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("Invalid slot number in {0:?}")]
    InvalidSlot(String),

    #[error("Invalid drive field {field:?} in {frame:?}")]
    InvalidDrive { frame: String, field: String },

    #[error("Expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
}

/// A command as the firmware reads it back off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareCommand {
    Drive { slot: u8, drive: PhysicalDrive },
    DriveAll([PhysicalDrive; NUM_MOTORS]),
    Stop { slot: u8 },
    StopAll,
}

impl FirmwareCommand {
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        let text = String::from_utf8_lossy(bytes).into_owned();

        if bytes == STOP_ALL {
            return Ok(FirmwareCommand::StopAll);
        }

        if let Some(rest) = bytes.strip_prefix(DRIVE_ALL_PREFIX) {
            if bytes.len() != DRIVE_ALL_FRAME_LEN {
                return Err(FrameError::Length {
                    expected: DRIVE_ALL_FRAME_LEN,
                    got: bytes.len(),
                });
            }
            let mut drives = [PhysicalDrive::stopped(); NUM_MOTORS];
            for (drive, field) in drives.iter_mut().zip(rest.chunks_exact(4)) {
                *drive = parse_drive(field).ok_or_else(|| FrameError::InvalidDrive {
                    frame: text.clone(),
                    field: String::from_utf8_lossy(field).into_owned(),
                })?;
            }
            return Ok(FirmwareCommand::DriveAll(drives));
        }

        if let Some(rest) = bytes.strip_prefix(b"SM") {
            let slot = parse_slot(rest).ok_or_else(|| FrameError::InvalidSlot(text.clone()))?;
            return Ok(FirmwareCommand::Stop { slot });
        }

        if let Some(rest) = bytes.strip_prefix(b"M") {
            // Slot digits run up to the direction byte; the last 4 bytes are the drive field
            if rest.len() < 5 {
                return Err(FrameError::InvalidSlot(text));
            }
            let (slot_digits, field) = rest.split_at(rest.len() - 4);
            let slot =
                parse_slot(slot_digits).ok_or_else(|| FrameError::InvalidSlot(text.clone()))?;
            let drive = parse_drive(field).ok_or_else(|| FrameError::InvalidDrive {
                frame: text.clone(),
                field: String::from_utf8_lossy(field).into_owned(),
            })?;
            return Ok(FirmwareCommand::Drive { slot, drive });
        }

        Err(FrameError::UnknownCommand(text))
    }
}

fn parse_slot(digits: &[u8]) -> Option<u8> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn parse_drive(field: &[u8]) -> Option<PhysicalDrive> {
    let (&dir, digits) = field.split_first()?;
    if digits.len() != 3 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let magnitude = digits
        .iter()
        .fold(0u16, |acc, &d| acc * 10 + u16::from(d - b'0'));
    Some(PhysicalDrive {
        magnitude,
        direction: Direction::from_byte(dir)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_frame() {
        assert_eq!(encode_drive(3, 42.0).as_bytes(), b"M3F042");
        assert_eq!(encode_drive(1, 7.0).as_bytes(), b"M1F007");
        assert_eq!(encode_drive(8, -120.0).as_bytes(), b"M8R120");
        assert_eq!(encode_drive(4, 0.0).as_bytes(), b"M4F000");
    }

    #[test]
    fn test_drive_saturates() {
        assert_eq!(encode_drive(5, 999_999.0).as_bytes(), b"M5F999");
        assert_eq!(encode_drive(5, -1000.0).as_bytes(), b"M5R999");
        assert_eq!(encode_drive(5, f64::MIN).as_bytes(), b"M5R999");
        assert_eq!(encode_drive(5, 999.0).as_bytes(), b"M5F999");
    }

    #[test]
    fn test_drive_field_is_always_ascii_digits() {
        for magnitude in -1200..=1200 {
            let frame = encode_drive(2, f64::from(magnitude));
            assert_eq!(frame.len(), 6);
            assert!(frame.as_bytes()[3..].iter().all(u8::is_ascii_digit));
        }
    }

    #[test]
    fn test_stop_frames() {
        assert_eq!(encode_stop(2).as_bytes(), b"SM2");
        assert_eq!(encode_stop(3).to_string(), "SM3");
        assert_eq!(encode_stop_all().as_bytes(), b"STP");
    }

    #[test]
    fn test_drive_all_stopped() {
        let frame = encode_drive_all(&[0.0; NUM_MOTORS]);
        assert_eq!(frame.len(), DRIVE_ALL_FRAME_LEN);
        assert_eq!(frame.len(), 35);
        assert_eq!(frame.to_string(), format!("MSA{}", "F000".repeat(8)));
    }

    #[test]
    fn test_drive_all_mixed() {
        let frame = encode_drive_all(&[1.0, -2.0, 30.0, -400.0, 999.0, -5000.0, 0.0, 12.0]);
        assert_eq!(
            frame.to_string(),
            "MSAF001R002F030R400F999R999F000F012"
        );
    }

    #[test]
    fn test_physical_drive_split() {
        assert_eq!(
            PhysicalDrive::from_signed(-17.0),
            PhysicalDrive {
                magnitude: 17,
                direction: Direction::Reverse
            }
        );
        assert_eq!(PhysicalDrive::from_signed(0.0).direction, Direction::Forward);
    }

    #[test]
    fn test_direction_follows_unrounded_sign() {
        assert_eq!(encode_drive(1, -0.3).as_bytes(), b"M1R000");
        assert_eq!(encode_drive(1, 0.3).as_bytes(), b"M1F000");
        assert_eq!(encode_drive(1, -0.0).as_bytes(), b"M1F000");
        assert_eq!(encode_drive(1, -41.6).as_bytes(), b"M1R042");
        assert_eq!(encode_drive(1, 998.7).as_bytes(), b"M1F999");
    }

    #[test]
    fn test_parse_recovers_clamped_drive() {
        for value in [-5000.0, -999.0, -42.0, -1.0, 0.0, 1.0, 42.0, 998.0, 999.0, 1000.0, 123_456.0] {
            let frame = encode_drive(6, value);
            let parsed = FirmwareCommand::parse(frame.as_bytes()).unwrap();
            assert_eq!(
                parsed,
                FirmwareCommand::Drive {
                    slot: 6,
                    drive: PhysicalDrive::from_signed(value)
                }
            );
        }
    }

    #[test]
    fn test_parse_drive_all() {
        let values = [5.0, -5.0, 1500.0, -1500.0, 0.0, 10.0, -100.0, 999.0];
        let parsed = FirmwareCommand::parse(encode_drive_all(&values).as_bytes()).unwrap();
        assert_eq!(
            parsed,
            FirmwareCommand::DriveAll(values.map(PhysicalDrive::from_signed))
        );
    }

    #[test]
    fn test_parse_stops() {
        assert_eq!(
            FirmwareCommand::parse(b"SM7"),
            Ok(FirmwareCommand::Stop { slot: 7 })
        );
        assert_eq!(FirmwareCommand::parse(b"STP"), Ok(FirmwareCommand::StopAll));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        // Multi-character digit fields are not part of the grammar
        assert!(FirmwareCommand::parse(b"M3F485250").is_err());
        assert!(FirmwareCommand::parse(b"M3X042").is_err());
        assert!(FirmwareCommand::parse(b"MSAF000").is_err());
        assert!(FirmwareCommand::parse(b"SM").is_err());
        assert!(FirmwareCommand::parse(b"XYZ").is_err());
    }
}
