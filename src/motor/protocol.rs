// Serial link to the motor controller
//
// Commands are raw ASCII frames (see `command`). Telemetry uses a small
// binary request/response protocol:
//   Packet format: [0xAA, 0x55, ID, Length, Payload..., Checksum]
//   Checksum = !(ID + Length + sum(Payload)) & 0xFF

use serialport::{self, ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// Default serial configuration for the motor controller
pub const DEFAULT_BAUDRATE: u32 = 9600;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Packet sync bytes
const SYNC: [u8; 2] = [0xAA, 0x55];

/// Bytes discarded while hunting for sync before giving up
const MAX_RESYNC_BYTES: usize = 64;

/// Packets with the wrong id skipped in one exchange before giving up
const MAX_STALE_MESSAGES: usize = 4;

/// Message identifiers
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    RequestMessage = 0x01,
    MotorRpmLow = 0x10,
    MotorRpmHigh = 0x11,
}

/// Payload of a `RequestMessage` packet: which message the controller should send back
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCode {
    RpmLow = 0x00,
    RpmHigh = 0x01,
}

/// Error types for the motor controller link
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout waiting for {expected:?}")]
    Timeout { expected: MessageId },

    #[error("Invalid response while waiting for {expected:?}: {reason}")]
    InvalidResponse { expected: MessageId, reason: String },

    #[error("Checksum mismatch in message 0x{id:02X}")]
    ChecksumMismatch { id: u8 },

    #[error("Expected {expected:?}, got message 0x{got:02X}")]
    UnexpectedMessage { expected: MessageId, got: u8 },
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Byte channel to the motor controller
///
/// All access is serialized by the owner; implementations block up to
/// their configured timeout.
pub trait Transport {
    /// Write `bytes` verbatim
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Request a message and return the payload of the reply
    fn exchange(&mut self, request: RequestCode, expected: MessageId) -> Result<Vec<u8>>;
}

/// Calculate checksum for a packet (excluding sync bytes)
fn checksum(data: &[u8]) -> u8 {
    let sum: u16 = data.iter().map(|&b| b as u16).sum();
    (!sum & 0xFF) as u8
}

/// Build a packet with sync bytes and checksum
pub fn build_packet(id: MessageId, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(5 + payload.len());

    packet.extend_from_slice(&SYNC);
    packet.push(id as u8);
    packet.push(payload.len() as u8);
    packet.extend_from_slice(payload);

    let checksum_data = &packet[2..];
    packet.push(checksum(checksum_data));

    packet
}

/// Byte port a `SerialTransport` runs over
pub trait Port: Read + Write {
    /// Discard bytes received but not yet read
    fn clear_input(&mut self) -> std::io::Result<()>;
}

impl Port for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> std::io::Result<()> {
        (**self).clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// Transport over a serial port (or anything else that implements `Port`)
pub struct SerialTransport<P = Box<dyn SerialPort>> {
    port: P,
}

impl SerialTransport {
    /// Open the motor controller's serial device
    pub fn open(port_name: &str, baudrate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(port_name, baudrate).timeout(timeout).open()?;
        Ok(Self { port })
    }
}

impl<P: Port> SerialTransport<P> {
    pub fn from_port(port: P) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    fn read_exact(&mut self, buf: &mut [u8], expected: MessageId) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                LinkError::Timeout { expected }
            } else {
                LinkError::Io(e)
            }
        })
    }

    /// Consume bytes up to and including the next sync pair
    fn sync(&mut self, expected: MessageId) -> Result<()> {
        let mut window = [0u8; 2];
        self.read_exact(&mut window, expected)?;

        let mut discarded = 0;
        while window != SYNC {
            if discarded == MAX_RESYNC_BYTES {
                return Err(LinkError::InvalidResponse {
                    expected,
                    reason: format!("No sync within {} bytes", MAX_RESYNC_BYTES),
                });
            }
            let mut next = [0u8; 1];
            self.read_exact(&mut next, expected)?;
            window = [window[1], next[0]];
            discarded += 1;
        }

        if discarded > 0 {
            debug!("Discarded {} bytes before sync", discarded);
        }
        Ok(())
    }

    /// Read response packets until one carries `expected`, and return its payload.
    /// Complete packets with another id are stale replies and are skipped.
    fn read_message(&mut self, expected: MessageId) -> Result<Vec<u8>> {
        let mut skipped = 0;
        loop {
            self.sync(expected)?;

            let mut id_length = [0u8; 2];
            self.read_exact(&mut id_length, expected)?;
            let [id, length] = id_length;

            // Payload plus trailing checksum
            let mut remaining = vec![0u8; length as usize + 1];
            self.read_exact(&mut remaining, expected)?;

            let mut checksum_data = vec![id, length];
            checksum_data.extend_from_slice(&remaining[..length as usize]);
            if checksum(&checksum_data) != remaining[length as usize] {
                return Err(LinkError::ChecksumMismatch { id });
            }

            if id == expected as u8 {
                remaining.truncate(length as usize);
                return Ok(remaining);
            }

            if skipped == MAX_STALE_MESSAGES {
                return Err(LinkError::UnexpectedMessage { expected, got: id });
            }
            debug!("Skipping stale message 0x{:02X} while waiting for {:?}", id, expected);
            skipped += 1;
        }
    }
}

impl<P: Port> Transport for SerialTransport<P> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn exchange(&mut self, request: RequestCode, expected: MessageId) -> Result<Vec<u8>> {
        // Replies that arrived after an earlier timeout must not answer this request
        self.port.clear_input()?;

        let packet = build_packet(MessageId::RequestMessage, &[request as u8]);
        debug!("Requesting {:?}, expecting {:?}", request, expected);
        self.write(&packet)?;
        self.read_message(expected)
    }
}
