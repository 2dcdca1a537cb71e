// Defaults, topics, command line
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::motor::protocol::{DEFAULT_BAUDRATE, DEFAULT_TIMEOUT_MS};

// Default telemetry publish rate
pub const LOOP_HZ: u64 = 10;

// Serial port for the motor controller
pub const MOTOR_PORT: &str = "/dev/ttyUSB0";

// Zenoh keys: command services (queryables)
pub const SRV_SET_MOTOR: &str = "thrusters/srv/set_motor";
pub const SRV_SET_ALL_MOTORS: &str = "thrusters/srv/set_all_motors";
pub const SRV_STOP_MOTOR: &str = "thrusters/srv/stop_motor";
pub const SRV_STOP_ALL: &str = "thrusters/srv/stop_all";
pub const SRV_MOTOR_ENUMS: &str = "thrusters/srv/motor_enums";

// Zenoh keys: published state
pub const TOPIC_RPMS: &str = "thrusters/state/rpms";
pub const TOPIC_HEALTH: &str = "thrusters/state/health";

/// Thruster motor controller runtime
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct Settings {
    /// Serial device of the motor controller
    #[arg(long, default_value = MOTOR_PORT)]
    pub port: String,

    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    pub baud_rate: u32,

    /// Serial read timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// RPM publish rate in Hz
    #[arg(long, default_value_t = LOOP_HZ, value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub loop_hz: u64,

    /// JSON file with per-slot scale factors (defaults to the built-in table)
    #[arg(long)]
    pub mixer: Option<PathBuf>,
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(1000 / self.loop_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::parse_from(["thruster-zenoh-runtime"]);
        assert_eq!(settings.port, MOTOR_PORT);
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.timeout(), Duration::from_millis(1000));
        assert_eq!(settings.tick_period(), Duration::from_millis(100));
        assert!(settings.mixer.is_none());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::parse_from([
            "thruster-zenoh-runtime",
            "--port",
            "/dev/ttyACM1",
            "--baud-rate",
            "115200",
            "--loop-hz",
            "50",
            "--mixer",
            "mixer.json",
        ]);
        assert_eq!(settings.port, "/dev/ttyACM1");
        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.tick_period(), Duration::from_millis(20));
        assert_eq!(settings.mixer, Some(PathBuf::from("mixer.json")));
    }

    #[test]
    fn test_zero_loop_rate_rejected() {
        assert!(Settings::try_parse_from(["thruster-zenoh-runtime", "--loop-hz", "0"]).is_err());
    }
}
