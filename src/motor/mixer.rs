// Thrust mixing for the 8-thruster vehicle
// Maps logical actuator slots to physical indices and corrects each slot's
// sign/scale for its mounting orientation before a command is framed.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Number of actuators on the motor controller
pub const NUM_MOTORS: usize = 8;

/// Logical actuator slots, one per physical thruster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    SurgeRight,
    SurgeLeft,
    LateralFront,
    LateralBack,
    HeaveFrontRight,
    HeaveFrontLeft,
    HeaveBackRight,
    HeaveBackLeft,
}

impl Slot {
    /// All slots in physical order (index 0..8)
    pub const ALL: [Slot; NUM_MOTORS] = [
        Slot::SurgeRight,
        Slot::SurgeLeft,
        Slot::LateralFront,
        Slot::LateralBack,
        Slot::HeaveFrontRight,
        Slot::HeaveFrontLeft,
        Slot::HeaveBackRight,
        Slot::HeaveBackLeft,
    ];

    /// Physical index in [0, 8), used for `MSA` frames and RPM reassembly
    pub const fn index(self) -> usize {
        match self {
            Slot::SurgeRight => 0,
            Slot::SurgeLeft => 1,
            Slot::LateralFront => 2,
            Slot::LateralBack => 3,
            Slot::HeaveFrontRight => 4,
            Slot::HeaveFrontLeft => 5,
            Slot::HeaveBackRight => 6,
            Slot::HeaveBackLeft => 7,
        }
    }

    /// 1-based motor number as it appears on the wire
    pub const fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    /// Look up a slot from its 1-based wire number
    pub fn from_number(number: u8) -> Option<Slot> {
        match number {
            1..=8 => Some(Self::ALL[number as usize - 1]),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Slot::SurgeRight => "surge_right",
            Slot::SurgeLeft => "surge_left",
            Slot::LateralFront => "lateral_front",
            Slot::LateralBack => "lateral_back",
            Slot::HeaveFrontRight => "heave_front_right",
            Slot::HeaveFrontLeft => "heave_front_left",
            Slot::HeaveBackRight => "heave_back_right",
            Slot::HeaveBackLeft => "heave_back_left",
        }
    }
}

/// Error loading a mixer configuration
#[derive(Debug, thiserror::Error)]
pub enum MixerError {
    #[error("Failed to read mixer file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid mixer file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Scale factor for {slot} is not finite: {value}")]
    NonFinite { slot: &'static str, value: f64 },
}

/// Per-slot scale factors as loaded from JSON. Every field is required.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixerConfig {
    pub surge_right: f64,
    pub surge_left: f64,
    pub lateral_front: f64,
    pub lateral_back: f64,
    pub heave_front_right: f64,
    pub heave_front_left: f64,
    pub heave_back_right: f64,
    pub heave_back_left: f64,
}

impl MixerConfig {
    fn factor(&self, slot: Slot) -> f64 {
        match slot {
            Slot::SurgeRight => self.surge_right,
            Slot::SurgeLeft => self.surge_left,
            Slot::LateralFront => self.lateral_front,
            Slot::LateralBack => self.lateral_back,
            Slot::HeaveFrontRight => self.heave_front_right,
            Slot::HeaveFrontLeft => self.heave_front_left,
            Slot::HeaveBackRight => self.heave_back_right,
            Slot::HeaveBackLeft => self.heave_back_left,
        }
    }
}

/// Immutable slot -> signed scale factor table
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTable {
    factors: [f64; NUM_MOTORS],
}

impl ScaleTable {
    /// Build a table by asking `factor` for every slot
    pub fn from_fn(factor: impl Fn(Slot) -> f64) -> Self {
        let mut factors = [0.0; NUM_MOTORS];
        for slot in Slot::ALL {
            factors[slot.index()] = factor(slot);
        }
        Self { factors }
    }

    pub fn factor(&self, slot: Slot) -> f64 {
        self.factors[slot.index()]
    }
}

impl Default for ScaleTable {
    /// Mounting corrections for the vehicle as built
    fn default() -> Self {
        Self::from_fn(|slot| match slot {
            Slot::SurgeRight => 1.35,
            Slot::SurgeLeft => -1.0,
            Slot::LateralFront => 1.0,
            Slot::LateralBack => -1.0,
            Slot::HeaveFrontRight => 1.0,
            Slot::HeaveFrontLeft => 1.0,
            Slot::HeaveBackRight => -1.0,
            Slot::HeaveBackLeft => 1.0,
        })
    }
}

impl TryFrom<MixerConfig> for ScaleTable {
    type Error = MixerError;

    fn try_from(config: MixerConfig) -> Result<Self, Self::Error> {
        for slot in Slot::ALL {
            let value = config.factor(slot);
            if !value.is_finite() {
                return Err(MixerError::NonFinite {
                    slot: slot.name(),
                    value,
                });
            }
        }
        Ok(Self::from_fn(|slot| config.factor(slot)))
    }
}

/// Converts logical drive requests into signed physical magnitudes
#[derive(Debug, Clone, Default)]
pub struct AxisMixer {
    table: ScaleTable,
}

impl AxisMixer {
    pub fn new(table: ScaleTable) -> Self {
        Self { table }
    }

    /// Load scale factors from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MixerError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, MixerError> {
        let config: MixerConfig = serde_json::from_str(text)?;
        Ok(Self::new(ScaleTable::try_from(config)?))
    }

    pub fn table(&self) -> &ScaleTable {
        &self.table
    }

    /// Signed physical magnitude for `requested` on `slot`. Left unrounded so
    /// the encoder can take the direction from the exact product.
    pub fn scale(&self, slot: Slot, requested: i32) -> f64 {
        f64::from(requested) * self.table.factor(slot)
    }

    /// Scale a full set of requests given in physical order
    pub fn scale_all(&self, requested: &[i32; NUM_MOTORS]) -> [f64; NUM_MOTORS] {
        Slot::ALL.map(|slot| self.scale(slot, requested[slot.index()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_MIXER: &str = r#"{
        "surge_right": 1.0, "surge_left": 1.0,
        "lateral_front": 1.0, "lateral_back": 1.0,
        "heave_front_right": 1.0, "heave_front_left": 1.0,
        "heave_back_right": 1.0, "heave_back_left": 1.0
    }"#;

    #[test]
    fn test_slot_indices_match_physical_order() {
        for (i, slot) in Slot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
            assert_eq!(Slot::from_number(slot.number()), Some(*slot));
        }
    }

    #[test]
    fn test_from_number_rejects_out_of_range() {
        assert_eq!(Slot::from_number(0), None);
        assert_eq!(Slot::from_number(9), None);
        assert_eq!(Slot::from_number(1), Some(Slot::SurgeRight));
        assert_eq!(Slot::from_number(8), Some(Slot::HeaveBackLeft));
    }

    #[test]
    fn test_default_table_covers_every_slot() {
        let table = ScaleTable::default();
        for slot in Slot::ALL {
            assert!(table.factor(slot) != 0.0, "{} has no factor", slot.name());
        }
        assert_eq!(table.factor(Slot::SurgeRight), 1.35);
        assert_eq!(table.factor(Slot::HeaveBackRight), -1.0);
    }

    #[test]
    fn test_scale_applies_sign() {
        let mixer = AxisMixer::default();
        assert!((mixer.scale(Slot::SurgeRight, 100) - 135.0).abs() < 1e-9);
        assert!((mixer.scale(Slot::SurgeRight, 3) - 4.05).abs() < 1e-9);
        assert_eq!(mixer.scale(Slot::SurgeLeft, 100), -100.0);
        assert_eq!(mixer.scale(Slot::LateralBack, -250), 250.0);
        assert_eq!(mixer.scale(Slot::HeaveFrontLeft, 0), 0.0);
    }

    #[test]
    fn test_small_negative_product_keeps_sign() {
        let mut config: MixerConfig = serde_json::from_str(UNIT_MIXER).unwrap();
        config.surge_right = 0.1;
        let mixer = AxisMixer::new(ScaleTable::try_from(config).unwrap());
        assert!(mixer.scale(Slot::SurgeRight, -3) < 0.0);
    }

    #[test]
    fn test_scale_is_pure() {
        let mixer = AxisMixer::default();
        for slot in Slot::ALL {
            assert_eq!(mixer.scale(slot, 517), mixer.scale(slot, 517));
        }
    }

    #[test]
    fn test_scale_all_uses_physical_order() {
        let mixer = AxisMixer::default();
        let scaled = mixer.scale_all(&[100; NUM_MOTORS]).map(f64::round);
        assert_eq!(
            scaled,
            [135.0, -100.0, 100.0, -100.0, 100.0, 100.0, -100.0, 100.0]
        );
    }

    #[test]
    fn test_mixer_from_json() {
        let mixer = AxisMixer::from_json(UNIT_MIXER).unwrap();
        for slot in Slot::ALL {
            assert_eq!(mixer.scale(slot, -42), -42.0);
        }
    }

    #[test]
    fn test_shipped_mixer_file_matches_default() {
        let mixer = AxisMixer::from_json(include_str!("../../config/mixer.json")).unwrap();
        assert_eq!(mixer.table(), &ScaleTable::default());
    }

    #[test]
    fn test_mixer_json_missing_slot_is_rejected() {
        let text = r#"{
            "surge_right": 1.0, "surge_left": 1.0,
            "lateral_front": 1.0, "lateral_back": 1.0,
            "heave_front_right": 1.0, "heave_front_left": 1.0,
            "heave_back_right": 1.0
        }"#;
        assert!(matches!(
            AxisMixer::from_json(text),
            Err(MixerError::Parse(_))
        ));
    }

    #[test]
    fn test_non_finite_factor_is_rejected() {
        let mut config: MixerConfig = serde_json::from_str(UNIT_MIXER).unwrap();
        config.lateral_back = f64::INFINITY;
        let err = ScaleTable::try_from(config).unwrap_err();
        assert!(matches!(
            err,
            MixerError::NonFinite {
                slot: "lateral_back",
                ..
            }
        ));
    }
}
