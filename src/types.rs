use serde::{Deserialize, Serialize};

use crate::constants::record::{DEFAULT_OPACITY, MAX_OPACITY, MIN_OPACITY, OPACITY_TOLERANCE};
use crate::error::StoreError;

fn default_opacity() -> f64 {
    DEFAULT_OPACITY
}

/// Where a signature overlay is drawn on a rendered page
/// Pixel units, origin at the top-left corner of the page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

impl PositionRecord {
    /// Record with the default opacity filled in
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            opacity: DEFAULT_OPACITY,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    /// Field-wise comparison used by read-back verification
    /// Integers must be identical, opacity within a small tolerance
    pub fn matches(&self, other: &PositionRecord) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
            && (self.opacity - other.opacity).abs() <= OPACITY_TOLERANCE
    }

    /// Reject records that can't be stored
    pub fn validate(&self) -> Result<(), StoreError> {
        if !self.opacity.is_finite() || !(MIN_OPACITY..=MAX_OPACITY).contains(&self.opacity) {
            return Err(StoreError::InvalidRecord {
                reason: format!(
                    "opacity {} outside {}..={}",
                    self.opacity, MIN_OPACITY, MAX_OPACITY
                ),
            });
        }
        Ok(())
    }
}

/// Caller-supplied record where opacity may be left out
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionInput {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl From<PositionInput> for PositionRecord {
    fn from(input: PositionInput) -> Self {
        PositionRecord {
            x: input.x,
            y: input.y,
            width: input.width,
            height: input.height,
            opacity: input.opacity.unwrap_or(DEFAULT_OPACITY),
        }
    }
}

impl From<PositionRecord> for PositionInput {
    fn from(record: PositionRecord) -> Self {
        PositionInput {
            x: record.x,
            y: record.y,
            width: record.width,
            height: record.height,
            opacity: Some(record.opacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_missing_opacity_defaults(
            x in any::<u32>(),
            y in any::<u32>(),
            width in any::<u32>(),
            height in any::<u32>()
        ) {
            let input = PositionInput { x, y, width, height, opacity: None };
            let record = PositionRecord::from(input);
            prop_assert_eq!(record.opacity, 0.7);
            prop_assert_eq!(
                (record.x, record.y, record.width, record.height),
                (x, y, width, height)
            );
            prop_assert_eq!(PositionRecord::new(x, y, width, height), record);
        }

        #[test]
        fn test_supplied_opacity_survives_conversion(
            x in any::<u32>(),
            opacity in 0.0f64..=1.0
        ) {
            let input = PositionInput { x, y: 0, width: 1, height: 1, opacity: Some(opacity) };
            let record = PositionRecord::from(input);
            prop_assert_eq!(record.opacity, opacity);
            prop_assert_eq!(PositionInput::from(record), input);
        }
    }

    #[test]
    fn test_supplied_opacity_kept() {
        let input = PositionInput { x: 1, y: 2, width: 3, height: 4, opacity: Some(0.25) };
        assert_eq!(PositionRecord::from(input).opacity, 0.25);
    }

    #[test]
    fn test_deserialize_without_opacity() {
        let record: PositionRecord =
            serde_json::from_str(r#"{"x":110,"y":190,"width":200,"height":60}"#).unwrap();
        assert_eq!(record, PositionRecord::new(110, 190, 200, 60));
    }

    #[test]
    fn test_matches_tolerates_float_noise() {
        let a = PositionRecord::new(10, 20, 30, 40).with_opacity(0.5);
        let b = a.with_opacity(0.5 + 1e-9);
        assert!(a.matches(&b));
        assert!(!a.matches(&a.with_opacity(0.51)));

        let mut moved = a;
        moved.x = 11;
        assert!(!a.matches(&moved));
    }

    #[test]
    fn test_validate_opacity_range() {
        assert!(PositionRecord::new(0, 0, 1, 1).with_opacity(0.0).validate().is_ok());
        assert!(PositionRecord::new(0, 0, 1, 1).with_opacity(1.0).validate().is_ok());
        assert!(PositionRecord::new(0, 0, 1, 1).with_opacity(1.5).validate().is_err());
        assert!(PositionRecord::new(0, 0, 1, 1).with_opacity(-0.1).validate().is_err());
        assert!(PositionRecord::new(0, 0, 1, 1).with_opacity(f64::NAN).validate().is_err());
    }
}
