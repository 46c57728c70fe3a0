//! Validated image dimensions.
//!
//! A [`Dimensions`] can only be constructed through [`Dimensions::validate`],
//! which enforces the invariant from the data model: `1 <= width <=
//! MAX_IMG_WIDTH`, `1 <= height <= MAX_IMG_HEIGHT`, depth fixed at 8 bits.
//! Values failing this invariant must never reach an allocator or an
//! external process — that's the whole reason this type exists instead of a
//! bare `(u32, u32)`.

use crate::{
    constants::{CHANNELS, DEPTH, MAX_IMG_HEIGHT, MAX_IMG_WIDTH},
    error::SanitizeError,
};

/// Validated, wire-derived image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Validate a pair of untrusted integers against the dimension
    /// invariant.
    ///
    /// This is the one and only way to obtain a [`Dimensions`] from
    /// attacker-controlled input. Depth is always 8 bits/channel, 3
    /// channels (RGB, no alpha) — it is not negotiated on the wire.
    pub fn validate(untrusted_width: i64, untrusted_height: i64) -> Result<Self, SanitizeError> {
        let width_ok = (1..=i64::from(MAX_IMG_WIDTH)).contains(&untrusted_width);
        let height_ok = (1..=i64::from(MAX_IMG_HEIGHT)).contains(&untrusted_height);

        if width_ok && height_ok {
            Ok(Dimensions {
                width: untrusted_width as u32,
                height: untrusted_height as u32,
            })
        } else {
            Err(SanitizeError::DimensionError(format!(
                "{untrusted_width}x{untrusted_height} outside allowed range 1..={MAX_IMG_WIDTH} x 1..={MAX_IMG_HEIGHT}"
            )))
        }
    }

    /// Depth in bits/channel. Always 8.
    pub fn depth(&self) -> u8 {
        DEPTH
    }

    /// Size, in bytes, of the raw interleaved RGB payload that follows this
    /// dimension's dim line on the wire.
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(CHANNELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimum_dimensions() {
        let dim = Dimensions::validate(1, 1).unwrap();
        assert_eq!(dim.width, 1);
        assert_eq!(dim.height, 1);
        assert_eq!(dim.byte_size(), 3);
    }

    #[test]
    fn accepts_maximum_dimensions() {
        let dim = Dimensions::validate(10_000, 10_000).unwrap();
        assert_eq!(dim.byte_size(), 10_000 * 10_000 * 3);
    }

    #[test]
    fn rejects_zero_width() {
        assert!(Dimensions::validate(0, 100).is_err());
    }

    #[test]
    fn rejects_oversize_width() {
        // The literal "oversize_dim_attack" scenario from the test plan.
        let err = Dimensions::validate(20_000, 20_000).unwrap_err();
        assert!(matches!(err, SanitizeError::DimensionError(_)));
    }

    #[test]
    fn rejects_negative_values() {
        assert!(Dimensions::validate(-1, 100).is_err());
        assert!(Dimensions::validate(100, -1).is_err());
    }

    #[test]
    fn rejects_width_just_over_max() {
        assert!(Dimensions::validate(10_001, 100).is_err());
        assert!(Dimensions::validate(100, 10_001).is_err());
    }
}
