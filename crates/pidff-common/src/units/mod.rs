//! Engineering value to device logical value conversion.
//!
//! Every field carries a logical range (what the bits hold) and a
//! physical range (what the values mean). Conversion maps linearly between
//! the two with exact integer arithmetic, after scaling the application
//! value by the field's unit exponent.

pub mod direction;

use pidff_hid_common::{field_mask, sign_extend};

use crate::field_map::FieldDescriptor;
use crate::usage::{Usage, pid};

/// How an application value is expressed before range mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// Dimensionless, scaled by `10^unit_exponent`.
    Plain,
    /// Milliseconds.
    Time,
    /// Hundredths of a degree; the descriptor exponent is ignored.
    Angle,
}

impl Quantity {
    pub fn for_usage(usage: Usage) -> Self {
        match usage {
            pid::DURATION
            | pid::START_DELAY
            | pid::SAMPLE_PERIOD
            | pid::TRIGGER_REPEAT_INTERVAL
            | pid::ATTACK_TIME
            | pid::FADE_TIME
            | pid::PERIOD => Self::Time,
            pid::DIRECTION | pid::PHASE => Self::Angle,
            _ => Self::Plain,
        }
    }
}

/// Milliseconds are the time base when a time field declares no unit.
const DEFAULT_TIME_EXPONENT: i32 = -3;

/// Converts between application values and one field's logical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitConverter {
    logical_min: i32,
    logical_max: i32,
    physical_min: i32,
    physical_max: i32,
    /// Power of ten taking an application value to physical units.
    scale: i32,
    bit_size: u32,
}

impl UnitConverter {
    pub fn for_field(field: &FieldDescriptor, quantity: Quantity) -> Self {
        let exponent = i32::from(field.unit_exponent);
        let scale = match quantity {
            Quantity::Plain => exponent,
            Quantity::Time if field.unit == 0 && exponent == 0 => 0,
            Quantity::Time => DEFAULT_TIME_EXPONENT - exponent,
            Quantity::Angle => 0,
        };
        let (physical_min, physical_max) = if field.physical_min == 0 && field.physical_max == 0 {
            (field.logical_min, field.logical_max)
        } else {
            (field.physical_min, field.physical_max)
        };
        Self {
            logical_min: field.logical_min,
            logical_max: field.logical_max,
            physical_min,
            physical_max,
            scale: scale.clamp(-18, 18),
            bit_size: field.bit_size,
        }
    }

    pub fn logical_range(&self) -> (i32, i32) {
        (self.logical_min, self.logical_max)
    }

    pub fn is_signed(&self) -> bool {
        self.logical_min < 0
    }

    /// Rational factor `num / den` taking application values to physical units.
    fn ratio(&self) -> (i128, i128) {
        let power = 10i128.pow(self.scale.unsigned_abs());
        if self.scale >= 0 { (power, 1) } else { (1, power) }
    }

    fn spans(&self) -> Option<(i128, i128)> {
        let logical = i128::from(self.logical_max) - i128::from(self.logical_min);
        let physical = i128::from(self.physical_max) - i128::from(self.physical_min);
        (logical > 0 && physical > 0).then_some((logical, physical))
    }

    /// Application value to logical value.
    ///
    /// The value is clamped to the physical range and the mapped result
    /// rounds toward the logical minimum. Degenerate ranges yield the
    /// logical minimum.
    pub fn to_device(&self, value: i64) -> i32 {
        let Some((logical_span, physical_span)) = self.spans() else {
            return self.logical_min;
        };
        let (num, den) = self.ratio();
        let low = i128::from(self.physical_min) * den;
        let high = i128::from(self.physical_max) * den;
        let scaled = (i128::from(value) * num).clamp(low, high);
        let step = (scaled - low) * logical_span / (physical_span * den);
        let logical = (i128::from(self.logical_min) + step)
            .clamp(i128::from(self.logical_min), i128::from(self.logical_max));
        i32::try_from(logical).unwrap_or(self.logical_min)
    }

    /// Smallest application value that [`to_device`](Self::to_device) maps
    /// onto `logical`.
    ///
    /// When rounding up would leave the physical range, the value just
    /// below the threshold is used instead; it clamps onto the same step.
    pub fn from_device(&self, logical: i32) -> i64 {
        let Some((logical_span, physical_span)) = self.spans() else {
            return i64::from(self.physical_min);
        };
        let (num, den) = self.ratio();
        let logical = logical.clamp(self.logical_min, self.logical_max);
        let step = i128::from(logical) - i128::from(self.logical_min);
        let numerator = den * (step * physical_span + i128::from(self.physical_min) * logical_span);
        let denominator = logical_span * num;
        let value = saturate(ceil_div(numerator, denominator));
        if self.to_device(value) == logical {
            value
        } else {
            saturate(numerator.div_euclid(denominator))
        }
    }

    /// Logical value as the bit pattern stored in the report.
    pub fn logical_to_raw(&self, logical: i32) -> u32 {
        u32::from_ne_bytes(logical.to_ne_bytes()) & field_mask(self.bit_size)
    }

    /// Bit pattern read from a report as a logical value.
    pub fn raw_to_logical(&self, raw: u32) -> i32 {
        if self.is_signed() {
            sign_extend(raw, self.bit_size)
        } else {
            i32::try_from(raw & field_mask(self.bit_size)).unwrap_or(i32::MAX)
        }
    }

    pub fn to_raw(&self, value: i64) -> u32 {
        self.logical_to_raw(self.to_device(value))
    }

    pub fn from_raw(&self, raw: u32) -> i64 {
        self.from_device(self.raw_to_logical(raw))
    }

    /// Every bit set; PID reads this as "infinite" in time fields.
    pub fn all_ones_raw(&self) -> u32 {
        field_mask(self.bit_size)
    }

    /// Raw value outside the logical range, read as "no value".
    pub fn null_raw(&self) -> u32 {
        if self.logical_min > 0 { 0 } else { self.all_ones_raw() }
    }
}

fn ceil_div(numerator: i128, denominator: i128) -> i128 {
    -((-numerator).div_euclid(denominator))
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}
