//! Ordered event key with room for inserted sub-events

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SCALE: i64 = 1_000_000;
const SCALE_DIGITS: usize = 6;

/// Position of an event within its set.
///
/// Stored as a fixed-point integer with six decimal places, so `1.5` sorts
/// strictly between `1` and `2` and comparisons are exact. Serialized as a
/// JSON integer when whole and as a JSON number otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(i64);

impl Sequence {
    /// Whole-number sequence for values known to be small, such as counters.
    /// Saturates at the representable range; untrusted input goes through
    /// [`Sequence::checked_integer`].
    #[must_use]
    pub const fn from_integer(value: i64) -> Self {
        Self(value.saturating_mul(SCALE))
    }

    /// Whole-number sequence, or `None` beyond ±9_223_372_036_854
    #[must_use]
    pub const fn checked_integer(value: i64) -> Option<Self> {
        match value.checked_mul(SCALE) {
            Some(scaled) => Some(Self(scaled)),
            None => None,
        }
    }

    /// `whole + millionths / 1_000_000`
    #[must_use]
    pub const fn new(whole: i64, millionths: i64) -> Self {
        Self(whole.saturating_mul(SCALE).saturating_add(millionths))
    }

    /// Rebuild from the stored scaled integer
    #[must_use]
    pub const fn from_scaled(scaled: i64) -> Self {
        Self(scaled)
    }

    /// Scaled integer as stored in the database
    #[must_use]
    pub const fn scaled(self) -> i64 {
        self.0
    }

    /// Nearest representable sequence, or `None` for NaN and infinities
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * SCALE as f64).round();
        if scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    /// Parse decimal text such as `"12"`, `"3.5"` or `"-0.25"` exactly.
    ///
    /// More than six fractional digits fall back to rounding.
    #[must_use]
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        if fraction.len() > SCALE_DIGITS {
            return text.parse::<f64>().ok().and_then(Self::from_f64);
        }

        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let millionths: i64 = if fraction.is_empty() {
            0
        } else {
            format!("{fraction:0<SCALE_DIGITS$}").parse().ok()?
        };
        let magnitude = whole.checked_mul(SCALE)?.checked_add(millionths)?;
        Some(Self(if negative { -magnitude } else { magnitude }))
    }

    /// Integer part, rounded toward negative infinity
    #[must_use]
    pub const fn whole(self) -> i64 {
        self.0.div_euclid(SCALE)
    }

    /// True when there is no fractional part
    #[must_use]
    pub const fn is_integer(self) -> bool {
        self.0 % SCALE == 0
    }

    /// The first whole number strictly after this sequence
    #[must_use]
    pub const fn next_integer(self) -> Self {
        Self::from_integer(self.whole() + 1)
    }

    /// Lossy float form for JSON output
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

impl TryFrom<i64> for Sequence {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::checked_integer(value).ok_or_else(|| format!("sequence {value} is out of range"))
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let scale = SCALE.unsigned_abs();
        let whole = magnitude / scale;
        let fraction = magnitude % scale;
        if fraction == 0 {
            return write!(f, "{sign}{whole}");
        }
        let digits = format!("{fraction:0>SCALE_DIGITS$}");
        write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Sequence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s).ok_or_else(|| format!("invalid sequence: {s}"))
    }
}

impl Serialize for Sequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_integer() {
            serializer.serialize_i64(self.0 / SCALE)
        } else {
            serializer.serialize_f64(self.as_f64())
        }
    }
}

struct SequenceVisitor;

impl Visitor<'_> for SequenceVisitor {
    type Value = Sequence;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a number or a decimal string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Sequence, E> {
        Sequence::try_from(value).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Sequence, E> {
        i64::try_from(value)
            .ok()
            .and_then(Sequence::checked_integer)
            .ok_or_else(|| E::custom(format!("sequence {value} is out of range")))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Sequence, E> {
        Sequence::from_f64(value).ok_or_else(|| E::custom("sequence is not finite"))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Sequence, E> {
        Sequence::parse_decimal(value).ok_or_else(|| E::custom(format!("invalid sequence: {value}")))
    }
}

impl<'de> Deserialize<'de> for Sequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SequenceVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn half_step_sorts_between_neighbours() {
        let one = Sequence::from_integer(1);
        let half = Sequence::parse_decimal("1.5").unwrap();
        let two = Sequence::from_integer(2);
        assert!(one < half && half < two);

        let mut keys = vec![two, half, one, Sequence::new(1, 100_000)];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["1", "1.1", "1.5", "2"]);
    }

    #[test]
    fn decimal_text_is_exact() {
        assert_eq!(Sequence::parse_decimal("0.1").unwrap().scaled(), 100_000);
        assert_eq!(Sequence::parse_decimal("-0.25").unwrap().scaled(), -250_000);
        assert_eq!(Sequence::parse_decimal(".5").unwrap().scaled(), 500_000);
        assert_eq!(Sequence::parse_decimal("abc"), None);
        assert_eq!(Sequence::parse_decimal(""), None);
    }

    #[test]
    fn float_input_rounds_to_fixed_point() {
        assert_eq!(Sequence::from_f64(0.1 + 0.2).unwrap(), Sequence::new(0, 300_000));
        assert_eq!(Sequence::from_f64(f64::NAN), None);
    }

    #[test]
    fn whole_part_floors() {
        assert_eq!(Sequence::parse_decimal("7.6").unwrap().whole(), 7);
        assert_eq!(Sequence::parse_decimal("-0.5").unwrap().whole(), -1);
        assert_eq!(Sequence::from_integer(7).next_integer(), Sequence::from_integer(8));
    }

    #[test]
    fn serializes_whole_numbers_as_integers() {
        assert_eq!(serde_json::to_value(Sequence::from_integer(3)).unwrap(), json!(3));
        assert_eq!(serde_json::to_value(Sequence::new(3, 500_000)).unwrap(), json!(3.5));
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let from_int: Sequence = serde_json::from_value(json!(4)).unwrap();
        let from_float: Sequence = serde_json::from_value(json!(4.5)).unwrap();
        let from_text: Sequence = serde_json::from_value(json!("4.5")).unwrap();
        assert_eq!(from_int, Sequence::from_integer(4));
        assert_eq!(from_float, from_text);
    }

    #[test]
    fn oversized_integers_are_rejected_not_clamped() {
        let largest = i64::MAX / SCALE;
        assert!(Sequence::checked_integer(largest).is_some());
        assert_eq!(Sequence::checked_integer(largest + 1), None);
        assert!(Sequence::try_from(i64::MIN).is_err());

        assert!(serde_json::from_value::<Sequence>(json!(largest + 1)).is_err());
        assert!(serde_json::from_value::<Sequence>(json!(i64::MAX)).is_err());
        assert!(serde_json::from_value::<Sequence>(json!(u64::MAX)).is_err());
        assert!(serde_json::from_value::<Sequence>(json!("99999999999999")).is_err());
        let kept: Sequence = serde_json::from_value(json!(largest)).unwrap();
        assert_eq!(kept.whole(), largest);
    }
}
