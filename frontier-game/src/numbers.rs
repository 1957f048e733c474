//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Floor a f64 and clamp it to the u32 range, returning 0 for NaN or negative values.
#[must_use]
pub fn floor_f64_to_u32(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max = f64::from(u32::MAX);
    cast::<f64, u32>(value.min(max).floor()).unwrap_or(0)
}

/// Round a f64 and clamp it to the u32 range, returning 0 for NaN or negative values.
#[must_use]
pub fn round_f64_to_u32(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max = f64::from(u32::MAX);
    cast::<f64, u32>(value.min(max).round()).unwrap_or(0)
}

/// Floor a f64 and clamp it to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn floor_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).floor();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Floor a f64 into an index below `len`, returning 0 for empty ranges.
#[must_use]
pub fn floor_f64_to_index(value: f64, len: usize) -> usize {
    if len == 0 || value.is_nan() || value <= 0.0 {
        return 0;
    }
    let idx = cast::<f64, usize>(value.floor()).unwrap_or(0);
    idx.min(len - 1)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Convert usize to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert a non-negative f64 to u64 for millisecond counters, saturating on overflow.
#[must_use]
pub fn f64_to_u64_saturating(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    cast::<f64, u64>(value.floor()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_handles_negative_and_nan() {
        assert_eq!(floor_f64_to_u32(-3.2), 0);
        assert_eq!(floor_f64_to_u32(f64::NAN), 0);
        assert_eq!(floor_f64_to_u32(7.9), 7);
        assert_eq!(floor_f64_to_u32(f64::from(u32::MAX) * 4.0), u32::MAX);
    }

    #[test]
    fn rounding_matches_half_away_from_zero() {
        assert_eq!(round_f64_to_u32(2.5), 3);
        assert_eq!(round_f64_to_u32(2.49), 2);
        assert_eq!(floor_f64_to_i64(-1.5), -2);
        assert_eq!(floor_f64_to_i64(f64::INFINITY), 0);
    }

    #[test]
    fn index_helper_stays_in_bounds() {
        assert_eq!(floor_f64_to_index(3.99, 4), 3);
        assert_eq!(floor_f64_to_index(9.0, 4), 3);
        assert_eq!(floor_f64_to_index(0.5, 0), 0);
        assert_eq!(f64_to_u64_saturating(12.7), 12);
    }
}
