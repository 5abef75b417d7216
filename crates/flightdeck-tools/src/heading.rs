//! # 航向差归一化

/// 把原始航向差归一化到 `[-180, 180]`
///
/// 先按 360 取截断余数，再把超出范围的值折回。
/// 多出的整圈会被消去：`720 → 0`，`540 → 180`，`-181 → 179`。
///
/// # 边界 ±180
///
/// 恰为半圈时保留截断余数的符号：`180 → 180`，`-180 → -180`，`540 → 180`，`-540 → -180`。
/// 不把 `+180` 统一成 `-180`：那样会与 `540 → 180` 矛盾，这里以后者为准。
///
/// ```rust
/// use flightdeck_tools::normalize_heading_delta;
///
/// assert_eq!(normalize_heading_delta(10.0 - 350.0), 20.0);
/// assert_eq!(normalize_heading_delta(350.0 - 10.0), -20.0);
/// ```
pub fn normalize_heading_delta(delta: f64) -> f64 {
    let r = delta % 360.0;
    if r > 180.0 {
        r - 360.0
    } else if r < -180.0 {
        r + 360.0
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossing_north() {
        // 350° → 10°：右转 20°
        assert_eq!(normalize_heading_delta(10.0 - 350.0), 20.0);
        // 10° → 350°：左转 20°
        assert_eq!(normalize_heading_delta(350.0 - 10.0), -20.0);
    }

    #[test]
    fn test_reference_table() {
        let cases = [
            (181.0, -179.0),
            (-181.0, 179.0),
            (360.0, 0.0),
            (720.0, 0.0),
            (540.0, 180.0),
            (-180.0, -180.0),
            (0.0, 0.0),
            (90.0, 90.0),
            (-90.0, -90.0),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_heading_delta(raw), expected, "raw = {raw}");
        }
    }

    #[test]
    fn test_half_turn_keeps_sign() {
        assert_eq!(normalize_heading_delta(180.0), 180.0);
        assert_eq!(normalize_heading_delta(-180.0), -180.0);
        assert_eq!(normalize_heading_delta(540.0), 180.0);
        assert_eq!(normalize_heading_delta(-540.0), -180.0);
    }

    #[test]
    fn test_many_extra_turns() {
        assert_eq!(normalize_heading_delta(3600.0 + 45.0), 45.0);
        assert_eq!(normalize_heading_delta(-3600.0 - 45.0), -45.0);
        assert_eq!(normalize_heading_delta(7.0 * 360.0 + 200.0), -160.0);
    }
}
