//! Common depreciation utilities

use assetbook_core::Decimal;

/// Changes at or below this many currency units (0.01) are not written
pub fn write_epsilon() -> Decimal {
    Decimal::from_ratio(1, 100)
}

/// True when `a` and `b` differ by more than the write epsilon
pub fn exceeds_epsilon(a: &Decimal, b: &Decimal) -> bool {
    a.sub(b).abs() > write_epsilon()
}

/// Clamp into `[0, ceiling]`
pub fn clamp_to_base(value: Decimal, ceiling: &Decimal) -> Decimal {
    value.min_of(ceiling).max_of(&Decimal::zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exceeds_epsilon() {
        let a = Decimal::from_i64(1000);
        assert!(!exceeds_epsilon(&a, &Decimal::from_str("1000.01").unwrap()));
        assert!(exceeds_epsilon(&a, &Decimal::from_str("1000.02").unwrap()));
        assert!(exceeds_epsilon(&a, &Decimal::from_str("999.98").unwrap()));
    }

    #[test]
    fn test_clamp_to_base() {
        let base = Decimal::from_i64(500);
        assert_eq!(clamp_to_base(Decimal::from_i64(600), &base), base);
        assert!(clamp_to_base(Decimal::from_i64(-5), &base).is_zero());
        assert_eq!(clamp_to_base(Decimal::from_i64(42), &base), Decimal::from_i64(42));
    }
}
