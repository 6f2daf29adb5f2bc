use common::Money;
use serde::Serialize;

/// Recognized discount codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Coupon {
    Save10,
    Save20,
    Save30,
    Save40,
}

impl Coupon {
    /// Parses a code, ignoring case and surrounding whitespace.
    pub fn parse(code: &str) -> Option<Coupon> {
        match code.trim().to_ascii_uppercase().as_str() {
            "SAVE10" => Some(Coupon::Save10),
            "SAVE20" => Some(Coupon::Save20),
            "SAVE30" => Some(Coupon::Save30),
            "SAVE40" => Some(Coupon::Save40),
            _ => None,
        }
    }

    pub fn percent(&self) -> u32 {
        match self {
            Coupon::Save10 => 10,
            Coupon::Save20 => 20,
            Coupon::Save30 => 30,
            Coupon::Save40 => 40,
        }
    }

    /// Discounted total, never below zero. Unknown codes give no discount.
    pub fn apply(code: &str, total: Money) -> Money {
        let percent = Coupon::parse(code).map_or(0, |c| c.percent());
        total.percent_off(percent).floor_at_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_case_insensitive() {
        assert_eq!(Coupon::parse("save20"), Some(Coupon::Save20));
        assert_eq!(Coupon::parse(" Save40 "), Some(Coupon::Save40));
        assert_eq!(Coupon::parse("SAVE50"), None);
    }

    #[test]
    fn save20_on_one_hundred() {
        assert_eq!(
            Coupon::apply("SAVE20", Money::from_dollars(100)),
            Money::from_dollars(80)
        );
    }

    #[test]
    fn unknown_code_leaves_total() {
        assert_eq!(
            Coupon::apply("XYZ", Money::from_dollars(100)),
            Money::from_dollars(100)
        );
    }

    #[test]
    fn empty_total_stays_zero() {
        assert_eq!(Coupon::apply("SAVE40", Money::zero()), Money::zero());
    }
}
