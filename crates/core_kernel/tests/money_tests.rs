//! Unit tests for the Money module
//!
//! Tests cover creation, rounding, arithmetic, the settlement tolerance,
//! and percentage breakdowns.

use core_kernel::{Money, MoneyError, PAID_TOLERANCE};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_creates_money_with_correct_amount() {
        let m = Money::new(dec!(100.50));
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_new_rounds_to_two_decimal_places() {
        let m = Money::new(dec!(100.12789));
        assert_eq!(m.amount(), dec!(100.13));
    }

    #[test]
    fn test_from_minor_converts_paise() {
        let m = Money::from_minor(10050);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_parse_accepts_decimal_strings() {
        assert_eq!(Money::parse(" 600.5 ").unwrap().amount(), dec!(600.50));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Money::parse("six hundred"), Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_zero_is_default() {
        assert_eq!(Money::default(), Money::zero());
        assert!(Money::ZERO.is_zero());
    }
}

mod predicates {
    use super::*;

    #[test]
    fn test_sign_predicates() {
        assert!(Money::new(dec!(1)).is_positive());
        assert!(!Money::ZERO.is_positive());
        assert!(!Money::ZERO.is_negative());
        assert!(Money::new(dec!(-0.01)).is_negative());
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::new(dec!(-20)).clamp_non_negative(), Money::ZERO);
        assert_eq!(Money::new(dec!(20)).clamp_non_negative(), Money::new(dec!(20)));
    }

    #[test]
    fn test_settlement_tolerance_is_one_paisa() {
        assert_eq!(PAID_TOLERANCE.amount(), dec!(0.01));
        assert!(Money::settles(PAID_TOLERANCE));
        assert!(!Money::settles(Money::new(dec!(0.02))));
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add() {
        let a = Money::new(dec!(600));
        let b = Money::new(dec!(400));
        assert_eq!(a.checked_add(&b).unwrap(), Money::new(dec!(1000)));
    }

    #[test]
    fn test_checked_sub_can_go_negative() {
        let a = Money::new(dec!(100));
        let b = Money::new(dec!(150));
        assert_eq!(a.checked_sub(&b).unwrap().amount(), dec!(-50));
    }

    #[test]
    fn test_checked_add_reports_overflow() {
        let max = Money::new(Decimal::MAX);
        assert_eq!(max.checked_add(&Money::new(dec!(1))), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_operators() {
        let mut m = Money::new(dec!(10));
        m += Money::new(dec!(5));
        m -= Money::new(dec!(2.5));
        assert_eq!(m.amount(), dec!(12.50));
        assert_eq!((-m).amount(), dec!(-12.50));
    }

    #[test]
    fn test_sum_of_references() {
        let parts = vec![Money::new(dec!(600)), Money::new(dec!(400)), Money::new(dec!(0.25))];
        let total: Money = parts.iter().sum();
        assert_eq!(total.amount(), dec!(1000.25));
        assert_eq!(Money::checked_sum(&parts).unwrap(), total);
    }
}

mod percentages {
    use super::*;

    #[test]
    fn test_percentage_rounds_to_two_places() {
        let part = Money::new(dec!(1));
        let whole = Money::new(dec!(3));
        assert_eq!(part.percentage_of(whole), dec!(33.33));
    }

    #[test]
    fn test_percentage_of_non_positive_whole_is_zero() {
        let part = Money::new(dec!(10));
        assert_eq!(part.percentage_of(Money::new(dec!(-10))), Decimal::ZERO);
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_money_serializes_transparently() {
        let json = serde_json::to_string(&Money::new(dec!(12.5))).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::new(dec!(12.5)));
    }

    #[test]
    fn test_deserialized_amount_is_rounded_to_paise() {
        let money: Money = serde_json::from_str("\"100.005\"").unwrap();

        assert!(money.amount().scale() <= 2);
        assert_eq!(money, Money::new(dec!(100.005)));
    }

    #[test]
    fn test_deserialized_amounts_add_up_like_constructed_ones() {
        let lines: Vec<Money> = serde_json::from_str(r#"["33.333", "33.333", "33.334"]"#).unwrap();

        let total: Money = lines.iter().sum();
        assert_eq!(total, Money::new(dec!(33.33)) + Money::new(dec!(33.33)) + Money::new(dec!(33.33)));
        assert!(total.amount().scale() <= 2);
    }
}
