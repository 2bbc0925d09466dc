use bigdecimal::BigDecimal;
use common_money::{normalize_scale, sum_line_totals, to_minor_units};
use proptest::prelude::*;

proptest! {
    // Integer cents survive normalization and minor-unit conversion untouched.
    #[test]
    fn whole_cents_round_trip(cents in 0i64..10_000_000) {
        let value = BigDecimal::new(cents.into(), 2);
        prop_assert_eq!(normalize_scale(&value), value.clone());
        prop_assert_eq!(to_minor_units(&value).unwrap(), cents);
    }

    // A trailing thousandth of 5 or more rounds away from zero, otherwise down.
    #[test]
    fn half_up_at_thousandth(cents in 0i64..1_000_000, thousandth in 0i64..10) {
        let value = BigDecimal::new((cents * 10 + thousandth).into(), 3);
        let expected = if thousandth >= 5 { cents + 1 } else { cents };
        prop_assert_eq!(normalize_scale(&value), BigDecimal::new(expected.into(), 2));
    }

    // Summing per-line totals equals pricing the whole cart in integer cents.
    #[test]
    fn cart_total_matches_integer_cents(lines in proptest::collection::vec((1i64..100_000, 1i32..20), 1..12)) {
        let prices: Vec<BigDecimal> = lines.iter().map(|(c, _)| BigDecimal::new((*c).into(), 2)).collect();
        let total = sum_line_totals(prices.iter().zip(lines.iter()).map(|(p, (_, q))| (p, *q)));
        let cents: i64 = lines.iter().map(|(c, q)| c * i64::from(*q)).sum();
        prop_assert_eq!(to_minor_units(&total).unwrap(), cents);
    }
}
