use bigdecimal::{BigDecimal, Zero};

/// Customer-facing total for one order line.
pub fn line_total(unit_price: &BigDecimal, quantity: i32) -> BigDecimal {
    unit_price * BigDecimal::from(quantity)
}

/// The farmer's share of one order line, booked as a PENDING earning when
/// the payment succeeds.
pub fn earning_amount(farmer_price: &BigDecimal, quantity: i32) -> BigDecimal {
    farmer_price * BigDecimal::from(quantity)
}

/// Percentage discount capped at `max_discount`, never negative and never
/// above the order total.
pub fn coupon_discount(
    order_total: &BigDecimal,
    discount_percent: &BigDecimal,
    max_discount: &BigDecimal,
) -> BigDecimal {
    let zero = BigDecimal::zero();
    if order_total <= &zero || discount_percent <= &zero {
        return zero;
    }

    let raw = (order_total * discount_percent) / BigDecimal::from(100);
    let capped = if &raw > max_discount {
        max_discount.clone()
    } else {
        raw
    };
    if &capped > order_total {
        order_total.clone()
    } else {
        capped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn line_total_multiplies_price_by_quantity() {
        assert_eq!(line_total(&dec("25.00"), 2), dec("50.00"));
    }

    #[test]
    fn earning_is_farmer_price_times_quantity() {
        assert_eq!(earning_amount(&dec("18.50"), 3), dec("55.50"));
    }

    #[test]
    fn twenty_percent_capped_at_hundred() {
        // 20% of 1000 is 200, capped to the 100 ceiling.
        let discount = coupon_discount(&dec("1000"), &dec("20"), &dec("100"));
        assert_eq!(discount, dec("100"));
        assert_eq!(dec("1000") - discount, dec("900"));
    }

    #[test]
    fn uncapped_percentage_applies_directly() {
        assert_eq!(coupon_discount(&dec("400"), &dec("10"), &dec("100")), dec("40"));
    }

    #[test]
    fn discount_never_exceeds_the_total() {
        assert_eq!(coupon_discount(&dec("50"), &dec("100"), &dec("500")), dec("50"));
    }

    #[test]
    fn zero_or_negative_inputs_yield_zero() {
        assert_eq!(coupon_discount(&dec("0"), &dec("20"), &dec("100")), dec("0"));
        assert_eq!(coupon_discount(&dec("100"), &dec("0"), &dec("100")), dec("0"));
        assert_eq!(coupon_discount(&dec("100"), &dec("-5"), &dec("100")), dec("0"));
    }
}
