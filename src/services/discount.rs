// src/services/discount.rs

use rust_decimal::Decimal;

use crate::common::money::{percent_of, round_currency};
use crate::models::catalog::{DiscountSpec, DiscountType};

/// Valor do desconto sobre `amount`. Função pura e total.
///
/// PERCENTAGE usa taxa com 4 casas e arredonda o resultado para centavos;
/// FIXED_AMOUNT é levado a centavos e nunca desconta mais do que o próprio valor. O resultado
/// fica sempre em `0..=amount`. `amount` negativo deve ser rejeitado antes.
pub fn discount_amount(amount: Decimal, spec: &DiscountSpec) -> Decimal {
    if spec.value.is_zero() || amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let raw = match spec.discount_type {
        DiscountType::Percentage => percent_of(amount, spec.value),
        DiscountType::FixedAmount => round_currency(spec.value),
    };

    raw.max(Decimal::ZERO).min(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn zero_value_means_no_discount() {
        assert_eq!(discount_amount(d("99.90"), &DiscountSpec::none()), Decimal::ZERO);
        assert_eq!(discount_amount(d("99.90"), &DiscountSpec::fixed(Decimal::ZERO)), Decimal::ZERO);
    }

    #[test]
    fn percentage_is_rounded_to_cents() {
        assert_eq!(discount_amount(d("25.00"), &DiscountSpec::percentage(d("10"))), d("2.50"));
        assert_eq!(discount_amount(d("19.99"), &DiscountSpec::percentage(d("15"))), d("3.00"));
        assert_eq!(discount_amount(d("10.00"), &DiscountSpec::percentage(d("100"))), d("10.00"));
    }

    #[test]
    fn fixed_amount_is_capped_by_the_amount() {
        assert_eq!(discount_amount(d("47.50"), &DiscountSpec::fixed(d("5.00"))), d("5.00"));
        assert_eq!(discount_amount(d("3.00"), &DiscountSpec::fixed(d("5.00"))), d("3.00"));
    }

    #[test]
    fn fixed_amount_is_kept_in_cents() {
        assert_eq!(discount_amount(d("25.00"), &DiscountSpec::fixed(d("3.333"))), d("3.33"));
        assert_eq!(discount_amount(d("25.00"), &DiscountSpec::fixed(d("3.335"))), d("3.34"));
    }

    fn cents() -> impl Strategy<Value = Decimal> {
        (0i64..10_000_000).prop_map(|c| Decimal::new(c, 2))
    }

    fn spec() -> impl Strategy<Value = DiscountSpec> {
        prop_oneof![
            // Escalas livres: o cálculo não pode depender da validação de entrada
            (0i64..=1_000_000, 0u32..=4)
                .prop_map(|(p, s)| DiscountSpec::percentage(Decimal::new(p, s).min(Decimal::ONE_HUNDRED))),
            (0i64..2_000_000_000, 0u32..=6).prop_map(|(c, s)| DiscountSpec::fixed(Decimal::new(c, s))),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn discount_stays_within_bounds(amount in cents(), spec in spec()) {
            let discount = discount_amount(amount, &spec);
            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= amount);
            prop_assert!(crate::common::money::fits_scale(discount, 2));
        }
    }
}
