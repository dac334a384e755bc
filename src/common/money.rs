// src/common/money.rs

use rust_decimal::{Decimal, RoundingStrategy};

use crate::common::error::AppError;

/// Casas decimais da moeda.
pub const CURRENCY_SCALE: u32 = 2;

/// Precisão intermediária das taxas (evita arredondamento duplo).
pub const RATE_SCALE: u32 = 4;

/// Maior preço unitário aceito (1.000.000,00).
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Teto de uma coluna NUMERIC(12, 2): 9.999.999.999,99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Teto de desconto fixo, que vive em NUMERIC(12, 4): 99.999.999,99
pub const MAX_FIXED_DISCOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// `true` quando o valor não tem mais casas do que `scale` (zeros à direita não contam).
pub fn fits_scale(value: Decimal, scale: u32) -> bool {
    value.normalize().scale() <= scale
}

fn within_limit(value: Option<Decimal>, what: &str) -> Result<Decimal, AppError> {
    match value {
        Some(v) if v.abs() <= MAX_AMOUNT => Ok(v),
        _ => Err(AppError::InvalidInput(format!("{what} exceeds the supported range"))),
    }
}

/// `unit_price × quantity` em centavos, sem estourar a coluna.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Result<Decimal, AppError> {
    within_limit(
        unit_price.checked_mul(Decimal::from(quantity)).map(round_currency),
        "line total",
    )
}

/// Soma com teto de coluna em cada passo.
pub fn checked_sum<I>(values: I) -> Result<Decimal, AppError>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| within_limit(acc.checked_add(v), "amount"))
}

// HALF_UP para valores positivos.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Converte um percentual (0–100) em taxa com 4 casas: 12.5 -> 0.1250
pub fn percent_to_rate(percent: Decimal) -> Decimal {
    (percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount × percent / 100`, arredondado para a moeda.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round_currency(amount * percent_to_rate(percent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn rounds_half_up_to_cents() {
        assert_eq!(round_currency(d("2.345")), d("2.35"));
        assert_eq!(round_currency(d("2.344")), d("2.34"));
    }

    #[test]
    fn rate_is_computed_at_four_decimals() {
        assert_eq!(percent_to_rate(d("12.5")), d("0.1250"));
        assert_eq!(percent_to_rate(d("33.33333")), d("0.3333"));
    }

    #[test]
    fn percent_of_applies_rate_then_rounds() {
        assert_eq!(percent_of(d("25.00"), d("10")), d("2.50"));
        assert_eq!(percent_of(d("42.50"), d("10")), d("4.25"));
        assert_eq!(percent_of(d("10.00"), d("33.33333")), d("3.33"));
    }

    #[test]
    fn limits_match_the_column_precision() {
        assert_eq!(MAX_UNIT_PRICE, d("1000000"));
        assert_eq!(MAX_AMOUNT, d("9999999999.99"));
        assert_eq!(MAX_FIXED_DISCOUNT, d("99999999.99"));
    }

    #[test]
    fn scale_ignores_trailing_zeros() {
        assert!(fits_scale(d("12.500"), 2));
        assert!(fits_scale(d("7"), 2));
        assert!(!fits_scale(d("12.345"), 2));
        assert!(fits_scale(d("12.3456"), 4));
        assert!(!fits_scale(d("12.34567"), 4));
    }

    #[test]
    fn oversized_amounts_are_input_errors() {
        assert_eq!(line_total(d("12.50"), 3).unwrap(), d("37.50"));
        assert!(matches!(
            line_total(d("100000000000000000000"), i32::MAX),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(line_total(MAX_AMOUNT, 2), Err(AppError::InvalidInput(_))));

        assert_eq!(checked_sum([d("1.10"), d("2.20")]).unwrap(), d("3.30"));
        assert!(matches!(checked_sum([MAX_AMOUNT, d("0.01")]), Err(AppError::InvalidInput(_))));
    }
}
