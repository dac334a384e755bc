// src/services/invoice_number.rs

use chrono::NaiveDate;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::db::UnitOfWork;

const PREFIX: &str = "INV";

/// `INV-YYYYMMDD-NNNN`. A sequência passa de 4 dígitos só se o dia passar de 9999 faturas.
pub fn format_invoice_number(date: NaiveDate, sequence: i32) -> String {
    format!("{PREFIX}-{}-{sequence:04}", date.format("%Y%m%d"))
}

pub fn parse_invoice_number(number: &str) -> Option<(NaiveDate, i32)> {
    let mut parts = number.splitn(3, '-');
    if parts.next()? != PREFIX {
        return None;
    }
    let date_part = parts.next()?;
    let seq_part = parts.next()?;
    if date_part.len() != 8 || seq_part.len() < 4 || !seq_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y%m%d").ok()?;
    let sequence = seq_part.parse::<i32>().ok().filter(|s| *s > 0)?;
    Some((date, sequence))
}

/// Numeração por (empresa, dia) apoiada em contador atômico do armazenamento,
/// nunca em "contar as faturas de hoje".
pub struct InvoiceNumberAllocator;

impl InvoiceNumberAllocator {
    pub async fn next_number<U: UnitOfWork>(
        tx: &mut U,
        company_id: Uuid,
        date: NaiveDate,
    ) -> Result<String, AppError> {
        let sequence = tx.next_invoice_sequence(company_id, date).await?;
        Ok(format_invoice_number(date, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn formats_with_zero_padded_sequence() {
        assert_eq!(format_invoice_number(jan15(), 1), "INV-20240115-0001");
        assert_eq!(format_invoice_number(jan15(), 42), "INV-20240115-0042");
    }

    #[test]
    fn parses_what_it_formats() {
        assert_eq!(parse_invoice_number("INV-20240115-0007"), Some((jan15(), 7)));
        assert_eq!(parse_invoice_number("INV-20240115-7"), None);
        assert_eq!(parse_invoice_number("ORD-20240115-0007"), None);
        assert_eq!(parse_invoice_number("INV-20241315-0007"), None);
        assert_eq!(parse_invoice_number("INV-20240115-0000"), None);
    }
}
