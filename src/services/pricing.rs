// src/services/pricing.rs

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::common::error::AppError;
use crate::common::money::{checked_sum, line_total, percent_of};
use crate::models::catalog::DiscountSpec;
use crate::models::invoice::{Invoice, InvoiceLine, InvoiceType};
use crate::services::discount::discount_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub overall_discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Compõe descontos de linha, desconto geral, imposto e totais.
/// O imposto incide sempre sobre o subtotal já descontado.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    default_tax_percentage: Decimal,
}

impl PricingEngine {
    pub fn new(default_tax_percentage: Decimal) -> Self {
        Self { default_tax_percentage }
    }

    pub fn default_tax_percentage(&self) -> Decimal {
        self.default_tax_percentage
    }

    pub fn resolve_tax(&self, requested: Option<Decimal>) -> Decimal {
        requested.unwrap_or(self.default_tax_percentage)
    }

    /// lineTotal, discountAmount e finalPrice a partir de preço, quantidade e desconto da linha.
    pub fn price_line(&self, line: &mut InvoiceLine) -> Result<(), AppError> {
        line.line_total = line_total(line.unit_price, line.quantity)?;
        line.discount_amount = discount_amount(line.line_total, &line.discount());
        line.final_price = line.line_total - line.discount_amount;
        Ok(())
    }

    pub fn totals(
        &self,
        lines: &[InvoiceLine],
        overall_discount: &DiscountSpec,
        tax_percentage: Decimal,
    ) -> Result<InvoiceTotals, AppError> {
        let subtotal = checked_sum(lines.iter().map(|l| l.final_price))?;
        let overall_discount_amount = discount_amount(subtotal, overall_discount);
        let discounted_subtotal = subtotal - overall_discount_amount;
        let tax_amount = percent_of(discounted_subtotal, tax_percentage);

        Ok(InvoiceTotals {
            subtotal,
            overall_discount_amount,
            tax_amount,
            total_amount: checked_sum([discounted_subtotal, tax_amount])?,
        })
    }

    /// Recalcula linhas e cabeçalho. Usa só o que está persistido na fatura
    /// (preços, descontos, percentual de imposto), então é idempotente.
    /// Valores fora da faixa das colunas viram `InvalidInput` sem tocar no cabeçalho.
    pub fn price_invoice(
        &self,
        invoice: &mut Invoice,
        lines: &mut [InvoiceLine],
    ) -> Result<InvoiceTotals, AppError> {
        for line in lines.iter_mut() {
            self.price_line(line)?;
        }
        let totals = self.totals(lines, &invoice.overall_discount(), invoice.tax_percentage)?;

        invoice.invoice_type = InvoiceType::from_lines(lines);
        invoice.subtotal = totals.subtotal;
        invoice.overall_discount_amount = totals.overall_discount_amount;
        invoice.tax_amount = totals.tax_amount;
        invoice.total_amount = totals.total_amount;
        invoice.updated_at = Utc::now();
        Ok(totals)
    }
}
