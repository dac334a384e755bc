// src/models/invoice.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::catalog::{
    validate_discount, validate_price, validate_percentage, DiscountSpec, DiscountType,
};
use crate::models::tenancy::{Branch, TenantScope};

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Cancelled => "CANCELLED",
            InvoiceStatus::Overdue => "OVERDUE",
        }
    }

    /// Tabela de transições: DRAFT→SENT→{PAID,CANCELLED,OVERDUE}, OVERDUE→{PAID,CANCELLED}.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Paid)
                | (Sent, Cancelled)
                | (Sent, Overdue)
                | (Overdue, Paid)
                | (Overdue, Cancelled)
        )
    }

    /// Faturas pagas ou canceladas não aceitam novos descontos.
    pub fn is_pricing_locked(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceType {
    Service,
    ItemSale,
    Mixed,
}

impl InvoiceType {
    pub fn from_lines(lines: &[InvoiceLine]) -> Self {
        let has_items = lines.iter().any(|l| l.kind == LineKind::Item);
        let has_services = lines.iter().any(|l| l.kind == LineKind::Service);
        match (has_items, has_services) {
            (true, true) => InvoiceType::Mixed,
            (false, true) => InvoiceType::Service,
            _ => InvoiceType::ItemSale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "line_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineKind {
    Item,
    Service,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub customer_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub service_record_id: Option<Uuid>,
    pub invoice_type: InvoiceType,
    pub status: InvoiceStatus,

    // Valores
    pub subtotal: Decimal,
    pub overall_discount_type: DiscountType,
    pub overall_discount_value: Decimal,
    pub overall_discount_amount: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,

    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Cabeçalho em DRAFT com totais zerados (o motor de preços preenche depois).
    pub fn draft(
        branch: &Branch,
        invoice_number: String,
        invoice_date: NaiveDate,
        customer_id: Uuid,
        vehicle_id: Option<Uuid>,
        overall_discount: DiscountSpec,
        tax_percentage: Decimal,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id: branch.company_id,
            branch_id: branch.id,
            invoice_number,
            invoice_date,
            customer_id,
            vehicle_id,
            service_record_id: None,
            invoice_type: InvoiceType::ItemSale,
            status: InvoiceStatus::Draft,
            subtotal: Decimal::ZERO,
            overall_discount_type: overall_discount.discount_type,
            overall_discount_value: overall_discount.value,
            overall_discount_amount: Decimal::ZERO,
            tax_percentage,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn scope(&self) -> TenantScope {
        TenantScope { company_id: self.company_id, branch_id: Some(self.branch_id) }
    }

    pub fn overall_discount(&self) -> DiscountSpec {
        DiscountSpec { discount_type: self.overall_discount_type, value: self.overall_discount_value }
    }

    pub fn set_overall_discount(&mut self, spec: DiscountSpec) {
        self.overall_discount_type = spec.discount_type;
        self.overall_discount_value = spec.value;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub position: i32,
    pub kind: LineKind,
    pub item_id: Option<Uuid>,
    pub service_type_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub final_price: Decimal,
    // A linha segura estoque próprio? (linhas vindas de ordem de serviço não seguram)
    pub stock_reserved: bool,
}

impl InvoiceLine {
    pub fn from_draft(invoice: &Invoice, position: i32, draft: LineDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            invoice_id: invoice.id,
            company_id: invoice.company_id,
            branch_id: invoice.branch_id,
            position,
            kind: draft.kind,
            item_id: draft.item_id,
            service_type_id: draft.service_type_id,
            description: draft.description,
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            line_total: Decimal::ZERO,
            discount_type: draft.discount.discount_type,
            discount_value: draft.discount.value,
            discount_amount: Decimal::ZERO,
            final_price: Decimal::ZERO,
            stock_reserved: draft.reserve_stock,
        }
    }

    pub fn discount(&self) -> DiscountSpec {
        DiscountSpec { discount_type: self.discount_type, value: self.discount_value }
    }

    pub fn set_discount(&mut self, spec: DiscountSpec) {
        self.discount_type = spec.discount_type;
        self.discount_value = spec.value;
    }
}

/// Linha já resolvida contra o catálogo, ainda sem preço calculado.
#[derive(Debug, Clone)]
pub struct LineDraft {
    pub kind: LineKind,
    pub item_id: Option<Uuid>,
    pub service_type_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: DiscountSpec,
    pub reserve_stock: bool,
}

// Resposta completa (Cabeçalho + Linhas)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePreview {
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Decimal,
    pub overall_discount_amount: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub estimated_savings: Decimal,
}

/// Filtro de listagem, sempre já restrito ao tenant do ator.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub company_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.company_id.is_none_or(|c| invoice.company_id == c)
            && self.branch_id.is_none_or(|b| invoice.branch_id == b)
            && self.customer_id.is_none_or(|c| invoice.customer_id == c)
            && self.date_from.is_none_or(|d| invoice.invoice_date >= d)
            && self.date_to.is_none_or(|d| invoice.invoice_date <= d)
    }
}

// --- Payloads ---

fn validate_line_target(line: &InvoiceLineRequest) -> Result<(), ValidationError> {
    match (line.item_id, line.service_type_id) {
        (Some(_), None) | (None, Some(_)) => Ok(()),
        _ => {
            let mut err = ValidationError::new("line_target");
            err.message = Some("each line must reference exactly one of itemId or serviceTypeId".into());
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_line_target"))]
pub struct InvoiceLineRequest {
    pub item_id: Option<Uuid>,
    pub service_type_id: Option<Uuid>,

    #[validate(range(min = 1, max = 9999, message = "quantity must be between 1 and 9999"))]
    pub quantity: i32,

    // Sobrescreve o preço do catálogo
    #[validate(custom(function = "validate_price"))]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub vehicle_id: Option<Uuid>,

    // Obrigatório só para atores de nível empresa
    pub branch_id: Option<Uuid>,

    pub invoice_date: Option<NaiveDate>,

    #[validate(custom(function = "validate_percentage"))]
    pub tax_percentage: Option<Decimal>,

    #[validate(custom(function = "validate_discount"))]
    pub overall_discount: Option<DiscountSpec>,

    #[validate(length(min = 1, message = "at least one line is required"), nested)]
    pub lines: Vec<InvoiceLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ItemDiscountRequest {
    pub item_id: Uuid,
    #[validate(custom(function = "validate_discount"))]
    pub discount: DiscountSpec,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDiscountRequest {
    pub service_type_id: Uuid,
    #[validate(custom(function = "validate_discount"))]
    pub discount: DiscountSpec,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceDiscountRequest {
    #[validate(custom(function = "validate_discount"))]
    pub invoice_discount: Option<DiscountSpec>,

    #[serde(default)]
    #[validate(nested)]
    pub item_discounts: Vec<ItemDiscountRequest>,

    #[serde(default)]
    #[validate(nested)]
    pub service_discounts: Vec<ServiceDiscountRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_follow_the_table() {
        use InvoiceStatus::*;
        let all = [Draft, Sent, Paid, Cancelled, Overdue];
        let allowed = [
            (Draft, Sent),
            (Draft, Cancelled),
            (Sent, Paid),
            (Sent, Cancelled),
            (Sent, Overdue),
            (Overdue, Paid),
            (Overdue, Cancelled),
        ];
        for from in all {
            for to in all {
                assert_eq!(from.can_transition_to(to), allowed.contains(&(from, to)), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn line_must_reference_exactly_one_target() {
        let both = InvoiceLineRequest {
            item_id: Some(Uuid::new_v4()),
            service_type_id: Some(Uuid::new_v4()),
            quantity: 1,
            unit_price: None,
        };
        assert!(both.validate().is_err());

        let item_only = InvoiceLineRequest { service_type_id: None, ..both.clone() };
        assert!(item_only.validate().is_ok());

        let zero_qty = InvoiceLineRequest { quantity: 0, ..item_only };
        assert!(zero_qty.validate().is_err());
    }
}
