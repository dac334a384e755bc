// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::common::error::AppError;
use crate::common::money::{fits_scale, CURRENCY_SCALE, MAX_FIXED_DISCOUNT, MAX_UNIT_PRICE, RATE_SCALE};
use crate::models::tenancy::TenantScope;

// --- Tipo de desconto (contrato externo bit-exato: PERCENTAGE / FIXED_AMOUNT) ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountSpec {
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: Decimal,
}

impl Default for DiscountSpec {
    fn default() -> Self {
        Self::none()
    }
}

impl DiscountSpec {
    pub fn none() -> Self {
        Self { discount_type: DiscountType::Percentage, value: Decimal::ZERO }
    }

    pub fn percentage(value: Decimal) -> Self {
        Self { discount_type: DiscountType::Percentage, value }
    }

    pub fn fixed(value: Decimal) -> Self {
        Self { discount_type: DiscountType::FixedAmount, value }
    }

    /// Valor >= 0; percentual entre 0 e 100 com até 4 casas; fixo em centavos.
    pub fn check(&self) -> Result<(), AppError> {
        validate_discount(self).map_err(|e| {
            AppError::InvalidInput(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid discount".to_string()),
            )
        })
    }
}

fn range_error(message: &'static str) -> ValidationError {
    let mut err = ValidationError::new("range");
    err.message = Some(message.into());
    err
}

pub fn validate_discount(spec: &DiscountSpec) -> Result<(), ValidationError> {
    if spec.value.is_sign_negative() && !spec.value.is_zero() {
        return Err(range_error("discount value cannot be negative"));
    }
    match spec.discount_type {
        DiscountType::Percentage => validate_percentage(&spec.value)
            .map_err(|_| range_error("percentage discount must be between 0 and 100 with at most 4 decimals")),
        DiscountType::FixedAmount => {
            if !fits_scale(spec.value, CURRENCY_SCALE) {
                return Err(range_error("fixed discount must have at most 2 decimals"));
            }
            if spec.value > MAX_FIXED_DISCOUNT {
                return Err(range_error("fixed discount is too large"));
            }
            Ok(())
        }
    }
}

pub fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        return Err(range_error("value cannot be negative"));
    }
    Ok(())
}

/// Preço em centavos, de 0 até `MAX_UNIT_PRICE`.
pub fn validate_price(val: &Decimal) -> Result<(), ValidationError> {
    validate_not_negative(val)?;
    if !fits_scale(*val, CURRENCY_SCALE) {
        return Err(range_error("price must have at most 2 decimals"));
    }
    if *val > MAX_UNIT_PRICE {
        return Err(range_error("price exceeds the maximum allowed"));
    }
    Ok(())
}

pub fn validate_percentage(val: &Decimal) -> Result<(), ValidationError> {
    validate_not_negative(val)?;
    if *val > Decimal::ONE_HUNDRED {
        return Err(range_error("percentage must be between 0 and 100"));
    }
    if !fits_scale(*val, RATE_SCALE) {
        return Err(range_error("percentage must have at most 4 decimals"));
    }
    Ok(())
}

// --- Itens (produtos com estoque) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    pub unit: Option<String>,
    pub stock_quantity: i32,
    pub min_stock_level: Option<i32>,
    pub default_discount_type: DiscountType,
    pub default_discount_value: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn scope(&self) -> TenantScope {
        TenantScope { company_id: self.company_id, branch_id: Some(self.branch_id) }
    }

    pub fn default_discount(&self) -> DiscountSpec {
        DiscountSpec { discount_type: self.default_discount_type, value: self.default_discount_value }
    }

    pub fn set_default_discount(&mut self, spec: DiscountSpec) {
        self.default_discount_type = spec.discount_type;
        self.default_discount_value = spec.value;
        self.updated_at = Utc::now();
    }
}

// --- Tipos de serviço (mão de obra, sem estoque) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceType {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub estimated_duration_minutes: Option<i32>,
    pub default_discount_type: DiscountType,
    pub default_discount_value: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceType {
    pub fn scope(&self) -> TenantScope {
        TenantScope { company_id: self.company_id, branch_id: Some(self.branch_id) }
    }

    pub fn default_discount(&self) -> DiscountSpec {
        DiscountSpec { discount_type: self.default_discount_type, value: self.default_discount_value }
    }

    pub fn set_default_discount(&mut self, spec: DiscountSpec) {
        self.default_discount_type = spec.discount_type;
        self.default_discount_value = spec.value;
        self.updated_at = Utc::now();
    }
}

// --- Payloads ---

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub branch_id: Option<Uuid>,

    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,

    pub description: Option<String>,

    #[validate(custom(function = "validate_price"))]
    pub unit_price: Decimal,

    pub unit: Option<String>,

    #[validate(range(min = 0, message = "stockQuantity cannot be negative"))]
    #[serde(default)]
    pub stock_quantity: i32,

    #[validate(range(min = 0, message = "minStockLevel cannot be negative"))]
    pub min_stock_level: Option<i32>,

    #[validate(custom(function = "validate_discount"))]
    pub default_discount: Option<DiscountSpec>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceTypeRequest {
    pub branch_id: Option<Uuid>,

    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,

    pub description: Option<String>,

    #[validate(custom(function = "validate_price"))]
    pub base_price: Decimal,

    #[validate(range(min = 0, message = "estimatedDurationMinutes cannot be negative"))]
    pub estimated_duration_minutes: Option<i32>,

    #[validate(custom(function = "validate_discount"))]
    pub default_discount: Option<DiscountSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn discount_payload_uses_external_vocabulary() {
        let spec: DiscountSpec =
            serde_json::from_str(r#"{"type":"FIXED_AMOUNT","value":5.0}"#).unwrap();
        assert_eq!(spec.discount_type, DiscountType::FixedAmount);
        assert_eq!(spec.value, Decimal::from_str("5").unwrap());

        let json = serde_json::to_value(DiscountSpec::percentage(Decimal::TEN)).unwrap();
        assert_eq!(json["type"], "PERCENTAGE");
    }

    #[test]
    fn discount_bounds_are_checked() {
        assert!(DiscountSpec::percentage(Decimal::ONE_HUNDRED).check().is_ok());
        assert!(DiscountSpec::percentage(Decimal::from(101)).check().is_err());
        assert!(DiscountSpec::fixed(Decimal::from(-1)).check().is_err());
        assert!(DiscountSpec::fixed(Decimal::from(1_000)).check().is_ok());
    }

    #[test]
    fn discount_precision_follows_the_columns() {
        let d = |s: &str| Decimal::from_str(s).unwrap();
        assert!(DiscountSpec::fixed(d("3.30")).check().is_ok());
        assert!(DiscountSpec::fixed(d("3.333")).check().is_err());
        assert!(DiscountSpec::fixed(d("100000000")).check().is_err());
        assert!(DiscountSpec::percentage(d("12.3456")).check().is_ok());
        assert!(DiscountSpec::percentage(d("12.34567")).check().is_err());
    }

    #[test]
    fn prices_are_bounded_cents() {
        let d = |s: &str| Decimal::from_str(s).unwrap();
        assert!(validate_price(&d("15.90")).is_ok());
        assert!(validate_price(&d("15.900")).is_ok());
        assert!(validate_price(&d("12.345")).is_err());
        assert!(validate_price(&d("-0.01")).is_err());
        assert!(validate_price(&d("1000000.01")).is_err());
        assert!(validate_percentage(&d("10.5")).is_ok());
        assert!(validate_percentage(&d("10.00001")).is_err());
    }
}
