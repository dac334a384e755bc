// src/models/service_record.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::catalog::validate_price;
use crate::models::inventory::StockLine;
use crate::models::tenancy::TenantScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "service_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

// --- Ordem de serviço (atendimento a um veículo) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub vehicle_id: Uuid,
    pub customer_id: Uuid,
    pub service_date: NaiveDate,
    pub current_mileage: Option<i32>,
    pub notes: Option<String>,
    pub status: ServiceStatus,
    pub total_amount: Decimal,
    pub invoice_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRecord {
    pub fn scope(&self) -> TenantScope {
        TenantScope { company_id: self.company_id, branch_id: Some(self.branch_id) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecordLine {
    pub id: Uuid,
    pub service_record_id: Uuid,
    pub position: i32,
    pub service_type_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub notes: Option<String>,
}

impl ServiceRecordLine {
    /// Quantidade de estoque presa por esta linha (só linhas de item).
    pub fn stock_line(&self) -> Option<StockLine> {
        self.item_id.map(|item_id| StockLine { item_id, quantity: self.quantity })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecordDetail {
    #[serde(flatten)]
    pub record: ServiceRecord,
    pub lines: Vec<ServiceRecordLine>,
}

// --- Payloads ---

fn validate_record_line_target(line: &ServiceRecordLineRequest) -> Result<(), ValidationError> {
    match (line.service_type_id, line.item_id) {
        (Some(_), None) | (None, Some(_)) => Ok(()),
        _ => {
            let mut err = ValidationError::new("line_target");
            err.message =
                Some("each line must reference exactly one of serviceTypeId or itemId".into());
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_record_line_target"))]
pub struct ServiceRecordLineRequest {
    pub service_type_id: Option<Uuid>,
    pub item_id: Option<Uuid>,

    #[validate(range(min = 1, max = 9999, message = "quantity must be between 1 and 9999"))]
    pub quantity: i32,

    #[validate(custom(function = "validate_price"))]
    pub unit_price: Option<Decimal>,

    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRecordRequest {
    pub branch_id: Option<Uuid>,
    pub vehicle_id: Uuid,
    pub customer_id: Uuid,
    pub service_date: Option<NaiveDate>,

    #[validate(range(min = 0, message = "currentMileage cannot be negative"))]
    pub current_mileage: Option<i32>,

    pub notes: Option<String>,

    #[validate(length(min = 1, message = "at least one line is required"), nested)]
    pub lines: Vec<ServiceRecordLineRequest>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRecordRequest {
    pub status: Option<ServiceStatus>,

    #[validate(range(min = 0, message = "currentMileage cannot be negative"))]
    pub current_mileage: Option<i32>,

    pub notes: Option<String>,

    // None = mantém as linhas atuais
    #[validate(nested)]
    pub lines: Option<Vec<ServiceRecordLineRequest>>,
}
