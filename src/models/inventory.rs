// src/models/inventory.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Saldo de estoque de um item ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub item_id: Uuid,
    pub quantity: i32,
    pub min_stock_level: Option<i32>,
}

impl StockRecord {
    pub fn is_low(&self) -> bool {
        self.min_stock_level.is_some_and(|min| self.quantity <= min)
    }
}

/// Resultado de um ajuste condicional (nunca deixa o saldo negativo).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockUpdate {
    Applied(StockRecord),
    Insufficient { available: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stock_movement_reason", rename_all = "SCREAMING_SNAKE_CASE")] // Banco
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum StockMovementReason {
    InitialStock,
    Sale,         // Linha de fatura consumiu o item
    SaleReversal, // Linha de fatura removida / fatura cancelada
    ServiceUsage,
    ServiceReversal,
}

// --- Histórico (livro-razão de movimentações) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub company_id: Uuid,
    pub item_id: Uuid,
    pub quantity_changed: i32, // negativo = saída
    pub reason: StockMovementReason,
    pub reference_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Uma quantidade de item presa a uma linha (fatura ou ordem de serviço).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub item_id: Uuid,
    pub quantity: i32,
}
