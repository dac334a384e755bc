// src/services/stock_ledger.rs

use chrono::Utc;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::db::UnitOfWork;
use crate::models::inventory::{
    StockLine, StockMovement, StockMovementReason, StockRecord, StockUpdate,
};

/// Origem da movimentação: venda direta ou consumo em ordem de serviço.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockPurpose {
    Sale,
    Service,
}

impl StockPurpose {
    fn reserve_reason(self) -> StockMovementReason {
        match self {
            StockPurpose::Sale => StockMovementReason::Sale,
            StockPurpose::Service => StockMovementReason::ServiceUsage,
        }
    }

    fn release_reason(self) -> StockMovementReason {
        match self {
            StockPurpose::Sale => StockMovementReason::SaleReversal,
            StockPurpose::Service => StockMovementReason::ServiceReversal,
        }
    }
}

/// Quem e o que originou a movimentação (vai para o histórico).
#[derive(Debug, Clone, Copy)]
pub struct MovementContext {
    pub company_id: Uuid,
    pub actor_id: Uuid,
    pub reference_id: Uuid,
    pub purpose: StockPurpose,
}

pub struct StockLedger;

impl StockLedger {
    /// Baixa `quantity` do item. Sem saldo: `InsufficientStock` e nada muda.
    pub async fn reserve<U: UnitOfWork>(
        tx: &mut U,
        ctx: &MovementContext,
        line: StockLine,
    ) -> Result<StockRecord, AppError> {
        Self::check_quantity(line.quantity)?;

        match tx.adjust_stock(line.item_id, -line.quantity).await? {
            StockUpdate::Applied(record) => {
                Self::record(tx, ctx, line.item_id, -line.quantity, ctx.purpose.reserve_reason()).await?;
                tracing::debug!(item_id = %line.item_id, quantity = line.quantity, remaining = record.quantity, "Estoque reservado");
                Ok(record)
            }
            StockUpdate::Insufficient { available } => {
                tracing::warn!(item_id = %line.item_id, requested = line.quantity, available, "Estoque insuficiente");
                Err(AppError::InsufficientStock {
                    item_id: line.item_id,
                    requested: line.quantity,
                    available,
                })
            }
        }
    }

    /// Devolve `quantity` ao item.
    pub async fn release<U: UnitOfWork>(
        tx: &mut U,
        ctx: &MovementContext,
        line: StockLine,
    ) -> Result<StockRecord, AppError> {
        Self::check_quantity(line.quantity)?;

        match tx.adjust_stock(line.item_id, line.quantity).await? {
            StockUpdate::Applied(record) => {
                Self::record(tx, ctx, line.item_id, line.quantity, ctx.purpose.release_reason()).await?;
                tracing::debug!(item_id = %line.item_id, quantity = line.quantity, remaining = record.quantity, "Estoque devolvido");
                Ok(record)
            }
            // Uma soma positiva nunca deixa o saldo negativo
            StockUpdate::Insufficient { .. } => Err(anyhow::anyhow!(
                "release of {} units rejected for item {}",
                line.quantity,
                line.item_id
            )
            .into()),
        }
    }

    pub async fn reserve_all<U: UnitOfWork>(
        tx: &mut U,
        ctx: &MovementContext,
        lines: &[StockLine],
    ) -> Result<Vec<StockRecord>, AppError> {
        let mut records = Vec::with_capacity(lines.len());
        for line in lines {
            records.push(Self::reserve(tx, ctx, *line).await?);
        }
        Ok(records)
    }

    pub async fn release_all<U: UnitOfWork>(
        tx: &mut U,
        ctx: &MovementContext,
        lines: &[StockLine],
    ) -> Result<Vec<StockRecord>, AppError> {
        let mut records = Vec::with_capacity(lines.len());
        for line in lines {
            records.push(Self::release(tx, ctx, *line).await?);
        }
        Ok(records)
    }

    /// Troca de conjunto de linhas em duas passadas: devolve tudo, depois reserva tudo.
    pub async fn replace<U: UnitOfWork>(
        tx: &mut U,
        ctx: &MovementContext,
        old_lines: &[StockLine],
        new_lines: &[StockLine],
    ) -> Result<Vec<StockRecord>, AppError> {
        Self::release_all(tx, ctx, old_lines).await?;
        Self::reserve_all(tx, ctx, new_lines).await
    }

    fn check_quantity(quantity: i32) -> Result<(), AppError> {
        if quantity <= 0 {
            return Err(AppError::InvalidInput("stock quantity must be positive".into()));
        }
        Ok(())
    }

    async fn record<U: UnitOfWork>(
        tx: &mut U,
        ctx: &MovementContext,
        item_id: Uuid,
        quantity_changed: i32,
        reason: StockMovementReason,
    ) -> Result<(), AppError> {
        let movement = StockMovement {
            id: Uuid::new_v4(),
            company_id: ctx.company_id,
            item_id,
            quantity_changed,
            reason,
            reference_id: Some(ctx.reference_id),
            created_by: ctx.actor_id,
            created_at: Utc::now(),
        };
        tx.insert_stock_movement(&movement).await
    }
}
