// src/services/service_record_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::AppError,
        money::{checked_sum, line_total},
    },
    db::{Store, UnitOfWork},
    models::{
        auth::{ActorContext, Permission},
        inventory::StockLine,
        service_record::{
            CreateServiceRecordRequest, ServiceRecord, ServiceRecordDetail, ServiceRecordLine,
            ServiceRecordLineRequest, ServiceStatus, UpdateServiceRecordRequest,
        },
        tenancy::Branch,
    },
    services::{
        lookup,
        rbac_service::RoleModel,
        scope_guard::ScopeGuard,
        stock_ledger::{MovementContext, StockLedger, StockPurpose},
    },
};

fn held_stock(lines: &[ServiceRecordLine]) -> Vec<StockLine> {
    lines.iter().filter_map(ServiceRecordLine::stock_line).collect()
}

fn total_of(lines: &[ServiceRecordLine]) -> Result<Decimal, AppError> {
    checked_sum(lines.iter().map(|l| l.total_price))
}

#[derive(Clone)]
pub struct ServiceRecordService<S: Store> {
    store: S,
}

impl<S: Store> ServiceRecordService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, actor, request), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn create_service_record(
        &self,
        actor: &ActorContext,
        request: CreateServiceRecordRequest,
    ) -> Result<ServiceRecordDetail, AppError> {
        RoleModel::require(actor, Permission::ServiceRecordWrite)?;
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let branch = lookup::target_branch(&mut tx, actor, request.branch_id, "service record").await?;

        let now = Utc::now();
        let mut record = ServiceRecord {
            id: Uuid::new_v4(),
            company_id: branch.company_id,
            branch_id: branch.id,
            vehicle_id: request.vehicle_id,
            customer_id: request.customer_id,
            service_date: request.service_date.unwrap_or_else(|| now.date_naive()),
            current_mileage: request.current_mileage,
            notes: request.notes,
            status: ServiceStatus::Pending,
            total_amount: Decimal::ZERO,
            invoice_id: None,
            created_by: actor.actor_id,
            created_at: now,
            updated_at: now,
        };
        let lines = Self::resolve_lines(&mut tx, &branch, record.id, &request.lines).await?;
        record.total_amount = total_of(&lines)?;

        tx.insert_service_record(&record, &lines).await?;
        let ctx = Self::movement_context(actor, &record);
        StockLedger::reserve_all(&mut tx, &ctx, &held_stock(&lines)).await?;
        tx.commit().await?;

        tracing::info!(service_record_id = %record.id, total = %record.total_amount, "🔧 Ordem de serviço criada");
        Ok(ServiceRecordDetail { record, lines })
    }

    /// Campos simples e, se vierem, as linhas (substituição completa).
    #[tracing::instrument(skip(self, actor, request), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn update_service_record(
        &self,
        actor: &ActorContext,
        record_id: Uuid,
        request: UpdateServiceRecordRequest,
    ) -> Result<ServiceRecordDetail, AppError> {
        RoleModel::require(actor, Permission::ServiceRecordWrite)?;
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let mut record = lookup::service_record(&mut tx, actor, record_id).await?;

        if let Some(status) = request.status {
            record.status = status;
        }
        if request.current_mileage.is_some() {
            record.current_mileage = request.current_mileage;
        }
        if request.notes.is_some() {
            record.notes = request.notes;
        }

        let lines = match request.lines {
            Some(new_requests) => {
                if record.invoice_id.is_some() {
                    return Err(AppError::InvalidState(
                        "service record is already invoiced".into(),
                    ));
                }
                if new_requests.is_empty() {
                    return Err(AppError::InvalidInput("at least one line is required".into()));
                }
                let branch = tx
                    .find_branch(record.branch_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("branch"))?;
                let old_lines = tx.list_service_record_lines(record.id).await?;
                let new_lines = Self::resolve_lines(&mut tx, &branch, record.id, &new_requests).await?;

                let ctx = Self::movement_context(actor, &record);
                StockLedger::replace(&mut tx, &ctx, &held_stock(&old_lines), &held_stock(&new_lines)).await?;
                tx.replace_service_record_lines(record.id, &new_lines).await?;
                record.total_amount = total_of(&new_lines)?;
                new_lines
            }
            None => tx.list_service_record_lines(record.id).await?,
        };

        record.updated_at = Utc::now();
        tx.update_service_record(&record).await?;
        tx.commit().await?;

        tracing::info!(service_record_id = %record.id, status = ?record.status, "Ordem de serviço atualizada");
        Ok(ServiceRecordDetail { record, lines })
    }

    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn delete_service_record(&self, actor: &ActorContext, record_id: Uuid) -> Result<(), AppError> {
        RoleModel::require(actor, Permission::ServiceRecordWrite)?;

        let mut tx = self.store.begin().await?;
        let record = lookup::service_record(&mut tx, actor, record_id).await?;
        if record.invoice_id.is_some() {
            return Err(AppError::InvalidState("service record is already invoiced".into()));
        }

        let lines = tx.list_service_record_lines(record.id).await?;
        let ctx = Self::movement_context(actor, &record);
        StockLedger::release_all(&mut tx, &ctx, &held_stock(&lines)).await?;
        tx.delete_service_record(record.id).await?;
        tx.commit().await?;

        tracing::info!(service_record_id = %record.id, "🗑️ Ordem de serviço removida");
        Ok(())
    }

    pub async fn get_service_record(
        &self,
        actor: &ActorContext,
        record_id: Uuid,
    ) -> Result<ServiceRecordDetail, AppError> {
        RoleModel::require(actor, Permission::ServiceRecordRead)?;
        let mut tx = self.store.begin().await?;
        let record = lookup::service_record(&mut tx, actor, record_id).await?;
        let lines = tx.list_service_record_lines(record.id).await?;
        Ok(ServiceRecordDetail { record, lines })
    }

    /// Histórico do veículo, restrito ao que o ator pode ver.
    pub async fn list_service_records_by_vehicle(
        &self,
        actor: &ActorContext,
        vehicle_id: Uuid,
    ) -> Result<Vec<ServiceRecord>, AppError> {
        RoleModel::require(actor, Permission::ServiceRecordRead)?;
        let mut tx = self.store.begin().await?;
        let records = tx.list_service_records_by_vehicle(vehicle_id).await?;
        Ok(records
            .into_iter()
            .filter(|r| ScopeGuard::can_access(actor, r.scope()))
            .collect())
    }

    async fn resolve_lines(
        tx: &mut S::Tx,
        branch: &Branch,
        record_id: Uuid,
        requests: &[ServiceRecordLineRequest],
    ) -> Result<Vec<ServiceRecordLine>, AppError> {
        let mut lines = Vec::with_capacity(requests.len());
        for (position, request) in requests.iter().enumerate() {
            let (description, catalog_price) = match (request.service_type_id, request.item_id) {
                (Some(service_type_id), None) => {
                    let service = lookup::branch_service_type(tx, branch, service_type_id).await?;
                    (service.name, service.base_price)
                }
                (None, Some(item_id)) => {
                    let item = lookup::branch_item(tx, branch, item_id).await?;
                    (item.name, item.unit_price)
                }
                _ => {
                    return Err(AppError::InvalidInput(
                        "each line must reference exactly one of serviceTypeId or itemId".into(),
                    ))
                }
            };
            let unit_price = request.unit_price.unwrap_or(catalog_price);
            lines.push(ServiceRecordLine {
                id: Uuid::new_v4(),
                service_record_id: record_id,
                position: position as i32,
                service_type_id: request.service_type_id,
                item_id: request.item_id,
                description,
                quantity: request.quantity,
                unit_price,
                total_price: line_total(unit_price, request.quantity)?,
                notes: request.notes.clone(),
            });
        }
        Ok(lines)
    }

    fn movement_context(actor: &ActorContext, record: &ServiceRecord) -> MovementContext {
        MovementContext {
            company_id: record.company_id,
            actor_id: actor.actor_id,
            reference_id: record.id,
            purpose: StockPurpose::Service,
        }
    }
}
