// src/services/lookup.rs

// Buscas por id que já aplicam o tenant do ator:
// ausente ou de outra empresa = NotFound; outra filial da mesma empresa = Unauthorized.

use uuid::Uuid;

use crate::common::error::AppError;
use crate::db::UnitOfWork;
use crate::models::auth::ActorContext;
use crate::models::catalog::{Item, ServiceType};
use crate::models::invoice::Invoice;
use crate::models::service_record::ServiceRecord;
use crate::models::tenancy::{Branch, TenantScope};
use crate::services::scope_guard::ScopeGuard;

fn scoped<T>(
    actor: &ActorContext,
    found: Option<T>,
    scope_of: impl Fn(&T) -> TenantScope,
    resource: &str,
) -> Result<T, AppError> {
    let entity = found
        .filter(|e| actor.within_company(scope_of(e).company_id))
        .ok_or_else(|| AppError::not_found(resource))?;
    ScopeGuard::authorize_resource_access(actor, scope_of(&entity), resource)?;
    Ok(entity)
}

pub async fn branch<U: UnitOfWork>(
    tx: &mut U,
    actor: &ActorContext,
    branch_id: Uuid,
    resource: &str,
) -> Result<Branch, AppError> {
    let found = tx.find_branch(branch_id).await?.filter(|b| b.is_active);
    let branch = found
        .filter(|b| actor.within_company(b.company_id))
        .ok_or_else(|| AppError::not_found("branch"))?;
    ScopeGuard::authorize_branch_access(actor, &branch, resource)?;
    Ok(branch)
}

/// Filial de destino: a do ator, ou a informada (obrigatória para atores de nível empresa).
pub async fn target_branch<U: UnitOfWork>(
    tx: &mut U,
    actor: &ActorContext,
    requested: Option<Uuid>,
    resource: &str,
) -> Result<Branch, AppError> {
    let branch_id = requested
        .or(actor.branch_id)
        .ok_or_else(|| AppError::InvalidInput("branchId is required".into()))?;
    branch(tx, actor, branch_id, resource).await
}

pub async fn invoice<U: UnitOfWork>(
    tx: &mut U,
    actor: &ActorContext,
    invoice_id: Uuid,
) -> Result<Invoice, AppError> {
    let found = tx.find_invoice(invoice_id).await?;
    scoped(actor, found, Invoice::scope, "invoice")
}

pub async fn service_record<U: UnitOfWork>(
    tx: &mut U,
    actor: &ActorContext,
    record_id: Uuid,
) -> Result<ServiceRecord, AppError> {
    let found = tx.find_service_record(record_id).await?;
    scoped(actor, found, ServiceRecord::scope, "service record")
}

pub async fn item<U: UnitOfWork>(
    tx: &mut U,
    actor: &ActorContext,
    item_id: Uuid,
) -> Result<Item, AppError> {
    let found = tx.find_item(item_id).await?.filter(|i| i.is_active);
    scoped(actor, found, Item::scope, "item")
}

pub async fn service_type<U: UnitOfWork>(
    tx: &mut U,
    actor: &ActorContext,
    service_type_id: Uuid,
) -> Result<ServiceType, AppError> {
    let found = tx.find_service_type(service_type_id).await?.filter(|s| s.is_active);
    scoped(actor, found, ServiceType::scope, "service type")
}

/// Item ativo da própria filial (a filial já foi autorizada).
pub async fn branch_item<U: UnitOfWork>(
    tx: &mut U,
    branch: &Branch,
    item_id: Uuid,
) -> Result<Item, AppError> {
    tx.find_item(item_id)
        .await?
        .filter(|i| i.is_active && i.branch_id == branch.id)
        .ok_or_else(|| AppError::not_found("item"))
}

pub async fn branch_service_type<U: UnitOfWork>(
    tx: &mut U,
    branch: &Branch,
    service_type_id: Uuid,
) -> Result<ServiceType, AppError> {
    tx.find_service_type(service_type_id)
        .await?
        .filter(|s| s.is_active && s.branch_id == branch.id)
        .ok_or_else(|| AppError::not_found("service type"))
}
