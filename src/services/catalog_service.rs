// src/services/catalog_service.rs

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{Store, UnitOfWork},
    models::{
        auth::{ActorContext, Permission},
        catalog::{CreateItemRequest, CreateServiceTypeRequest, DiscountSpec, Item, ServiceType},
        inventory::{StockMovement, StockMovementReason},
    },
    services::{lookup, rbac_service::RoleModel},
};

#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    // --- ITENS ---

    #[tracing::instrument(skip(self, actor, request), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn create_item(&self, actor: &ActorContext, request: CreateItemRequest) -> Result<Item, AppError> {
        RoleModel::require(actor, Permission::ItemManage)?;
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let branch = lookup::target_branch(&mut tx, actor, request.branch_id, "item").await?;

        let name = request.name.trim().to_string();
        if tx.item_name_exists(branch.id, &name).await? {
            return Err(AppError::Conflict(format!("item '{name}' already exists in this branch")));
        }

        let discount = request.default_discount.unwrap_or_default();
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            company_id: branch.company_id,
            branch_id: branch.id,
            name,
            description: request.description,
            unit_price: request.unit_price,
            unit: request.unit,
            stock_quantity: request.stock_quantity,
            min_stock_level: request.min_stock_level,
            default_discount_type: discount.discount_type,
            default_discount_value: discount.value,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tx.insert_item(&item).await?;

        // Saldo inicial vai para o histórico
        if item.stock_quantity > 0 {
            tx.insert_stock_movement(&StockMovement {
                id: Uuid::new_v4(),
                company_id: item.company_id,
                item_id: item.id,
                quantity_changed: item.stock_quantity,
                reason: StockMovementReason::InitialStock,
                reference_id: None,
                created_by: actor.actor_id,
                created_at: now,
            })
            .await?;
        }
        tx.commit().await?;

        tracing::info!(item_id = %item.id, branch_id = %item.branch_id, stock = item.stock_quantity, "📦 Item criado");
        Ok(item)
    }

    pub async fn get_item(&self, actor: &ActorContext, item_id: Uuid) -> Result<Item, AppError> {
        RoleModel::require(actor, Permission::ItemRead)?;
        let mut tx = self.store.begin().await?;
        lookup::item(&mut tx, actor, item_id).await
    }

    pub async fn update_item_discount(
        &self,
        actor: &ActorContext,
        item_id: Uuid,
        discount: DiscountSpec,
    ) -> Result<Item, AppError> {
        RoleModel::require(actor, Permission::ItemDiscount)?;
        discount.check()?;

        let mut tx = self.store.begin().await?;
        let mut item = lookup::item(&mut tx, actor, item_id).await?;
        item.set_default_discount(discount);
        tx.update_item_discount(&item).await?;
        tx.commit().await?;

        tracing::info!(item_id = %item.id, value = %discount.value, "Desconto padrão do item atualizado");
        Ok(item)
    }

    // --- TIPOS DE SERVIÇO ---

    #[tracing::instrument(skip(self, actor, request), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn create_service_type(
        &self,
        actor: &ActorContext,
        request: CreateServiceTypeRequest,
    ) -> Result<ServiceType, AppError> {
        RoleModel::require(actor, Permission::ServiceTypeManage)?;
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let branch = lookup::target_branch(&mut tx, actor, request.branch_id, "service type").await?;

        let name = request.name.trim().to_string();
        if tx.service_type_name_exists(branch.id, &name).await? {
            return Err(AppError::Conflict(format!(
                "service type '{name}' already exists in this branch"
            )));
        }

        let discount = request.default_discount.unwrap_or_default();
        let now = Utc::now();
        let service_type = ServiceType {
            id: Uuid::new_v4(),
            company_id: branch.company_id,
            branch_id: branch.id,
            name,
            description: request.description,
            base_price: request.base_price,
            estimated_duration_minutes: request.estimated_duration_minutes,
            default_discount_type: discount.discount_type,
            default_discount_value: discount.value,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tx.insert_service_type(&service_type).await?;
        tx.commit().await?;

        tracing::info!(service_type_id = %service_type.id, "🔧 Tipo de serviço criado");
        Ok(service_type)
    }

    pub async fn get_service_type(&self, actor: &ActorContext, service_type_id: Uuid) -> Result<ServiceType, AppError> {
        RoleModel::require(actor, Permission::ServiceTypeRead)?;
        let mut tx = self.store.begin().await?;
        lookup::service_type(&mut tx, actor, service_type_id).await
    }

    pub async fn update_service_type_discount(
        &self,
        actor: &ActorContext,
        service_type_id: Uuid,
        discount: DiscountSpec,
    ) -> Result<ServiceType, AppError> {
        RoleModel::require(actor, Permission::ItemDiscount)?;
        discount.check()?;

        let mut tx = self.store.begin().await?;
        let mut service_type = lookup::service_type(&mut tx, actor, service_type_id).await?;
        service_type.set_default_discount(discount);
        tx.update_service_type_discount(&service_type).await?;
        tx.commit().await?;

        tracing::info!(service_type_id = %service_type.id, value = %discount.value, "Desconto padrão do serviço atualizado");
        Ok(service_type)
    }
}
