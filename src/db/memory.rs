// src/db/memory.rs

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{Store, UnitOfWork},
    models::{
        auth::{Role, User, UserUniqueField},
        catalog::{DiscountSpec, Item, ServiceType},
        inventory::{StockMovement, StockRecord, StockUpdate},
        invoice::{Invoice, InvoiceFilter, InvoiceLine},
        service_record::{ServiceRecord, ServiceRecordLine},
        tenancy::Branch,
    },
};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    branches: HashMap<Uuid, Branch>,
    items: HashMap<Uuid, Item>,
    service_types: HashMap<Uuid, ServiceType>,
    movements: Vec<StockMovement>,
    invoice_sequences: HashMap<(Uuid, NaiveDate), i32>,
    invoices: HashMap<Uuid, Invoice>,
    invoice_lines: HashMap<Uuid, Vec<InvoiceLine>>,
    service_records: HashMap<Uuid, ServiceRecord>,
    service_record_lines: HashMap<Uuid, Vec<ServiceRecordLine>>,
    users: HashMap<Uuid, User>,
}

/// Armazenamento em processo. Uma unidade de trabalho segura o lock do
/// estado inteiro e trabalha sobre uma cópia, então as transações são
/// serializadas e o commit é tudo-ou-nada.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---
    // Helpers de carga (dados que vêm de fora do núcleo)
    // ---

    pub async fn seed_branch(&self, company_id: Uuid, name: &str) -> Branch {
        let branch = Branch {
            id: Uuid::new_v4(),
            company_id,
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.state.lock().await.branches.insert(branch.id, branch.clone());
        branch
    }

    pub async fn seed_item(
        &self,
        branch: &Branch,
        name: &str,
        unit_price: Decimal,
        stock_quantity: i32,
        default_discount: DiscountSpec,
    ) -> Item {
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            company_id: branch.company_id,
            branch_id: branch.id,
            name: name.to_string(),
            description: None,
            unit_price,
            unit: None,
            stock_quantity,
            min_stock_level: None,
            default_discount_type: default_discount.discount_type,
            default_discount_value: default_discount.value,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.items.insert(item.id, item.clone());
        item
    }

    pub async fn seed_service_type(
        &self,
        branch: &Branch,
        name: &str,
        base_price: Decimal,
        default_discount: DiscountSpec,
    ) -> ServiceType {
        let now = Utc::now();
        let service_type = ServiceType {
            id: Uuid::new_v4(),
            company_id: branch.company_id,
            branch_id: branch.id,
            name: name.to_string(),
            description: None,
            base_price,
            estimated_duration_minutes: None,
            default_discount_type: default_discount.discount_type,
            default_discount_value: default_discount.value,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .service_types
            .insert(service_type.id, service_type.clone());
        service_type
    }

    pub async fn seed_user(
        &self,
        role: Role,
        company_id: Option<Uuid>,
        branch_id: Option<Uuid>,
        username: &str,
    ) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            company_id,
            branch_id,
            first_name: username.to_string(),
            last_name: "Seed".to_string(),
            username: username.to_string(),
            phone_number: format!("+55-{}", &Uuid::new_v4().simple().to_string()[..8]),
            email: None,
            role,
            is_active: true,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.users.insert(user.id, user.clone());
        user
    }

    // ---
    // Inspeção
    // ---

    pub async fn stock_of(&self, item_id: Uuid) -> Option<i32> {
        self.state.lock().await.items.get(&item_id).map(|i| i.stock_quantity)
    }

    pub async fn stock_movements(&self, item_id: Uuid) -> Vec<StockMovement> {
        self.state
            .lock()
            .await
            .movements
            .iter()
            .filter(|m| m.item_id == item_id)
            .cloned()
            .collect()
    }

    pub async fn invoice_count(&self) -> usize {
        self.state.lock().await.invoices.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryUnitOfWork { guard, work })
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

fn missing(resource: &str) -> AppError {
    AppError::not_found(resource)
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self) -> Result<(), AppError> {
        let MemoryUnitOfWork { mut guard, work } = self;
        *guard = work;
        Ok(())
    }

    async fn find_branch(&mut self, id: Uuid) -> Result<Option<Branch>, AppError> {
        Ok(self.work.branches.get(&id).cloned())
    }

    async fn find_item(&mut self, id: Uuid) -> Result<Option<Item>, AppError> {
        Ok(self.work.items.get(&id).cloned())
    }

    async fn item_name_exists(&mut self, branch_id: Uuid, name: &str) -> Result<bool, AppError> {
        Ok(self
            .work
            .items
            .values()
            .any(|i| i.branch_id == branch_id && i.name.eq_ignore_ascii_case(name)))
    }

    async fn insert_item(&mut self, item: &Item) -> Result<(), AppError> {
        self.work.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_item_discount(&mut self, item: &Item) -> Result<(), AppError> {
        let stored = self.work.items.get_mut(&item.id).ok_or_else(|| missing("item"))?;
        stored.set_default_discount(item.default_discount());
        Ok(())
    }

    async fn find_service_type(&mut self, id: Uuid) -> Result<Option<ServiceType>, AppError> {
        Ok(self.work.service_types.get(&id).cloned())
    }

    async fn service_type_name_exists(&mut self, branch_id: Uuid, name: &str) -> Result<bool, AppError> {
        Ok(self
            .work
            .service_types
            .values()
            .any(|s| s.branch_id == branch_id && s.name.eq_ignore_ascii_case(name)))
    }

    async fn insert_service_type(&mut self, service_type: &ServiceType) -> Result<(), AppError> {
        self.work.service_types.insert(service_type.id, service_type.clone());
        Ok(())
    }

    async fn update_service_type_discount(&mut self, service_type: &ServiceType) -> Result<(), AppError> {
        let stored = self
            .work
            .service_types
            .get_mut(&service_type.id)
            .ok_or_else(|| missing("service type"))?;
        stored.set_default_discount(service_type.default_discount());
        Ok(())
    }

    async fn adjust_stock(&mut self, item_id: Uuid, delta: i32) -> Result<StockUpdate, AppError> {
        let item = self.work.items.get_mut(&item_id).ok_or_else(|| missing("item"))?;
        let next = item.stock_quantity + delta;
        if next < 0 {
            return Ok(StockUpdate::Insufficient { available: item.stock_quantity });
        }
        item.stock_quantity = next;
        item.updated_at = Utc::now();
        Ok(StockUpdate::Applied(StockRecord {
            item_id,
            quantity: next,
            min_stock_level: item.min_stock_level,
        }))
    }

    async fn insert_stock_movement(&mut self, movement: &StockMovement) -> Result<(), AppError> {
        self.work.movements.push(movement.clone());
        Ok(())
    }

    async fn next_invoice_sequence(&mut self, company_id: Uuid, date: NaiveDate) -> Result<i32, AppError> {
        let counter = self.work.invoice_sequences.entry((company_id, date)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice, lines: &[InvoiceLine]) -> Result<(), AppError> {
        let duplicated = self.work.invoices.values().any(|i| {
            i.company_id == invoice.company_id && i.invoice_number == invoice.invoice_number
        });
        if duplicated {
            return Err(AppError::Conflict(format!(
                "invoice number {} already exists",
                invoice.invoice_number
            )));
        }
        self.work.invoices.insert(invoice.id, invoice.clone());
        self.work.invoice_lines.insert(invoice.id, lines.to_vec());
        Ok(())
    }

    async fn find_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.work.invoices.get(&id).cloned())
    }

    async fn find_invoice_by_number(&mut self, company_id: Uuid, number: &str) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .work
            .invoices
            .values()
            .find(|i| i.company_id == company_id && i.invoice_number == number)
            .cloned())
    }

    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let mut invoices: Vec<Invoice> = self
            .work
            .invoices
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| {
            b.invoice_date
                .cmp(&a.invoice_date)
                .then_with(|| b.invoice_number.cmp(&a.invoice_number))
        });
        Ok(invoices)
    }

    async fn list_invoice_lines(&mut self, invoice_id: Uuid) -> Result<Vec<InvoiceLine>, AppError> {
        let mut lines = self.work.invoice_lines.get(&invoice_id).cloned().unwrap_or_default();
        lines.sort_by_key(|l| l.position);
        Ok(lines)
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError> {
        let stored = self.work.invoices.get_mut(&invoice.id).ok_or_else(|| missing("invoice"))?;
        *stored = invoice.clone();
        Ok(())
    }

    async fn update_invoice_lines(&mut self, lines: &[InvoiceLine]) -> Result<(), AppError> {
        for line in lines {
            let stored = self
                .work
                .invoice_lines
                .get_mut(&line.invoice_id)
                .and_then(|ls| ls.iter_mut().find(|l| l.id == line.id))
                .ok_or_else(|| missing("invoice line"))?;
            *stored = line.clone();
        }
        Ok(())
    }

    async fn replace_invoice_lines(&mut self, invoice_id: Uuid, lines: &[InvoiceLine]) -> Result<(), AppError> {
        if !self.work.invoices.contains_key(&invoice_id) {
            return Err(missing("invoice"));
        }
        self.work.invoice_lines.insert(invoice_id, lines.to_vec());
        Ok(())
    }

    async fn delete_invoice(&mut self, id: Uuid) -> Result<(), AppError> {
        self.work.invoices.remove(&id).ok_or_else(|| missing("invoice"))?;
        self.work.invoice_lines.remove(&id);
        for record in self.work.service_records.values_mut() {
            if record.invoice_id == Some(id) {
                record.invoice_id = None;
            }
        }
        Ok(())
    }

    async fn insert_service_record(&mut self, record: &ServiceRecord, lines: &[ServiceRecordLine]) -> Result<(), AppError> {
        self.work.service_records.insert(record.id, record.clone());
        self.work.service_record_lines.insert(record.id, lines.to_vec());
        Ok(())
    }

    async fn find_service_record(&mut self, id: Uuid) -> Result<Option<ServiceRecord>, AppError> {
        Ok(self.work.service_records.get(&id).cloned())
    }

    async fn list_service_records_by_vehicle(&mut self, vehicle_id: Uuid) -> Result<Vec<ServiceRecord>, AppError> {
        let mut records: Vec<ServiceRecord> = self
            .work
            .service_records
            .values()
            .filter(|r| r.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.service_date.cmp(&a.service_date));
        Ok(records)
    }

    async fn list_service_record_lines(&mut self, record_id: Uuid) -> Result<Vec<ServiceRecordLine>, AppError> {
        let mut lines = self
            .work
            .service_record_lines
            .get(&record_id)
            .cloned()
            .unwrap_or_default();
        lines.sort_by_key(|l| l.position);
        Ok(lines)
    }

    async fn update_service_record(&mut self, record: &ServiceRecord) -> Result<(), AppError> {
        let stored = self
            .work
            .service_records
            .get_mut(&record.id)
            .ok_or_else(|| missing("service record"))?;
        *stored = record.clone();
        Ok(())
    }

    async fn replace_service_record_lines(&mut self, record_id: Uuid, lines: &[ServiceRecordLine]) -> Result<(), AppError> {
        if !self.work.service_records.contains_key(&record_id) {
            return Err(missing("service record"));
        }
        self.work.service_record_lines.insert(record_id, lines.to_vec());
        Ok(())
    }

    async fn delete_service_record(&mut self, id: Uuid) -> Result<(), AppError> {
        self.work
            .service_records
            .remove(&id)
            .ok_or_else(|| missing("service record"))?;
        self.work.service_record_lines.remove(&id);
        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), AppError> {
        self.work.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn find_user_conflict(
        &mut self,
        username: &str,
        phone_number: &str,
        email: Option<&str>,
    ) -> Result<Option<UserUniqueField>, AppError> {
        let users = || self.work.users.values();
        if users().any(|u| u.username == username) {
            return Ok(Some(UserUniqueField::Username));
        }
        if users().any(|u| u.phone_number == phone_number) {
            return Ok(Some(UserUniqueField::PhoneNumber));
        }
        if let Some(email) = email {
            if users().any(|u| u.email.as_deref() == Some(email)) {
                return Ok(Some(UserUniqueField::Email));
            }
        }
        Ok(None)
    }

    async fn update_user(&mut self, user: &User) -> Result<(), AppError> {
        let stored = self.work.users.get_mut(&user.id).ok_or_else(|| missing("user"))?;
        *stored = user.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_unit_of_work_discards_changes() {
        let store = MemoryStore::new();
        let branch = store.seed_branch(Uuid::new_v4(), "Centro").await;
        let item = store
            .seed_item(&branch, "Filtro", Decimal::TEN, 5, DiscountSpec::none())
            .await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.adjust_stock(item.id, -3).await.unwrap();
        }
        assert_eq!(store.stock_of(item.id).await, Some(5));

        let mut tx = store.begin().await.unwrap();
        tx.adjust_stock(item.id, -3).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.stock_of(item.id).await, Some(2));
    }

    #[tokio::test]
    async fn adjust_stock_never_goes_negative() {
        let store = MemoryStore::new();
        let branch = store.seed_branch(Uuid::new_v4(), "Centro").await;
        let item = store
            .seed_item(&branch, "Óleo", Decimal::TEN, 2, DiscountSpec::none())
            .await;

        let mut tx = store.begin().await.unwrap();
        let update = tx.adjust_stock(item.id, -3).await.unwrap();
        assert_eq!(update, StockUpdate::Insufficient { available: 2 });
        tx.commit().await.unwrap();
        assert_eq!(store.stock_of(item.id).await, Some(2));
    }
}
