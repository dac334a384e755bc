// src/db/store.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{User, UserUniqueField},
        catalog::{Item, ServiceType},
        inventory::{StockMovement, StockUpdate},
        invoice::{Invoice, InvoiceFilter, InvoiceLine},
        service_record::{ServiceRecord, ServiceRecordLine},
        tenancy::Branch,
    },
};

/// Fonte de unidades de trabalho (Postgres em produção, memória nos testes).
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: UnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, AppError>;
}

/// Uma transação. Tudo que não passar por `commit` é descartado no drop.
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    async fn commit(self) -> Result<(), AppError>;

    // --- Filiais ---
    async fn find_branch(&mut self, id: Uuid) -> Result<Option<Branch>, AppError>;

    // --- Catálogo ---
    async fn find_item(&mut self, id: Uuid) -> Result<Option<Item>, AppError>;
    async fn item_name_exists(&mut self, branch_id: Uuid, name: &str) -> Result<bool, AppError>;
    async fn insert_item(&mut self, item: &Item) -> Result<(), AppError>;
    async fn update_item_discount(&mut self, item: &Item) -> Result<(), AppError>;

    async fn find_service_type(&mut self, id: Uuid) -> Result<Option<ServiceType>, AppError>;
    async fn service_type_name_exists(&mut self, branch_id: Uuid, name: &str) -> Result<bool, AppError>;
    async fn insert_service_type(&mut self, service_type: &ServiceType) -> Result<(), AppError>;
    async fn update_service_type_discount(&mut self, service_type: &ServiceType) -> Result<(), AppError>;

    // --- Estoque ---

    /// Soma `delta` ao saldo do item, atomicamente, sem nunca deixá-lo negativo.
    async fn adjust_stock(&mut self, item_id: Uuid, delta: i32) -> Result<StockUpdate, AppError>;
    async fn insert_stock_movement(&mut self, movement: &StockMovement) -> Result<(), AppError>;

    // --- Faturas ---

    /// Próximo valor do contador (empresa, dia). Começa em 1.
    async fn next_invoice_sequence(&mut self, company_id: Uuid, date: NaiveDate) -> Result<i32, AppError>;
    async fn insert_invoice(&mut self, invoice: &Invoice, lines: &[InvoiceLine]) -> Result<(), AppError>;
    async fn find_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError>;
    async fn find_invoice_by_number(&mut self, company_id: Uuid, number: &str) -> Result<Option<Invoice>, AppError>;
    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError>;
    async fn list_invoice_lines(&mut self, invoice_id: Uuid) -> Result<Vec<InvoiceLine>, AppError>;
    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError>;
    async fn update_invoice_lines(&mut self, lines: &[InvoiceLine]) -> Result<(), AppError>;
    async fn replace_invoice_lines(&mut self, invoice_id: Uuid, lines: &[InvoiceLine]) -> Result<(), AppError>;
    async fn delete_invoice(&mut self, id: Uuid) -> Result<(), AppError>;

    // --- Ordens de serviço ---
    async fn insert_service_record(&mut self, record: &ServiceRecord, lines: &[ServiceRecordLine]) -> Result<(), AppError>;
    async fn find_service_record(&mut self, id: Uuid) -> Result<Option<ServiceRecord>, AppError>;
    async fn list_service_records_by_vehicle(&mut self, vehicle_id: Uuid) -> Result<Vec<ServiceRecord>, AppError>;
    async fn list_service_record_lines(&mut self, record_id: Uuid) -> Result<Vec<ServiceRecordLine>, AppError>;
    async fn update_service_record(&mut self, record: &ServiceRecord) -> Result<(), AppError>;
    async fn replace_service_record_lines(&mut self, record_id: Uuid, lines: &[ServiceRecordLine]) -> Result<(), AppError>;
    async fn delete_service_record(&mut self, id: Uuid) -> Result<(), AppError>;

    // --- Usuários ---
    async fn insert_user(&mut self, user: &User) -> Result<(), AppError>;
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Primeiro campo único já usado por outro usuário, se houver.
    async fn find_user_conflict(
        &mut self,
        username: &str,
        phone_number: &str,
        email: Option<&str>,
    ) -> Result<Option<UserUniqueField>, AppError>;
    async fn update_user(&mut self, user: &User) -> Result<(), AppError>;
}
