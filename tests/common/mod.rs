// tests/common/mod.rs

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use pos_backend::{
    db::MemoryStore,
    models::{
        auth::{ActorContext, Role},
        catalog::{DiscountSpec, Item, ServiceType},
        invoice::{CreateInvoiceRequest, InvoiceLineRequest},
        tenancy::Branch,
    },
    services::{
        notification::{Notification, Notifier, SharedNotifier},
        CatalogService, InvoiceService, PricingEngine, ServiceRecordService, UserService,
    },
};

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Guarda tudo o que foi enviado, para as asserções.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

pub struct Actors {
    pub super_admin: ActorContext,
    pub company_admin: ActorContext,
    pub branch_admin: ActorContext,
    pub pos_user: ActorContext,
    pub employee: ActorContext,
    pub customer: ActorContext,
    // Mesma empresa, outra filial
    pub other_branch_pos: ActorContext,
    // Outra empresa
    pub foreign_admin: ActorContext,
}

pub struct Fixture {
    pub store: MemoryStore,
    pub notifier: Arc<RecordingNotifier>,
    pub invoices: InvoiceService<MemoryStore>,
    pub catalog: CatalogService<MemoryStore>,
    pub service_records: ServiceRecordService<MemoryStore>,
    pub users: UserService<MemoryStore>,

    pub company_a: Uuid,
    pub company_b: Uuid,
    pub branch_a1: Branch,
    pub branch_a2: Branch,
    pub branch_b1: Branch,

    // Filial A1: óleo 12.50 com 10% padrão, lavagem 25.00 sem desconto
    pub oil: Item,
    pub filter: Item,
    pub wash: ServiceType,
    // Filial A2
    pub coolant: Item,
    // Empresa B
    pub foreign_item: Item,

    pub actors: Actors,
    pub customer_id: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let company_a = Uuid::new_v4();
        let company_b = Uuid::new_v4();

        let branch_a1 = store.seed_branch(company_a, "Posto Centro").await;
        let branch_a2 = store.seed_branch(company_a, "Posto Rodovia").await;
        let branch_b1 = store.seed_branch(company_b, "Posto Concorrente").await;

        let oil = store
            .seed_item(&branch_a1, "Óleo 5W30", d("12.50"), 10, DiscountSpec::percentage(d("10")))
            .await;
        let filter = store
            .seed_item(&branch_a1, "Filtro de óleo", d("30.00"), 3, DiscountSpec::none())
            .await;
        let wash = store
            .seed_service_type(&branch_a1, "Lavagem", d("25.00"), DiscountSpec::none())
            .await;
        let coolant = store
            .seed_item(&branch_a2, "Aditivo", d("18.00"), 5, DiscountSpec::none())
            .await;
        let foreign_item = store
            .seed_item(&branch_b1, "Óleo importado", d("40.00"), 5, DiscountSpec::none())
            .await;

        let actor = |role: Role, company: Option<Uuid>, branch: Option<Uuid>| {
            ActorContext::new(Uuid::new_v4(), role, company, branch).unwrap()
        };
        let a1 = Some(branch_a1.id);
        let actors = Actors {
            super_admin: ActorContext::super_admin(Uuid::new_v4()),
            company_admin: actor(Role::CompanyAdmin, Some(company_a), None),
            branch_admin: actor(Role::BranchAdmin, Some(company_a), a1),
            pos_user: actor(Role::PosUser, Some(company_a), a1),
            employee: actor(Role::Employee, Some(company_a), a1),
            customer: actor(Role::Customer, Some(company_a), a1),
            other_branch_pos: actor(Role::PosUser, Some(company_a), Some(branch_a2.id)),
            foreign_admin: actor(Role::CompanyAdmin, Some(company_b), None),
        };

        let notifier = Arc::new(RecordingNotifier::default());
        let shared: SharedNotifier = notifier.clone();
        let pricing = PricingEngine::new(d("10"));

        Self {
            invoices: InvoiceService::new(store.clone(), pricing, shared.clone()),
            catalog: CatalogService::new(store.clone()),
            service_records: ServiceRecordService::new(store.clone()),
            users: UserService::new(store.clone(), shared),
            store,
            notifier,
            company_a,
            company_b,
            branch_a1,
            branch_a2,
            branch_b1,
            oil,
            filter,
            wash,
            coolant,
            foreign_item,
            actors,
            customer_id: Uuid::new_v4(),
        }
    }

    pub fn item_line(&self, item: &Item, quantity: i32) -> InvoiceLineRequest {
        InvoiceLineRequest { item_id: Some(item.id), service_type_id: None, quantity, unit_price: None }
    }

    pub fn service_line(&self, service: &ServiceType, quantity: i32) -> InvoiceLineRequest {
        InvoiceLineRequest { item_id: None, service_type_id: Some(service.id), quantity, unit_price: None }
    }

    /// Pedido com filial implícita (a do ator de balcão).
    pub fn invoice_request(&self, lines: Vec<InvoiceLineRequest>) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            customer_id: self.customer_id,
            vehicle_id: None,
            branch_id: None,
            invoice_date: None,
            tax_percentage: None,
            overall_discount: None,
            lines,
        }
    }
}
