// src/services.rs

pub mod auth;
pub mod catalog_service;
pub mod discount;
pub mod invoice_number;
pub mod invoice_service;
pub mod lookup;
pub mod notification;
pub mod pricing;
pub mod rbac_service;
pub mod scope_guard;
pub mod service_record_service;
pub mod stock_ledger;
pub mod user_service;

pub use auth::{Authenticator, JwtAuthenticator};
pub use catalog_service::CatalogService;
pub use invoice_service::InvoiceService;
pub use pricing::PricingEngine;
pub use rbac_service::RoleModel;
pub use scope_guard::ScopeGuard;
pub use service_record_service::ServiceRecordService;
pub use stock_ledger::StockLedger;
pub use user_service::UserService;
