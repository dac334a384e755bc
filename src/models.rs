// src/models.rs

pub mod auth;
pub mod catalog;
pub mod inventory;
pub mod invoice;
pub mod service_record;
pub mod tenancy;
