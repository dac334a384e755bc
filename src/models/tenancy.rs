// src/models/tenancy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---
// 1. Filial (pertence a uma única empresa)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn scope(&self) -> TenantScope {
        TenantScope::branch(self)
    }
}

// ---
// 2. Escopo de tenant (empresa, filial)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantScope {
    pub company_id: Uuid,
    pub branch_id: Option<Uuid>,
}

impl TenantScope {
    /// Entidades de nível empresa.
    pub fn company(company_id: Uuid) -> Self {
        Self { company_id, branch_id: None }
    }

    /// A empresa sempre vem da própria filial, nunca de forma independente.
    pub fn branch(branch: &Branch) -> Self {
        Self {
            company_id: branch.company_id,
            branch_id: Some(branch.id),
        }
    }
}
