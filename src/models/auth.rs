// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;
use crate::models::tenancy::TenantScope;

// ---
// 1. Papéis (hierarquia fixa, definida em tempo de compilação)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    CompanyAdmin,
    BranchAdmin,
    PosUser,
    Employee,
    Customer,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::SuperAdmin,
        Role::CompanyAdmin,
        Role::BranchAdmin,
        Role::PosUser,
        Role::Employee,
        Role::Customer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::CompanyAdmin => "COMPANY_ADMIN",
            Role::BranchAdmin => "BRANCH_ADMIN",
            Role::PosUser => "POS_USER",
            Role::Employee => "EMPLOYEE",
            Role::Customer => "CUSTOMER",
        }
    }

    /// Papéis que precisam de empresa.
    pub fn requires_company(&self) -> bool {
        !matches!(self, Role::SuperAdmin)
    }

    /// Papéis que precisam de filial.
    pub fn requires_branch(&self) -> bool {
        matches!(
            self,
            Role::BranchAdmin | Role::PosUser | Role::Employee | Role::Customer
        )
    }

    /// Valida o par (empresa, filial) exigido por cada papel.
    pub fn check_scope(&self, company_id: Option<Uuid>, branch_id: Option<Uuid>) -> Result<(), AppError> {
        match self {
            Role::SuperAdmin if company_id.is_some() || branch_id.is_some() => Err(
                AppError::InvalidInput("SUPER_ADMIN cannot be bound to a company or branch".into()),
            ),
            Role::CompanyAdmin if branch_id.is_some() => Err(AppError::InvalidInput(
                "COMPANY_ADMIN cannot be bound to a branch".into(),
            )),
            role if role.requires_company() && company_id.is_none() => Err(AppError::InvalidInput(
                format!("{} requires a companyId", role.as_str()),
            )),
            role if role.requires_branch() && branch_id.is_none() => Err(AppError::InvalidInput(
                format!("{} requires a branchId", role.as_str()),
            )),
            _ => Ok(()),
        }
    }
}

// ---
// 2. Permissões finas (resource:action)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    CompanyRead,
    CompanyManage,
    BranchRead,
    BranchManage,
    UserRead,
    UserCreate,
    UserUpdate,
    ItemRead,
    ItemManage,
    ItemDiscount,
    ServiceTypeRead,
    ServiceTypeManage,
    ServiceRecordRead,
    ServiceRecordWrite,
    InvoiceRead,
    InvoiceCreate,
    InvoiceDiscount,
    InvoiceStatus,
    InvoiceDelete,
    ProfileRead,
}

impl Permission {
    pub fn slug(&self) -> &'static str {
        match self {
            Permission::CompanyRead => "company:read",
            Permission::CompanyManage => "company:manage",
            Permission::BranchRead => "branch:read",
            Permission::BranchManage => "branch:manage",
            Permission::UserRead => "user:read",
            Permission::UserCreate => "user:create",
            Permission::UserUpdate => "user:update",
            Permission::ItemRead => "item:read",
            Permission::ItemManage => "item:manage",
            Permission::ItemDiscount => "item:discount",
            Permission::ServiceTypeRead => "service_type:read",
            Permission::ServiceTypeManage => "service_type:manage",
            Permission::ServiceRecordRead => "service_record:read",
            Permission::ServiceRecordWrite => "service_record:write",
            Permission::InvoiceRead => "invoice:read",
            Permission::InvoiceCreate => "invoice:create",
            Permission::InvoiceDiscount => "invoice:discount",
            Permission::InvoiceStatus => "invoice:status",
            Permission::InvoiceDelete => "invoice:delete",
            Permission::ProfileRead => "profile:read",
        }
    }
}

// ---
// 3. Contexto do ator (por requisição, imutável)
// ---
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    pub actor_id: Uuid,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
}

impl ActorContext {
    pub fn new(
        actor_id: Uuid,
        role: Role,
        company_id: Option<Uuid>,
        branch_id: Option<Uuid>,
    ) -> Result<Self, AppError> {
        role.check_scope(company_id, branch_id)?;
        Ok(Self { actor_id, role, company_id, branch_id })
    }

    pub fn super_admin(actor_id: Uuid) -> Self {
        Self { actor_id, role: Role::SuperAdmin, company_id: None, branch_id: None }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Filtro de tenant usado nas buscas por id: fora da empresa = "não encontrado".
    pub fn within_company(&self, company_id: Uuid) -> bool {
        self.is_super_admin() || self.company_id == Some(company_id)
    }
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub exp: usize,
    pub iat: usize,
}

// ---
// 4. Usuários (staff e clientes)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// SUPER_ADMIN não tem escopo de tenant.
    pub fn scope(&self) -> Option<TenantScope> {
        self.company_id.map(|company_id| TenantScope {
            company_id,
            branch_id: self.branch_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserUniqueField {
    Username,
    PhoneNumber,
    Email,
}

impl UserUniqueField {
    pub fn label(&self) -> &'static str {
        match self {
            UserUniqueField::Username => "username",
            UserUniqueField::PhoneNumber => "phone number",
            UserUniqueField::Email => "email",
        }
    }
}

// Dados para criação de um usuário
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "firstName is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "lastName is required"))]
    pub last_name: String,
    #[validate(length(min = 3, message = "username must have at least 3 characters"))]
    pub username: String,
    #[validate(length(min = 5, message = "phoneNumber is invalid"))]
    pub phone_number: String,
    #[validate(email(message = "email is invalid"))]
    pub email: Option<String>,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_scope_shape_follows_role() {
        let company = Uuid::new_v4();
        let branch = Uuid::new_v4();

        assert!(ActorContext::new(Uuid::new_v4(), Role::SuperAdmin, None, None).is_ok());
        assert!(ActorContext::new(Uuid::new_v4(), Role::CompanyAdmin, Some(company), None).is_ok());
        assert!(ActorContext::new(Uuid::new_v4(), Role::PosUser, Some(company), Some(branch)).is_ok());

        assert!(ActorContext::new(Uuid::new_v4(), Role::CompanyAdmin, None, None).is_err());
        assert!(ActorContext::new(Uuid::new_v4(), Role::BranchAdmin, Some(company), None).is_err());
        assert!(ActorContext::new(Uuid::new_v4(), Role::SuperAdmin, Some(company), None).is_err());
    }

    #[test]
    fn role_tags_are_screaming_snake_case() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }
}
