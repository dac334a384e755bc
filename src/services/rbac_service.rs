// src/services/rbac_service.rs

use crate::common::error::AppError;
use crate::models::auth::{ActorContext, Permission, Role};

// Permissões de leitura (compartilhadas pelos papéis de balcão)
const READ_PERMISSIONS: &[Permission] = &[
    Permission::CompanyRead,
    Permission::BranchRead,
    Permission::UserRead,
    Permission::ItemRead,
    Permission::ServiceTypeRead,
    Permission::ServiceRecordRead,
    Permission::InvoiceRead,
    Permission::ProfileRead,
];

const ALL_PERMISSIONS: &[Permission] = &[
    Permission::CompanyRead,
    Permission::CompanyManage,
    Permission::BranchRead,
    Permission::BranchManage,
    Permission::UserRead,
    Permission::UserCreate,
    Permission::UserUpdate,
    Permission::ItemRead,
    Permission::ItemManage,
    Permission::ItemDiscount,
    Permission::ServiceTypeRead,
    Permission::ServiceTypeManage,
    Permission::ServiceRecordRead,
    Permission::ServiceRecordWrite,
    Permission::InvoiceRead,
    Permission::InvoiceCreate,
    Permission::InvoiceDiscount,
    Permission::InvoiceStatus,
    Permission::InvoiceDelete,
    Permission::ProfileRead,
];

const POS_EXTRA: &[Permission] = &[
    Permission::UserCreate,
    Permission::UserUpdate,
    Permission::ServiceRecordWrite,
    Permission::InvoiceCreate,
    Permission::InvoiceDiscount,
    Permission::InvoiceStatus,
];

const EMPLOYEE_PERMISSIONS: &[Permission] = &[
    Permission::BranchRead,
    Permission::ItemRead,
    Permission::ServiceTypeRead,
    Permission::ServiceRecordRead,
    Permission::ServiceRecordWrite,
    Permission::InvoiceRead,
];

/// Hierarquia fixa de papéis: permissões e tabela de criação.
/// Única fonte da verdade; nenhum call site deve repetir essas regras.
pub struct RoleModel;

impl RoleModel {
    pub fn permissions_of(role: Role) -> Vec<Permission> {
        match role {
            Role::SuperAdmin => ALL_PERMISSIONS.to_vec(),
            Role::CompanyAdmin => ALL_PERMISSIONS
                .iter()
                .copied()
                .filter(|p| *p != Permission::CompanyManage)
                .collect(),
            Role::BranchAdmin => ALL_PERMISSIONS
                .iter()
                .copied()
                .filter(|p| !matches!(p, Permission::CompanyManage | Permission::BranchManage))
                .collect(),
            Role::PosUser => {
                let mut perms: Vec<Permission> =
                    READ_PERMISSIONS.iter().chain(POS_EXTRA).copied().collect();
                perms.sort();
                perms.dedup();
                perms
            }
            Role::Employee => EMPLOYEE_PERMISSIONS.to_vec(),
            Role::Customer => vec![Permission::ProfileRead],
        }
    }

    pub fn has_permission(role: Role, permission: Permission) -> bool {
        Self::permissions_of(role).contains(&permission)
    }

    /// Quais papéis cada papel pode criar.
    pub fn creatable_roles(creator: Role) -> &'static [Role] {
        match creator {
            Role::SuperAdmin => &[Role::SuperAdmin, Role::CompanyAdmin],
            Role::CompanyAdmin => &[Role::BranchAdmin],
            Role::BranchAdmin => &[Role::PosUser, Role::Employee],
            Role::PosUser => &[Role::Customer],
            Role::Employee | Role::Customer => &[],
        }
    }

    pub fn can_create(creator: Role, target: Role) -> bool {
        Self::creatable_roles(creator).contains(&target)
    }

    pub fn ensure_can_create(creator: Role, target: Role) -> Result<(), AppError> {
        if Self::can_create(creator, target) {
            Ok(())
        } else {
            tracing::warn!(
                creator = creator.as_str(),
                target = target.as_str(),
                "Criação de papel negada"
            );
            Err(AppError::Unauthorized("role creation not permitted".into()))
        }
    }

    /// Exige uma permissão fina do ator.
    pub fn require(actor: &ActorContext, permission: Permission) -> Result<(), AppError> {
        if Self::has_permission(actor.role, permission) {
            Ok(())
        } else {
            tracing::warn!(
                actor_id = %actor.actor_id,
                role = actor.role.as_str(),
                permission = permission.slug(),
                "Permissão negada"
            );
            Err(AppError::Unauthorized(format!(
                "missing permission {}",
                permission.slug()
            )))
        }
    }
}
