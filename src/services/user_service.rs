// src/services/user_service.rs

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{Store, UnitOfWork},
    models::{
        auth::{ActorContext, CreateUserRequest, Permission, Role, User},
        tenancy::TenantScope,
    },
    services::{
        lookup,
        notification::{notify_best_effort, Notification, SharedNotifier},
        rbac_service::RoleModel,
        scope_guard::ScopeGuard,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserAccess {
    Read,
    Update,
}

/// Tenant pelo ScopeGuard; depois as regras de papel sobre o usuário alvo.
fn check_user_access(actor: &ActorContext, target: &User, access: UserAccess) -> Result<(), AppError> {
    if let Some(scope) = target.scope() {
        ScopeGuard::authorize_resource_access(actor, scope, "user")?;
    }
    let allowed = match actor.role {
        Role::SuperAdmin | Role::CompanyAdmin => true,
        // Abaixo da empresa só se enxerga quem está numa filial
        Role::BranchAdmin => target.branch_id.is_some(),
        Role::PosUser => {
            target.branch_id.is_some()
                && match access {
                    UserAccess::Read => matches!(target.role, Role::Customer | Role::Employee),
                    UserAccess::Update => target.role == Role::Customer,
                }
        }
        Role::Employee | Role::Customer => false,
    };
    if allowed {
        return Ok(());
    }
    tracing::warn!(actor_id = %actor.actor_id, target_id = %target.id, ?access, "Acesso a usuário negado");
    Err(AppError::Unauthorized(match access {
        UserAccess::Read => "cannot read this user".into(),
        UserAccess::Update => "cannot update this user".into(),
    }))
}

#[derive(Clone)]
pub struct UserService<S: Store> {
    store: S,
    notifier: SharedNotifier,
}

impl<S: Store> UserService<S> {
    pub fn new(store: S, notifier: SharedNotifier) -> Self {
        Self { store, notifier }
    }

    #[tracing::instrument(skip(self, actor, request), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn create_user(&self, actor: &ActorContext, request: CreateUserRequest) -> Result<User, AppError> {
        RoleModel::require(actor, Permission::UserCreate)?;
        RoleModel::ensure_can_create(actor.role, request.role)?;
        request.validate()?;

        // Empresa e filial do novo usuário vêm do ator, exceto para os papéis de topo
        let company_id = match actor.role {
            Role::SuperAdmin => request.company_id,
            _ => actor.company_id,
        };
        let branch_id = match actor.role {
            Role::SuperAdmin | Role::CompanyAdmin => request.branch_id,
            _ => actor.branch_id,
        };
        request.role.check_scope(company_id, branch_id)?;

        let mut tx = self.store.begin().await?;

        if let Some(branch_id) = branch_id {
            let branch = lookup::branch(&mut tx, actor, branch_id, "user").await?;
            if Some(branch.company_id) != company_id {
                return Err(AppError::InvalidInput("branch does not belong to the company".into()));
            }
        }
        if let Some(company_id) = company_id {
            ScopeGuard::authorize_resource_access(actor, TenantScope { company_id, branch_id }, "user")?;
        }

        let email = request.email.filter(|e| !e.trim().is_empty());
        if let Some(field) = tx
            .find_user_conflict(&request.username, &request.phone_number, email.as_deref())
            .await?
        {
            return Err(AppError::Conflict(format!("{} already exists", field.label())));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            company_id,
            branch_id,
            first_name: request.first_name,
            last_name: request.last_name,
            username: request.username,
            phone_number: request.phone_number,
            email,
            role: request.role,
            is_active: true,
            created_by: Some(actor.actor_id),
            created_at: now,
            updated_at: now,
        };
        tx.insert_user(&user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, new_role = user.role.as_str(), "👤 Usuário criado");
        notify_best_effort(
            self.notifier.as_ref(),
            Notification::Welcome {
                user_id: user.id,
                email: user.email.clone(),
                phone_number: user.phone_number.clone(),
                first_name: user.first_name.clone(),
                role: user.role,
            },
        )
        .await;

        Ok(user)
    }

    pub async fn get_user(&self, actor: &ActorContext, user_id: Uuid) -> Result<User, AppError> {
        RoleModel::require(actor, Permission::UserRead)?;
        let mut tx = self.store.begin().await?;
        let user = Self::find_visible(&mut tx, actor, user_id, true).await?;
        check_user_access(actor, &user, UserAccess::Read)?;
        Ok(user)
    }

    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn deactivate_user(&self, actor: &ActorContext, user_id: Uuid) -> Result<User, AppError> {
        RoleModel::require(actor, Permission::UserUpdate)?;
        let mut tx = self.store.begin().await?;
        let mut user = Self::find_visible(&mut tx, actor, user_id, false).await?;
        check_user_access(actor, &user, UserAccess::Update)?;

        user.is_active = false;
        user.updated_at = Utc::now();
        tx.update_user(&user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Usuário desativado");
        Ok(user)
    }

    /// Usuário de outra empresa é tratado como inexistente.
    async fn find_visible(
        tx: &mut S::Tx,
        actor: &ActorContext,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<User, AppError> {
        tx.find_user(user_id)
            .await?
            .filter(|u| !active_only || u.is_active)
            .filter(|u| match u.company_id {
                Some(company_id) => actor.within_company(company_id),
                None => actor.is_super_admin(),
            })
            .ok_or_else(|| AppError::not_found("user"))
    }
}
