// src/services/scope_guard.rs

use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::auth::{ActorContext, Role};
use crate::models::tenancy::{Branch, TenantScope};

/// Verificação de tenant única, chamada por toda operação do núcleo.
pub struct ScopeGuard;

impl ScopeGuard {
    /// Acesso a dados de nível empresa (listagens da empresa, filtros por empresa).
    pub fn authorize_company_access(
        actor: &ActorContext,
        company_id: Uuid,
        resource: &str,
    ) -> Result<(), AppError> {
        let allowed = match actor.role {
            Role::SuperAdmin => true,
            Role::Customer => false,
            _ => actor.company_id == Some(company_id),
        };
        Self::verdict(actor, allowed, resource)
    }

    /// A empresa da filial vem sempre da própria filial.
    pub fn authorize_branch_access(
        actor: &ActorContext,
        branch: &Branch,
        resource: &str,
    ) -> Result<(), AppError> {
        Self::authorize_resource_access(actor, branch.scope(), resource)
    }

    pub fn authorize_resource_access(
        actor: &ActorContext,
        scope: TenantScope,
        resource: &str,
    ) -> Result<(), AppError> {
        Self::verdict(actor, Self::can_access(actor, scope), resource)
    }

    /// Mesma regra, sem log: para filtrar listagens.
    pub fn can_access(actor: &ActorContext, scope: TenantScope) -> bool {
        match actor.role {
            Role::SuperAdmin => true,
            // COMPANY_ADMIN não é restringido por filial
            Role::CompanyAdmin => actor.company_id == Some(scope.company_id),
            Role::BranchAdmin | Role::PosUser | Role::Employee => {
                actor.company_id == Some(scope.company_id)
                    && match scope.branch_id {
                        Some(branch_id) => actor.branch_id == Some(branch_id),
                        // Entidade de nível empresa: basta a mesma empresa
                        None => true,
                    }
            }
            Role::Customer => false,
        }
    }

    fn verdict(actor: &ActorContext, allowed: bool, resource: &str) -> Result<(), AppError> {
        if allowed {
            return Ok(());
        }
        tracing::warn!(
            actor_id = %actor.actor_id,
            role = actor.role.as_str(),
            resource,
            "Acesso negado fora do escopo do tenant"
        );
        Err(AppError::Unauthorized(format!("access denied to {resource}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(company_id: Uuid, branch_id: Uuid) -> TenantScope {
        TenantScope { company_id, branch_id: Some(branch_id) }
    }

    #[test]
    fn super_admin_is_always_authorized() {
        let actor = ActorContext::super_admin(Uuid::new_v4());
        let any = scope(Uuid::new_v4(), Uuid::new_v4());
        assert!(ScopeGuard::authorize_resource_access(&actor, any, "invoice").is_ok());
        assert!(ScopeGuard::authorize_company_access(&actor, Uuid::new_v4(), "company").is_ok());
    }

    #[test]
    fn company_admin_spans_every_branch_of_its_company() {
        let company = Uuid::new_v4();
        let actor = ActorContext::new(Uuid::new_v4(), Role::CompanyAdmin, Some(company), None).unwrap();

        for _ in 0..3 {
            assert!(ScopeGuard::authorize_resource_access(&actor, scope(company, Uuid::new_v4()), "item").is_ok());
        }
        let err = ScopeGuard::authorize_resource_access(&actor, scope(Uuid::new_v4(), Uuid::new_v4()), "item")
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "access denied to item"));
    }

    #[test]
    fn branch_roles_are_pinned_to_their_branch() {
        let company = Uuid::new_v4();
        let branch = Uuid::new_v4();
        for role in [Role::BranchAdmin, Role::PosUser, Role::Employee] {
            let actor = ActorContext::new(Uuid::new_v4(), role, Some(company), Some(branch)).unwrap();
            assert!(ScopeGuard::authorize_resource_access(&actor, scope(company, branch), "invoice").is_ok());
            assert!(ScopeGuard::authorize_resource_access(&actor, scope(company, Uuid::new_v4()), "invoice").is_err());
            assert!(ScopeGuard::authorize_company_access(&actor, company, "company").is_ok());
            assert!(ScopeGuard::authorize_company_access(&actor, Uuid::new_v4(), "company").is_err());
        }
    }

    #[test]
    fn customers_have_no_administrative_access() {
        let company = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let actor = ActorContext::new(Uuid::new_v4(), Role::Customer, Some(company), Some(branch)).unwrap();
        assert!(ScopeGuard::authorize_resource_access(&actor, scope(company, branch), "invoice").is_err());
        assert!(ScopeGuard::authorize_company_access(&actor, company, "company").is_err());
    }

    #[test]
    fn listing_predicate_agrees_with_the_guard() {
        let company = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let scopes = [
            scope(company, branch),
            scope(company, Uuid::new_v4()),
            scope(Uuid::new_v4(), branch),
            TenantScope { company_id: company, branch_id: None },
        ];
        let actors = [
            ActorContext::super_admin(Uuid::new_v4()),
            ActorContext::new(Uuid::new_v4(), Role::CompanyAdmin, Some(company), None).unwrap(),
            ActorContext::new(Uuid::new_v4(), Role::PosUser, Some(company), Some(branch)).unwrap(),
            ActorContext::new(Uuid::new_v4(), Role::Customer, Some(company), Some(branch)).unwrap(),
        ];
        for actor in &actors {
            for target in scopes {
                assert_eq!(
                    ScopeGuard::can_access(actor, target),
                    ScopeGuard::authorize_resource_access(actor, target, "service record").is_ok(),
                    "{:?} -> {target:?}",
                    actor.role
                );
            }
        }
    }
}
