// src/services/auth.rs

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    models::auth::{ActorContext, Claims},
};

/// Resolve um token opaco em contexto de ator. Falha sempre como `Unauthenticated`.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn resolve_actor(&self, token: &str) -> Result<ActorContext, AppError>;
}

#[derive(Clone)]
pub struct JwtAuthenticator {
    jwt_secret: String,
    token_ttl: Duration,
}

impl JwtAuthenticator {
    pub fn new(jwt_secret: String, token_ttl: Duration) -> Self {
        Self { jwt_secret, token_ttl }
    }

    pub fn issue_token(&self, actor: &ActorContext) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;

        let claims = Claims {
            sub: actor.actor_id,
            role: actor.role,
            company_id: actor.company_id,
            branch_id: actor.branch_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(|e| anyhow::anyhow!("Falha ao assinar token: {e}").into())
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn resolve_actor(&self, token: &str) -> Result<ActorContext, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "Token rejeitado");
            AppError::Unauthenticated
        })?;

        let claims = token_data.claims;
        // Claims com escopo incoerente para o papel não viram contexto
        ActorContext::new(claims.sub, claims.role, claims.company_id, claims.branch_id)
            .map_err(|_| AppError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;
    use uuid::Uuid;

    fn authenticator() -> JwtAuthenticator {
        JwtAuthenticator::new("segredo-de-teste".into(), Duration::hours(1))
    }

    #[tokio::test]
    async fn issued_tokens_resolve_to_the_same_actor() {
        let auth = authenticator();
        let actor = ActorContext::new(
            Uuid::new_v4(),
            Role::PosUser,
            Some(Uuid::new_v4()),
            Some(Uuid::new_v4()),
        )
        .unwrap();

        let token = auth.issue_token(&actor).unwrap();
        assert_eq!(auth.resolve_actor(&token).await.unwrap(), actor);
    }

    #[tokio::test]
    async fn foreign_or_expired_tokens_are_unauthenticated() {
        let auth = authenticator();
        let actor = ActorContext::super_admin(Uuid::new_v4());

        let other = JwtAuthenticator::new("outro-segredo".into(), Duration::hours(1));
        let foreign = other.issue_token(&actor).unwrap();
        assert!(matches!(auth.resolve_actor(&foreign).await, Err(AppError::Unauthenticated)));

        let expired = JwtAuthenticator::new("segredo-de-teste".into(), Duration::hours(-2))
            .issue_token(&actor)
            .unwrap();
        assert!(matches!(auth.resolve_actor(&expired).await, Err(AppError::Unauthenticated)));

        assert!(matches!(auth.resolve_actor("lixo").await, Err(AppError::Unauthenticated)));
    }

    #[tokio::test]
    async fn claims_with_incoherent_scope_are_rejected() {
        let auth = authenticator();
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::BranchAdmin,
            company_id: Some(Uuid::new_v4()),
            branch_id: None,
            exp: (now + Duration::hours(1)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("segredo-de-teste".as_ref()),
        )
        .unwrap();

        assert!(matches!(auth.resolve_actor(&token).await, Err(AppError::Unauthenticated)));
    }
}
