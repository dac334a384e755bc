// src/middleware/auth.rs

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{
    common::error::AppError,
    models::auth::ActorContext,
    services::auth::Authenticator,
};

pub type SharedAuthenticator = Arc<dyn Authenticator>;

/// Extrator do ator autenticado (`Authorization: Bearer <token>`).
/// O contexto vive só durante a requisição.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub ActorContext);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl<S> FromRequestParts<S> for CurrentActor
where
    SharedAuthenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthenticated)?;
        let authenticator = SharedAuthenticator::from_ref(state);
        let actor = authenticator.resolve_actor(token).await?;
        Ok(CurrentActor(actor))
    }
}
