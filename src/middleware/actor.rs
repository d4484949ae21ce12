//! Actor extraction
//!
//! Authentication lives in the surrounding platform; by the time a
//! request reaches this service the acting user is already verified and
//! forwarded as the `X-Actor-Id` header. The extractor only carries it
//! through for audit fields (flag creator, resolver, message sender).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Acting user forwarded by the platform's auth layer
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor_id: Option<Uuid>,
}

impl ActorContext {
    /// Actor id, required for operations that must be attributable
    pub fn require(&self) -> Result<Uuid, AppError> {
        self.actor_id.ok_or_else(|| {
            AppError::ValidationError("X-Actor-Id header is required".to_string())
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = match parts.headers.get(ACTOR_HEADER) {
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| AppError::ValidationError("Invalid X-Actor-Id header".to_string()))?;
                let id = Uuid::parse_str(raw)
                    .map_err(|_| AppError::ValidationError("Invalid X-Actor-Id header".to_string()))?;
                Some(id)
            }
            None => None,
        };

        Ok(ActorContext { actor_id })
    }
}
