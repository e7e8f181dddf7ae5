use axum::{Router, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{error::AppError, state::SharedState};

pub mod docs;
pub mod health;
pub mod leaderboard;
pub mod timer;
pub mod websocket;

/// Header carrying the authenticated caller's id, stamped by the gateway.
pub const CALLER_HEADER: &str = "x-user-id";

/// Caller identity extracted from the [`CALLER_HEADER`] header.
///
/// Authentication itself happens upstream; this extractor only parses the
/// identity the gateway forwards.
pub struct CallerId(pub Uuid);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or_else(|| AppError::BadRequest(format!("missing `{CALLER_HEADER}` header")))?
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("malformed `{CALLER_HEADER}` header")))?;

        let user_id = Uuid::parse_str(raw)
            .map_err(|_| AppError::BadRequest(format!("`{CALLER_HEADER}` is not a valid UUID")))?;

        Ok(CallerId(user_id))
    }
}

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(timer::router())
        .merge(leaderboard::router())
        .merge(websocket::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
