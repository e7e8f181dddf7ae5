use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report overall health, probing storage connectivity along the way.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    if let Some(store) = state.store().await
        && let Err(err) = store.health_check().await
    {
        warn!(error = %err, "storage health check failed");
    }

    HealthResponse::report(state.is_degraded().await)
}
