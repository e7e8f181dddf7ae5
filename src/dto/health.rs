use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    /// Whether the storage backend is currently reachable.
    pub storage: bool,
}

impl HealthResponse {
    /// Build the payload from the degraded flag.
    pub fn report(degraded: bool) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            storage: !degraded,
        }
    }
}
