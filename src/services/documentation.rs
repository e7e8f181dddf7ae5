use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for TaskPulse Back.
#[openapi(
    paths(
        crate::routes::timer::start_timer,
        crate::routes::timer::complete_timer,
        crate::routes::timer::get_active_timer,
        crate::routes::timer::list_task_timers,
        crate::routes::leaderboard::group_leaderboard,
        crate::routes::leaderboard::global_leaderboard,
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::common::PageMeta,
            crate::dto::common::TimerPage,
            crate::dto::timer::TimerView,
            crate::dto::timer::ActiveTimerResponse,
            crate::dto::timer::TimerCompletionView,
            crate::dto::timer::CompleteTimerRequest,
            crate::dto::leaderboard::TimeFrame,
            crate::dto::leaderboard::LeaderboardRow,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::events::RoomEvent,
            crate::dto::ws::ClientInboundMessage,
            crate::dto::ws::IdentifyAck,
            crate::dto::health::HealthResponse,
            crate::dao::models::TaskStatus,
        )
    ),
    tags(
        (name = "timers", description = "Work timer lifecycle"),
        (name = "leaderboard", description = "Ranked completion statistics"),
        (name = "health", description = "Health check endpoints"),
        (name = "ws", description = "WebSocket room subscriptions"),
    )
)]
pub struct ApiDoc;
