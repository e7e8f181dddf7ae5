/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Leaderboard computation and caching.
pub mod leaderboard_service;
/// Domain event routing into the room hub.
pub mod room_events;
/// User and group statistics aggregation.
pub mod stats_service;
/// Work timer lifecycle operations.
pub mod timer_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
