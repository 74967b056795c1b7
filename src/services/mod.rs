/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Matchmaking operations, event delivery, and deferred transitions.
pub mod matchmaker_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
