use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Tap Rush Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::RosterEntry,
            crate::dto::ws::PlayerResult,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "WebSocket operations for game clients"),
    )
)]
pub struct ApiDoc;
