use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/sessions", session_routes(config))
}

fn session_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::session::list_sessions,
            handlers::session::create_session
        ))
        .routes(routes!(handlers::session::get_session))
        .routes(routes!(handlers::session::update_metadata))
        .routes(routes!(
            handlers::session::get_status,
            handlers::session::update_status
        ))
        .merge(chunk_routes(config))
}

fn chunk_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::chunk::upload_chunk))
        .layer(handlers::chunk::chunk_upload_body_limit(
            config.upload.max_chunk_size,
        ));

    OpenApiRouter::new()
        .routes(routes!(handlers::chunk::missing_chunks))
        .merge(upload)
}
