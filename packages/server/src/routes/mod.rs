use axum::{
    Router,
    routing::{get, post},
};

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn api_routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/notes", note_routes(config))
}

fn note_routes(config: &AppConfig) -> Router<AppState> {
    let crud = Router::new()
        .route("/", get(handlers::note::list_notes))
        .route("/subjects/list", get(handlers::note::list_subjects))
        .route("/download/{id}", get(handlers::note::download_note))
        .route(
            "/{id}",
            get(handlers::note::get_note)
                .put(handlers::note::update_note)
                .delete(handlers::note::delete_note),
        );

    let upload = Router::new()
        .route("/upload", post(handlers::note::upload_note))
        .layer(handlers::note::upload_body_limit(
            config.storage.max_upload_size,
        ));

    crud.merge(upload)
}
