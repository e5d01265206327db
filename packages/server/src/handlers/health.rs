use axum::Json;

use crate::models::shared::MessageResponse;

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    operation_id = "health",
    summary = "Liveness probe",
    responses((status = 200, description = "Service is up", body = MessageResponse)),
)]
pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("OK"))
}
