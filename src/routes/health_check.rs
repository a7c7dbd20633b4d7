use actix_web::HttpResponse;

use crate::response::ApiResponse;

pub async fn health_check() -> HttpResponse {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }), "Service is healthy").into_response()
}
