use crate::domain::error::AppError;
use crate::domain::qa::AskRequest;
use crate::domain::retrieval::IndexState;
use crate::infrastructure::bootstrap::AppState;
use actix_cors::Cors;
use actix_web::http::header::AUTHORIZATION;
use actix_web::http::StatusCode;
use actix_web::{
    dev::Server, get, post, web, App, HttpRequest, HttpResponse, HttpServer, ResponseError,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::ParseError(_) => StatusCode::BAD_REQUEST,
            AppError::IndexUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

/// Caller token from `Authorization: Bearer <token>`. A missing header, any
/// other scheme or a blank token is an anonymous caller, not an error.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[post("/ask")]
async fn ask(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<AskRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;
    if body.question.trim().is_empty() {
        return Err(AppError::ValidationError(
            "question must not be empty".to_string(),
        ));
    }

    let token = bearer_token(&req);
    let response = data.ask.ask(&body.question, token.as_deref()).await;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "ok": true }))
}

#[get("/ready")]
async fn ready(data: web::Data<AppState>) -> HttpResponse {
    let status = data.index.status().await;
    if status.state == IndexState::Ready {
        HttpResponse::Ok().json(status)
    } else {
        HttpResponse::ServiceUnavailable().json(status)
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(ask)
        .service(health)
        .service(ready);
}

pub fn start_server(state: Arc<AppState>) -> std::io::Result<Server> {
    let bind_addr = state.settings.bind_addr();
    let data = web::Data::from(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(data.clone())
            .configure(routes)
    })
    .bind(bind_addr.clone())?
    .run();

    info!(host = %bind_addr.0, port = bind_addr.1, "HTTP server listening");
    Ok(server)
}
