use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use upload_relay::UploadError;
use validator::ValidationErrors;


#[derive(Debug, Error)]
pub enum ServerErr {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Failed to parse JSON: {0}")]
    Json(String),

    #[error("Request failed validation")]
    Validation(#[from] ValidationErrors),

    #[error("Caller origin is not allowed")]
    AccessDenied,
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: &'static str,
}

impl ServerErr {
    fn code(&self) -> &'static str {
        match self {
            ServerErr::Upload(e) => e.code(),
            ServerErr::Multipart(_) => "invalid_multipart",
            ServerErr::Json(_) => "invalid_json",
            ServerErr::Validation(_) => "invalid_request",
            ServerErr::AccessDenied => "forbidden",
        }
    }
}

impl ResponseError for ServerErr {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerErr::Upload(UploadError::PayloadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerErr::Upload(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ServerErr::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerErr::Multipart(_) | ServerErr::Json(_) | ServerErr::Validation(_) => StatusCode::BAD_REQUEST,
            ServerErr::AccessDenied => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("upload failed: {:?}", self);
        } else {
            tracing::debug!("rejected upload: {}", self);
        }
        match self {
            ServerErr::AccessDenied => HttpResponse::Forbidden().finish(),
            _ => HttpResponse::build(status).json(ErrorBody { ok: false, error: self.code() }),
        }
    }
}
