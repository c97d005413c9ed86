use actix_web::web;

pub mod analysis_service;
pub mod health_service;
pub mod upload_service;

/// Registers every API route. Static files, when enabled, go after these.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(upload_service::upload_photo)
        .service(upload_service::upload_file)
        .service(upload_service::upload_base64)
        .service(analysis_service::computer_vision)
        .service(analysis_service::document_intelligence)
        .service(health_service::healthz);
}
