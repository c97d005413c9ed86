use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;

use crate::services::upload_service::{UploadState, APP_TYPE_JSON};

#[derive(Serialize)]
struct Health {
    ok: bool,
    storage: &'static str,
}

#[get("/healthz")]
async fn healthz(state: web::Data<UploadState>) -> impl Responder {
    let storage = if state.relay.is_configured() { "configured" } else { "unconfigured" };
    HttpResponse::Ok()
        .content_type(APP_TYPE_JSON)
        .json(Health { ok: true, storage })
}
