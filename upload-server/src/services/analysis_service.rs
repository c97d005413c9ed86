//! Placeholder analysis endpoints. No image or document processing happens
//! here; each call just waits a fixed latency and returns an empty result.

use std::collections::BTreeMap;
use std::time::Duration;

use actix_web::middleware::from_fn;
use actix_web::{post, HttpResponse, Responder};
use serde::Serialize;

use crate::gate::access_gate;
use crate::services::upload_service::APP_TYPE_JSON;

const CV_LATENCY: Duration = Duration::from_millis(100);
const DI_LATENCY: Duration = Duration::from_millis(120);

#[derive(Serialize)]
struct CvResult {
    labels: Vec<String>,
}

#[derive(Serialize)]
struct CvResponse {
    ok: bool,
    cv: CvResult,
}

#[derive(Serialize)]
struct DiResult {
    fields: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct DiResponse {
    ok: bool,
    di: DiResult,
}

#[post("/cv", wrap = "from_fn(access_gate)")]
async fn computer_vision() -> impl Responder {
    tokio::time::sleep(CV_LATENCY).await;
    HttpResponse::Ok()
        .content_type(APP_TYPE_JSON)
        .json(CvResponse { ok: true, cv: CvResult { labels: Vec::new() } })
}

#[post("/di", wrap = "from_fn(access_gate)")]
async fn document_intelligence() -> impl Responder {
    tokio::time::sleep(DI_LATENCY).await;
    HttpResponse::Ok()
        .content_type(APP_TYPE_JSON)
        .json(DiResponse { ok: true, di: DiResult { fields: BTreeMap::new() } })
}
