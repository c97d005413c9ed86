use actix_multipart::{Field, Multipart};
use actix_web::error::JsonPayloadError;
use actix_web::http::header::CONTENT_LENGTH;
use actix_web::middleware::from_fn;
use actix_web::{post, web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use upload_relay::ingest::{self, SizeGuard, ENVELOPE_ALLOWANCE};
use upload_relay::{naming, BlobRelay, Correlation, StoredObjectDescriptor, UploadError, UploadRequest};
use validator::Validate;

use crate::errors::ServerErr;
use crate::gate::access_gate;

pub const APP_TYPE_JSON: &str = "application/json";

/// Accepted names for the multipart file part.
const FILE_FIELDS: [&str; 2] = ["photo", "file"];
const TEXT_FIELD_LIMIT: usize = 1024;

pub struct UploadState {
    pub(crate) relay: BlobRelay,
    pub(crate) max_upload_bytes: usize,
}

#[derive(Serialize)]
struct UploadResponse {
    ok: bool,
    #[serde(flatten)]
    stored: StoredObjectDescriptor,
}

#[derive(Deserialize, Validate)]
struct Base64UploadRequest {
    #[validate(length(max = 255))]
    filename: Option<String>,
    data: Option<String>,
    base64: Option<String>,
}

struct FilePart {
    data: Bytes,
    content_type: Option<String>,
    filename: Option<String>,
}

#[derive(Default)]
struct UploadForm {
    file: Option<FilePart>,
    extra_id: Option<String>,
    ts: Option<String>,
}

impl UploadForm {
    fn into_upload_request(self) -> Result<UploadRequest, UploadError> {
        let file = match self.file {
            Some(file) if !file.data.is_empty() => file,
            _ => return Err(UploadError::MissingFile),
        };
        let correlation = match (self.extra_id, self.ts) {
            (Some(external_id), Some(timestamp)) => Some(Correlation { external_id, timestamp }),
            _ => None,
        };
        let extension_hint = file.filename.as_deref().and_then(naming::extension_from_filename);
        Ok(UploadRequest::new(file.data, file.content_type.as_deref(), extension_hint).with_correlation(correlation))
    }
}

fn multipart_err(e: actix_multipart::MultipartError) -> ServerErr {
    ServerErr::Multipart(e.to_string())
}

fn created(stored: StoredObjectDescriptor) -> HttpResponse {
    HttpResponse::Created()
        .content_type(APP_TYPE_JSON)
        .json(UploadResponse { ok: true, stored })
}

/// JSON extractor config for the base64 endpoint: caps the body at the encoded
/// size of the largest allowed upload and keeps error bodies opaque.
pub fn json_config(max_upload_bytes: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(ingest::encoded_body_limit(max_upload_bytes))
        .error_handler(move |err, _req| match err {
            JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
                ServerErr::Upload(UploadError::PayloadTooLarge { limit: max_upload_bytes }).into()
            }
            other => ServerErr::Json(other.to_string()).into(),
        })
}

/// Rejects on the declared length alone, before any of the body is read.
fn reject_declared_oversize(req: &HttpRequest, limit: usize) -> Result<(), UploadError> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    match declared {
        Some(len) if len > limit => Err(UploadError::PayloadTooLarge { limit }),
        _ => Ok(()),
    }
}

async fn read_bytes(field: &mut Field, guard: &mut SizeGuard) -> Result<Bytes, ServerErr> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_err)? {
        guard.add(chunk.len())?;
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}

async fn read_text(field: &mut Field, body_guard: &mut SizeGuard) -> Result<Option<String>, ServerErr> {
    let mut guard = SizeGuard::new(TEXT_FIELD_LIMIT);
    let mut data = BytesMut::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_err)? {
        guard.add(chunk.len())?;
        body_guard.add(chunk.len())?;
        data.extend_from_slice(&chunk);
    }
    let text = String::from_utf8_lossy(&data).trim().to_string();
    Ok(if text.is_empty() { None } else { Some(text) })
}

/// Walks the form once. The first file part is kept; other unknown parts are
/// drained but still count towards the body limit.
async fn read_form(payload: &mut Multipart, max_upload_bytes: usize) -> Result<UploadForm, ServerErr> {
    let mut form = UploadForm::default();
    let mut body_guard = SizeGuard::new(max_upload_bytes.saturating_add(ENVELOPE_ALLOWANCE));

    while let Some(mut field) = payload.try_next().await.map_err(multipart_err)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            n if FILE_FIELDS.contains(&n) && form.file.is_none() => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string);
                let content_type = field.content_type().map(|m| m.to_string());
                let mut file_guard = SizeGuard::new(max_upload_bytes);
                let data = read_bytes(&mut field, &mut file_guard).await?;
                body_guard.add(data.len())?;
                form.file = Some(FilePart { data, content_type, filename });
            }
            "extraID" => form.extra_id = read_text(&mut field, &mut body_guard).await?,
            "ts" => form.ts = read_text(&mut field, &mut body_guard).await?,
            _ => {
                read_bytes(&mut field, &mut body_guard).await?;
            }
        }
    }
    Ok(form)
}

async fn relay_multipart(
    req: HttpRequest,
    mut payload: Multipart,
    state: web::Data<UploadState>,
) -> Result<HttpResponse, ServerErr> {
    reject_declared_oversize(&req, state.max_upload_bytes.saturating_add(ENVELOPE_ALLOWANCE))?;
    let form = read_form(&mut payload, state.max_upload_bytes).await?;
    let request = form.into_upload_request()?;
    let stored = state.relay.submit(request).await?;
    Ok(created(stored))
}

#[post("/upload", wrap = "from_fn(access_gate)")]
async fn upload_photo(
    req: HttpRequest,
    payload: Multipart,
    state: web::Data<UploadState>,
) -> Result<HttpResponse, ServerErr> {
    relay_multipart(req, payload, state).await
}

#[post("/api/upload", wrap = "from_fn(access_gate)")]
async fn upload_file(
    req: HttpRequest,
    payload: Multipart,
    state: web::Data<UploadState>,
) -> Result<HttpResponse, ServerErr> {
    relay_multipart(req, payload, state).await
}

#[post("/api/uploadBase64", wrap = "from_fn(access_gate)")]
async fn upload_base64(
    body: web::Json<Base64UploadRequest>,
    state: web::Data<UploadState>,
) -> Result<HttpResponse, ServerErr> {
    body.validate()?;
    let request = ingest::decode_base64_upload(
        body.filename.as_deref(),
        body.data.as_deref(),
        body.base64.as_deref(),
        state.max_upload_bytes,
    )?;
    let stored = state.relay.submit(request).await?;
    Ok(created(stored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{AccessGate, PrivateNetworkClassifier};
    use crate::services;
    use actix_web::http::header::CONTENT_TYPE;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use blob_store::{BlobStore, MemoryBlobStore};
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::sync::Arc;

    const BOUNDARY: &str = "XUPLOADBOUNDARY";
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d, b'I', b'H', b'D', b'R'];

    struct Part<'a> {
        name: &'a str,
        file: Option<(&'a str, &'a str)>,
        data: &'a [u8],
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part.file {
                Some((filename, content_type)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        part.name, filename, content_type
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
                ),
            }
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn private_peer() -> SocketAddr {
        "10.1.2.3:50000".parse().unwrap()
    }

    fn public_peer() -> SocketAddr {
        "203.0.113.7:50000".parse().unwrap()
    }

    fn multipart_request(uri: &str, parts: &[Part]) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .peer_addr(private_peer())
            .insert_header((CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(multipart_body(parts))
    }

    fn state(relay: BlobRelay, max_upload_bytes: usize) -> web::Data<UploadState> {
        web::Data::new(UploadState { relay, max_upload_bytes })
    }

    fn gate(trust_forwarded_for: bool) -> web::Data<AccessGate> {
        web::Data::new(AccessGate::new(Arc::new(PrivateNetworkClassifier), trust_forwarded_for))
    }

    macro_rules! init_app {
        ($state:expr, $gate:expr) => {{
            let state = $state;
            let max = state.max_upload_bytes;
            test::init_service(
                App::new()
                    .app_data(state)
                    .app_data($gate)
                    .app_data(json_config(max))
                    .configure(services::configure),
            )
            .await
        }};
    }

    fn memory_state(max: usize) -> (MemoryBlobStore, web::Data<UploadState>) {
        let store = MemoryBlobStore::new();
        let relay = BlobRelay::new(Arc::new(store.clone()), "uploads");
        (store, state(relay, max))
    }

    #[actix_web::test]
    async fn multipart_upload_is_stored() {
        let (store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = multipart_request(
            "/upload",
            &[Part { name: "photo", file: Some(("shot.PNG", "image/png")), data: PNG }],
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["contentType"], "image/png");
        assert_eq!(body["size"], PNG.len());
        let name = body["blobName"].as_str().unwrap();
        assert!(name.ends_with(".png"));
        assert_eq!(body["url"], format!("memory://uploads/{}", name));

        let fetched = store.get_blob("uploads", name).await.unwrap();
        assert_eq!(fetched.data.as_ref(), PNG);
    }

    #[actix_web::test]
    async fn api_upload_accepts_file_field_and_sniffs_generic_type() {
        let (_store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = multipart_request(
            "/api/upload",
            &[Part { name: "file", file: Some(("scan", "application/octet-stream")), data: b"%PDF-1.5 body" }],
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["contentType"], "application/pdf");
    }

    #[actix_web::test]
    async fn missing_file_is_400_and_stores_nothing() {
        let (store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = multipart_request("/upload", &[Part { name: "extraID", file: None, data: b"cam7" }]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "missing_file");
        assert_eq!(store.create_calls(), 0);
        assert_eq!(store.blob_count("uploads"), 0);
    }

    #[actix_web::test]
    async fn empty_file_part_is_missing_file() {
        let (_store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = multipart_request(
            "/upload",
            &[Part { name: "photo", file: Some(("a.jpg", "image/jpeg")), data: b"" }],
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn direct_naming_overwrites() {
        let (store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let mut names = Vec::new();
        for data in [&b"\xff\xd8\xff first"[..], &b"\xff\xd8\xff second"[..]] {
            let req = multipart_request(
                "/upload",
                &[
                    Part { name: "extraID", file: None, data: b"cam7" },
                    Part { name: "ts", file: None, data: b"20240101T000000" },
                    Part { name: "photo", file: Some(("p.jpg", "image/jpeg")), data },
                ],
            )
            .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
            let body: Value = test::read_body_json(resp).await;
            names.push(body["blobName"].as_str().unwrap().to_string());
        }

        assert_eq!(names[0], "cam7_20240101T000000.jpg");
        assert_eq!(names[0], names[1]);
        assert_eq!(store.blob_count("uploads"), 1);
        let fetched = store.get_blob("uploads", &names[0]).await.unwrap();
        assert_eq!(fetched.data.as_ref(), b"\xff\xd8\xff second");
    }

    #[actix_web::test]
    async fn oversized_file_is_413() {
        let (store, state) = memory_state(8);
        let app = init_app!(state, gate(true));

        let req = multipart_request(
            "/upload",
            &[Part { name: "photo", file: Some(("a.png", "image/png")), data: PNG }],
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(store.create_calls(), 0);
    }

    #[actix_web::test]
    async fn declared_length_over_limit_is_413() {
        let (_store, state) = memory_state(8);
        let app = init_app!(state, gate(true));

        let req = multipart_request("/upload", &[Part { name: "photo", file: Some(("a.png", "image/png")), data: PNG }])
            .insert_header((CONTENT_LENGTH, (ENVELOPE_ALLOWANCE + 100).to_string()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn base64_data_uri_upload() {
        let (store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = test::TestRequest::post()
            .uri("/api/uploadBase64")
            .peer_addr(private_peer())
            .set_json(serde_json::json!({
                "filename": "shot.png",
                "data": format!("data:image/png;base64,{}", STANDARD.encode(PNG)),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["contentType"], "image/png");
        assert_eq!(body["size"], PNG.len());
        assert_eq!(store.blob_count("uploads"), 1);
    }

    #[actix_web::test]
    async fn base64_data_uri_with_charset_upload() {
        let (store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = test::TestRequest::post()
            .uri("/api/uploadBase64")
            .peer_addr(private_peer())
            .set_json(serde_json::json!({
                "filename": "note.txt",
                "data": "data:text/plain;charset=utf-8;base64,aGVsbG8=",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["contentType"], "text/plain");
        assert_eq!(body["size"], 5);

        let stored = store.get_blob("uploads", body["blobName"].as_str().unwrap()).await.unwrap();
        assert_eq!(stored.data.as_ref(), b"hello");
    }

    #[actix_web::test]
    async fn base64_blank_data_uses_base64_field() {
        let (store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = test::TestRequest::post()
            .uri("/api/uploadBase64")
            .peer_addr(private_peer())
            .set_json(serde_json::json!({ "data": "", "base64": "aGVsbG8=" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(store.blob_count("uploads"), 1);
    }

    #[actix_web::test]
    async fn base64_without_payload_is_400() {
        let (store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = test::TestRequest::post()
            .uri("/api/uploadBase64")
            .peer_addr(private_peer())
            .set_json(serde_json::json!({ "filename": "x.jpg" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "missing_payload");
        assert_eq!(store.create_calls(), 0);
    }

    #[actix_web::test]
    async fn base64_malformed_is_400() {
        let (_store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = test::TestRequest::post()
            .uri("/api/uploadBase64")
            .peer_addr(private_peer())
            .set_json(serde_json::json!({ "base64": "%%%" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "decode_error");
    }

    #[actix_web::test]
    async fn base64_body_over_limit_is_413() {
        let (_store, state) = memory_state(16);
        let app = init_app!(state, gate(true));

        let huge = STANDARD.encode(vec![1u8; ENVELOPE_ALLOWANCE * 2]);
        let req = test::TestRequest::post()
            .uri("/api/uploadBase64")
            .peer_addr(private_peer())
            .set_json(serde_json::json!({ "base64": huge }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn public_origin_is_denied_before_storage() {
        let (store, state) = memory_state(1024);
        let app = init_app!(state, gate(true));

        let req = multipart_request("/upload", &[Part { name: "photo", file: Some(("a.png", "image/png")), data: PNG }])
            .peer_addr(public_peer())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = test::read_body(resp).await;
        assert!(body.is_empty());
        assert_eq!(store.create_calls(), 0);
        assert_eq!(store.container_count(), 0);
    }

    #[actix_web::test]
    async fn forwarded_private_origin_passes_only_when_trusted() {
        let (_store, state) = memory_state(1024);
        let app = init_app!(state.clone(), gate(true));
        let req = multipart_request("/upload", &[Part { name: "photo", file: Some(("a.png", "image/png")), data: PNG }])
            .peer_addr(public_peer())
            .insert_header(("x-forwarded-for", "192.168.10.4"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let app = init_app!(state, gate(false));
        let req = multipart_request("/upload", &[Part { name: "photo", file: Some(("a.png", "image/png")), data: PNG }])
            .peer_addr(public_peer())
            .insert_header(("x-forwarded-for", "192.168.10.4"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn unconfigured_storage_is_opaque_500() {
        let app = init_app!(state(BlobRelay::unconfigured(), 1024), gate(true));

        let req = multipart_request("/upload", &[Part { name: "photo", file: Some(("a.png", "image/png")), data: PNG }])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({ "ok": false, "error": "storage_error" }));
    }

    #[actix_web::test]
    async fn storage_outage_is_500_with_no_object() {
        let (store, state) = memory_state(1024);
        store.fail_writes(true);
        let app = init_app!(state, gate(true));

        let req = multipart_request("/upload", &[Part { name: "photo", file: Some(("a.png", "image/png")), data: PNG }])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.blob_count("uploads"), 0);
    }
}
