mod errors;
mod gate;
mod params;
mod services;
mod storage;

use std::path::Path;
use std::sync::Arc;

use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::gate::{AccessGate, PrivateNetworkClassifier};
use crate::params::Args;
use crate::services::upload_service::{json_config, UploadState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let relay = storage::build_relay(&args).await;
    let upload_state = web::Data::new(UploadState {
        relay,
        max_upload_bytes: args.max_upload_bytes,
    });
    let gate = web::Data::new(AccessGate::new(
        Arc::new(PrivateNetworkClassifier),
        args.trust_forwarded_for,
    ));

    let static_dir = args.static_dir.clone().filter(|dir| {
        let exists = Path::new(dir).is_dir();
        if !exists {
            tracing::warn!("static dir {} not found; not serving static files", dir);
        }
        exists
    });
    let max_upload_bytes = args.max_upload_bytes;

    tracing::info!("listening on {}:{}", args.host, args.port);
    HttpServer::new(move || {
        let app = App::new()
            .wrap(middleware::Logger::default())
            .app_data(upload_state.clone())
            .app_data(gate.clone())
            .app_data(json_config(max_upload_bytes))
            .configure(services::configure);
        match &static_dir {
            Some(dir) => app.service(Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind((args.host.as_str(), args.port))?
    .run()
    .await
}
