use clap::{ArgAction, Parser, ValueEnum};
use upload_relay::ingest::DEFAULT_MAX_UPLOAD_BYTES;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    S3,
    Local,
    Memory,
}

#[derive(Parser, Debug, Clone)]
pub struct Args {
    #[clap(long, env = "HOST", default_value = "0.0.0.0")]
    pub(crate) host: String,
    #[clap(long, env = "PORT", default_value_t = 3000)]
    pub(crate) port: u16,

    /// Where blobs go. Leaving it unset starts the server without storage.
    #[clap(long, env = "STORAGE_BACKEND", value_enum)]
    pub(crate) storage_backend: Option<BackendKind>,
    #[clap(long, env = "BLOB_CONTAINER", default_value = "uploads")]
    pub(crate) container: String,
    #[clap(long, env = "STORAGE_ROOT")]
    pub(crate) storage_root: Option<String>,

    #[clap(long, env = "S3_ENDPOINT")]
    pub(crate) s3_endpoint: Option<String>,
    #[clap(long, env = "S3_REGION", default_value = "us-east-1")]
    pub(crate) s3_region: String,
    #[clap(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub(crate) s3_access_key: Option<String>,
    #[clap(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub(crate) s3_secret_key: Option<String>,
    #[clap(long, env = "PUBLIC_BASE_URL")]
    pub(crate) public_base_url: Option<String>,

    #[clap(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub(crate) max_upload_bytes: usize,
    /// Classify callers by the first X-Forwarded-For hop instead of the socket peer.
    #[clap(long, env = "TRUST_FORWARDED_FOR", default_value_t = true, action = ArgAction::Set)]
    pub(crate) trust_forwarded_for: bool,
    #[clap(long, env = "STATIC_DIR")]
    pub(crate) static_dir: Option<String>,
}
