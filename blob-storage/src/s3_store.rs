use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use url::Url;

use crate::store::{BlobStore, Provisioned, StoreError, StoreResult, StoredBlob};

/// Connection settings for an S3-compatible service (AWS, MinIO, Tigris...).
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Overrides the base used for returned blob URLs.
    pub public_base_url: Option<String>,
}

/// A `BlobStore` that keeps blobs in an S3 bucket. Buckets are created private.
#[derive(Clone, Debug)]
pub struct S3BlobStore {
    s3_client: S3Client,
    endpoint: Option<String>,
    region: String,
    public_base_url: Option<String>,
}

impl S3BlobStore {
    /// Builds a client with static credentials. Path-style addressing is forced
    /// whenever a custom endpoint is given, since MinIO requires it.
    pub async fn connect(settings: S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key,
            settings.secret_key,
            None,
            None,
            "blob-store",
        );
        let region_provider = RegionProviderChain::first_try(Region::new(settings.region.clone()));

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .credentials_provider(credentials);
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let base_config = loader.load().await;

        let config = Builder::from(&base_config)
            .force_path_style(settings.endpoint.is_some())
            .build();

        Self {
            s3_client: S3Client::from_conf(config),
            endpoint: settings.endpoint,
            region: settings.region,
            public_base_url: settings.public_base_url,
        }
    }

    fn base_url(&self, container: &str) -> String {
        match (&self.public_base_url, &self.endpoint) {
            (Some(public), _) => format!("{}/{}", public.trim_end_matches('/'), container),
            (None, Some(endpoint)) => format!("{}/{}", endpoint.trim_end_matches('/'), container),
            (None, None) => format!("https://{}.s3.{}.amazonaws.com", container, self.region),
        }
    }
}

fn backend_err<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Outcome for the "bucket already exists" family of create errors, `None` for anything else.
/// A bucket held by another account can't be written to, so it counts as a failure.
fn existing_bucket(container: &str, err: &CreateBucketError) -> Option<StoreResult<Provisioned>> {
    if err.is_bucket_already_owned_by_you() {
        Some(Ok(Provisioned::AlreadyExists))
    } else if err.is_bucket_already_exists() {
        tracing::warn!("bucket {} already exists under another owner", container);
        Some(Err(StoreError::Backend(format!("bucket {} is owned by another account", container))))
    } else {
        None
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn create_container(&self, container: &str) -> StoreResult<Provisioned> {
        let mut request = self.s3_client.create_bucket().bucket(container);
        // AWS rejects an explicit us-east-1 constraint but requires one everywhere else
        if self.endpoint.is_none() && self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        match request.send().await {
            Ok(_) => {
                tracing::debug!("created bucket {}", container);
                Ok(Provisioned::Created)
            }
            Err(SdkError::ServiceError(service_err)) => match existing_bucket(container, service_err.err()) {
                Some(outcome) => outcome,
                None => Err(backend_err(SdkError::ServiceError(service_err))),
            },
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn put_blob(&self, container: &str, name: &str, data: Bytes, content_type: &str) -> StoreResult<()> {
        self.s3_client
            .put_object()
            .bucket(container)
            .key(name)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn get_blob(&self, container: &str, name: &str) -> StoreResult<StoredBlob> {
        let resp = match self.s3_client.get_object().bucket(container).key(name).send().await {
            Ok(resp) => resp,
            Err(SdkError::ServiceError(service_err)) if service_err.err().is_no_such_key() => {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(backend_err(e)),
        };
        let content_type = resp
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = resp.body.collect().await.map_err(backend_err)?.into_bytes();
        Ok(StoredBlob { data, content_type })
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        let base = self.base_url(container);
        match Url::parse(&base) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push(name);
                }
                url.to_string()
            }
            Err(_) => format!("{}/{}", base, name),
        }
    }
}
