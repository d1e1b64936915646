//! Object store seam and its S3 implementation.
//!
//! The pipeline only ever talks to an [`ObjectStore`]. [`S3Store`] backs it
//! with `aws-sdk-s3`, either against AWS itself or any S3-compatible
//! endpoint (R2, `MinIO`, ...).

use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, ObjectCannedAcl};
use static_deploy_upload_models::{BucketLocation, DEFAULT_REGION, PutReceipt, UploadParameters};

use crate::StoreError;

/// Location constraint S3 still returns for some `eu-west-1` buckets.
const LEGACY_EU_CONSTRAINT: &str = "EU";

/// The two store operations the deploy pipeline needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the target bucket.
    fn bucket(&self) -> &str;

    /// Region requests are currently signed for.
    fn region(&self) -> &str;

    /// Switches the working region for all later requests.
    fn set_region(&mut self, region: &str);

    /// Looks up the region the bucket actually lives in.
    async fn bucket_location(&self) -> Result<BucketLocation, StoreError>;

    /// Uploads the file at `body` under `params.key`.
    async fn put_object(
        &self,
        params: &UploadParameters,
        body: &Path,
    ) -> Result<PutReceipt, StoreError>;
}

/// Connection settings for [`S3Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    /// Target bucket.
    pub bucket: String,
    /// Configured region. Corrected by bucket validation if wrong.
    pub region: String,
    /// Access key. When either key is missing the AWS default credential
    /// chain is used instead.
    pub access_key: Option<String>,
    /// Secret key.
    pub secret_key: Option<String>,
    /// Custom S3-compatible endpoint. Implies path-style addressing.
    pub endpoint: Option<String>,
}

/// [`ObjectStore`] backed by `aws-sdk-s3`.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

impl S3Store {
    /// Builds an S3 client from `settings`.
    ///
    /// Explicit credentials win; otherwise the standard AWS provider chain
    /// (environment, profile, instance metadata) is loaded.
    pub async fn connect(settings: S3Settings) -> Self {
        let builder = match (&settings.access_key, &settings.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let creds =
                    Credentials::new(access_key, secret_key, None, None, "static-deploy-config");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(creds)
            }
            _ => {
                log::debug!("No explicit credentials, using the AWS default provider chain");
                let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        let mut builder = builder.region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: settings.bucket,
            region: settings.region,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn set_region(&mut self, region: &str) {
        let config = self
            .client
            .config()
            .to_builder()
            .region(Region::new(region.to_string()))
            .build();
        self.client = aws_sdk_s3::Client::from_conf(config);
        region.clone_into(&mut self.region);
    }

    async fn bucket_location(&self) -> Result<BucketLocation, StoreError> {
        let output = self
            .client
            .get_bucket_location()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StoreError::Location {
                bucket: self.bucket.clone(),
                source: Box::new(e),
            })?;

        let region = output
            .location_constraint()
            .map(BucketLocationConstraint::as_str)
            .map_or(DEFAULT_REGION, normalize_location);

        Ok(BucketLocation {
            region: region.to_string(),
        })
    }

    async fn put_object(
        &self,
        params: &UploadParameters,
        body: &Path,
    ) -> Result<PutReceipt, StoreError> {
        let put_error = |source: Box<dyn std::error::Error + Send + Sync>| StoreError::Put {
            bucket: self.bucket.clone(),
            key: params.key.clone(),
            source,
        };

        let stream = ByteStream::from_path(body)
            .await
            .map_err(|e| put_error(Box::new(e)))?;
        let content_length = i64::try_from(params.content_length).map_err(|e| put_error(Box::new(e)))?;

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&params.key)
            .body(stream)
            .acl(ObjectCannedAcl::from(params.acl.as_ref()))
            .cache_control(&params.cache_control)
            .content_type(&params.content_type)
            .set_content_encoding(params.content_encoding.map(|e| e.to_string()))
            .content_length(content_length)
            .send()
            .await
            .map_err(|e| put_error(Box::new(e)))?;

        Ok(PutReceipt {
            e_tag: output.e_tag().map(str::to_string),
            version_id: output.version_id().map(str::to_string),
        })
    }
}

/// Maps a raw location constraint to a region name.
///
/// An empty constraint means `us-east-1`; the legacy `EU` value means
/// `eu-west-1`.
fn normalize_location(constraint: &str) -> &str {
    match constraint {
        "" => DEFAULT_REGION,
        LEGACY_EU_CONSTRAINT => "eu-west-1",
        other => other,
    }
}
