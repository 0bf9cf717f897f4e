//! Cloud providers and their `object_store` builders
//!
//! Every builder is configured from the environment (`AWS_*`,
//! `GOOGLE_*`, `AZURE_*` variables), exactly as `object_store` reads them.

use crate::error::{CloudError, Result};
use object_store::ObjectStore;
use std::fmt;
use std::sync::Arc;

/// A supported cloud object store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    S3,
    Gcs,
    Azure,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::S3, Provider::Gcs, Provider::Azure];

    /// Provider serving a URI scheme
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "s3" => Some(Provider::S3),
            "gs" => Some(Provider::Gcs),
            "az" | "azure" => Some(Provider::Azure),
            _ => None,
        }
    }

    /// Schemes routed to this provider; the first is canonical
    pub fn schemes(self) -> &'static [&'static str] {
        match self {
            Provider::S3 => &["s3"],
            Provider::Gcs => &["gs"],
            Provider::Azure => &["az", "azure"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Provider::S3 => "S3",
            Provider::Gcs => "GCS",
            Provider::Azure => "Azure",
        }
    }

    /// Cargo feature that compiles the provider in
    pub fn feature(self) -> &'static str {
        match self {
            Provider::S3 => "aws",
            Provider::Gcs => "gcp",
            Provider::Azure => "azure",
        }
    }

    /// (blocking, async) class names
    pub fn class_names(self) -> (&'static str, &'static str) {
        match self {
            Provider::S3 => ("S3Path", "AsyncS3Path"),
            Provider::Gcs => ("GSPath", "AsyncGSPath"),
            Provider::Azure => ("AzurePath", "AsyncAzurePath"),
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            Provider::S3 => cfg!(feature = "aws"),
            Provider::Gcs => cfg!(feature = "gcp"),
            Provider::Azure => cfg!(feature = "azure"),
        }
    }

    /// Error for a provider that was not compiled in
    pub fn ensure_available(self) -> Result<()> {
        if self.is_available() {
            return Ok(());
        }
        Err(self.missing_feature())
    }

    fn missing_feature(self) -> CloudError {
        CloudError::MissingFeature {
            provider: self.label(),
            feature: self.feature(),
        }
    }

    /// Store for one bucket (or Azure container)
    pub fn build(self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        self.ensure_available()?;
        tracing::debug!("building {} store for bucket {}", self.label(), bucket);
        match self {
            Provider::S3 => build_s3(bucket),
            Provider::Gcs => build_gcs(bucket),
            Provider::Azure => build_azure(bucket),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg_attr(
    not(any(feature = "aws", feature = "gcp", feature = "azure")),
    allow(dead_code)
)]
fn builder_error(provider: Provider, bucket: &str) -> impl FnOnce(object_store::Error) -> CloudError {
    let bucket = bucket.to_string();
    move |source| CloudError::Builder {
        provider: provider.label(),
        bucket,
        source,
    }
}

#[cfg(feature = "aws")]
fn build_s3(bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let store = object_store::aws::AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .build()
        .map_err(builder_error(Provider::S3, bucket))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "aws"))]
fn build_s3(_bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    Err(Provider::S3.missing_feature())
}

#[cfg(feature = "gcp")]
fn build_gcs(bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let store = object_store::gcp::GoogleCloudStorageBuilder::from_env()
        .with_bucket_name(bucket)
        .build()
        .map_err(builder_error(Provider::Gcs, bucket))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "gcp"))]
fn build_gcs(_bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    Err(Provider::Gcs.missing_feature())
}

#[cfg(feature = "azure")]
fn build_azure(container: &str) -> Result<Arc<dyn ObjectStore>> {
    let store = object_store::azure::MicrosoftAzureBuilder::from_env()
        .with_container_name(container)
        .build()
        .map_err(builder_error(Provider::Azure, container))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "azure"))]
fn build_azure(_container: &str) -> Result<Arc<dyn ObjectStore>> {
    Err(Provider::Azure.missing_feature())
}
