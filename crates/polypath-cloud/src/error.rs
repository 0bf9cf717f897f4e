use polypath_core::Error;
use thiserror::Error;

/// Failures specific to the cloud adapters
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Failed to configure {provider} store for bucket {bucket:?}: {source}")]
    Builder {
        provider: &'static str,
        bucket: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("{provider} support is not compiled in (enable the '{feature}' feature)")]
    MissingFeature {
        provider: &'static str,
        feature: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, CloudError>;

impl From<CloudError> for Error {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::ObjectStore(err) => translate(err),
            CloudError::InvalidKey { key, reason } => {
                Error::InvalidPath(format!("{key:?}: {reason}"))
            }
            CloudError::MissingFeature { provider, feature } => Error::MissingDependency {
                backend: provider.to_string(),
                package: "object_store".to_string(),
                feature: feature.to_string(),
            },
            other => Error::backend(other),
        }
    }
}

/// Map an `object_store` error onto the core taxonomy
pub(crate) fn translate(err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { path, .. } => Error::NotFound(path),
        object_store::Error::AlreadyExists { path, .. } => Error::AlreadyExists(path),
        object_store::Error::NotImplemented => {
            Error::UnsupportedOperation("not implemented by this object store".to_string())
        }
        other => Error::backend(other),
    }
}
