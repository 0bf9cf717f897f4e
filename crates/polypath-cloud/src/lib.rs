//! Cloud object-store schemes for polypath
//!
//! Registers `s3://`, `gs://`, `az://` and `azure://` with a [`Registry`].
//! Providers are compiled in through Cargo features (`aws`, `gcp`, `azure`);
//! a scheme whose provider is missing stays registered but fails with
//! [`Error::MissingDependency`](polypath_core::Error::MissingDependency) the
//! first time a client is needed.

pub mod client;
pub mod error;
pub mod provider;

pub use client::{ObjectStoreClient, StoreFactory, MARKER_LEAF};
pub use error::{CloudError, Result};
pub use provider::Provider;

use object_store::ObjectStore;
use polypath_core::class::ClassPair;
use polypath_core::object::ObjectBackend;
use polypath_core::{Config, Registry};
use std::sync::Arc;
use tracing::info;

/// Classes serving `scheme` through `provider`
pub fn provider_classes(provider: Provider, scheme: &str, config: &Config) -> ClassPair {
    let (blocking, suspend) = provider.class_names();
    let config = config.clone();
    let scheme = scheme.to_string();
    ClassPair::from_async(blocking, suspend, move || {
        provider.ensure_available()?;
        let client = ObjectStoreClient::for_provider(provider, config.cloud.store_cache_size);
        Ok(ObjectBackend::from_config(
            scheme.as_str(),
            Arc::new(client),
            &config,
        ))
    })
}

/// Classes serving `scheme` from an existing store, whatever the bucket
pub fn store_classes(
    scheme: &str,
    names: (&str, &str),
    store: Arc<dyn ObjectStore>,
    config: &Config,
) -> ClassPair {
    let config = config.clone();
    let scheme = scheme.to_string();
    ClassPair::from_async(names.0, names.1, move || {
        let client = ObjectStoreClient::with_store(store.clone());
        Ok(ObjectBackend::from_config(
            scheme.as_str(),
            Arc::new(client),
            &config,
        ))
    })
}

/// Register every cloud scheme with default settings
pub fn install(registry: &Registry) {
    install_with_config(registry, &Config::default());
}

pub fn install_with_config(registry: &Registry, config: &Config) {
    for provider in Provider::ALL {
        for scheme in provider.schemes() {
            registry.register(scheme, provider_classes(provider, scheme, config));
        }
        if !provider.is_available() {
            info!(
                "{} registered without the '{}' feature; its paths will fail on first use",
                provider,
                provider.feature()
            );
        }
    }
}

/// Register every cloud scheme with the process-wide registry
pub fn install_global() {
    install(Registry::global());
}
