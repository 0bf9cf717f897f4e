//! Concrete path classes and their shared default clients
//!
//! A [`PathClass`] is the runtime stand-in for "concrete backend + mode": it
//! carries the class name used for equality and display, and owns the one
//! default client every path of that class shares unless a path was given its
//! own.
//!
//! The default client is created lazily. Two threads racing to create it may
//! both build one; the last write wins and the loser is simply dropped.

use crate::backend::{Backend, BlockingBackend, ClientHandle};
use crate::bridge::Blocking;
use crate::local::LocalBackend;
use crate::Result;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

/// Builds a fresh client for a class
pub type ClientFactory<C> = Arc<dyn Fn() -> Result<Arc<C>> + Send + Sync>;

/// Runtime description of a concrete path class
pub struct PathClass<C: ?Sized> {
    name: String,
    factory: ClientFactory<C>,
    default_client: RwLock<Option<Arc<C>>>,
}

/// Class of suspend-mode paths
pub type AsyncClass = PathClass<dyn Backend>;

/// Class of blocking-mode paths
pub type BlockingClass = PathClass<dyn BlockingBackend>;

impl<C: ?Sized> fmt::Debug for PathClass<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self
            .default_client
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("PathClass")
            .field("name", &self.name)
            .field("client_cached", &cached)
            .finish()
    }
}

impl<C: ?Sized + ClientHandle> PathClass<C> {
    pub fn new(name: impl Into<String>, factory: ClientFactory<C>) -> Self {
        Self {
            name: name.into(),
            factory,
            default_client: RwLock::new(None),
        }
    }

    /// Class name (`S3Path`, `AsyncLocalPath`, ...)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared default client, rebuilt when missing or closed
    pub fn default_client(&self) -> Result<Arc<C>> {
        {
            let slot = self
                .default_client
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(client) = slot.as_ref().filter(|c| !c.is_closed()) {
                return Ok(client.clone());
            }
        }

        debug!("creating default client for {}", self.name);
        let client = (self.factory)()?;
        *self
            .default_client
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(client.clone());
        Ok(client)
    }

    /// Close and forget the default client; the next access builds a new one
    pub fn close_default_client(&self) {
        let previous = self
            .default_client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(client) = previous {
            debug!("closing default client for {}", self.name);
            client.close();
        }
    }

    /// Whether a default client is currently cached
    pub fn has_default_client(&self) -> bool {
        self.default_client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Build a private client without touching the cache
    pub fn new_client(&self) -> Result<Arc<C>> {
        (self.factory)()
    }
}

/// Both classes of one backend
#[derive(Debug, Clone)]
pub struct ClassPair {
    pub blocking: Arc<BlockingClass>,
    pub suspend: Arc<AsyncClass>,
}

impl ClassPair {
    /// Pair for any suspend-mode backend; the blocking class bridges to it
    pub fn from_async<B, F>(blocking_name: &str, async_name: &str, factory: F) -> Self
    where
        B: Backend + 'static,
        F: Fn() -> Result<B> + Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        let blocking_factory = factory.clone();
        Self {
            blocking: Arc::new(PathClass::new(
                blocking_name,
                Arc::new(move || {
                    let client: Arc<dyn BlockingBackend> =
                        Arc::new(Blocking::new(blocking_factory()?));
                    Ok(client)
                }),
            )),
            suspend: Arc::new(PathClass::new(
                async_name,
                Arc::new(move || {
                    let client: Arc<dyn Backend> = Arc::new(factory()?);
                    Ok(client)
                }),
            )),
        }
    }
}

/// The local classes are fixed and never registered
pub fn local_classes() -> &'static ClassPair {
    static LOCAL: OnceLock<ClassPair> = OnceLock::new();
    LOCAL.get_or_init(|| ClassPair {
        blocking: Arc::new(PathClass::new(
            "LocalPath",
            Arc::new(|| {
                let client: Arc<dyn BlockingBackend> = Arc::new(LocalBackend::new());
                Ok(client)
            }),
        )),
        suspend: Arc::new(PathClass::new(
            "AsyncLocalPath",
            Arc::new(|| {
                let client: Arc<dyn Backend> = Arc::new(LocalBackend::new());
                Ok(client)
            }),
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;
    use crate::object::ObjectBackend;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_pair(counter: Arc<AtomicUsize>) -> ClassPair {
        ClassPair::from_async("MemoryPath", "AsyncMemoryPath", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ObjectBackend::new("memory", Arc::new(MemoryClient::new())))
        })
    }

    #[test]
    fn test_default_client_is_cached() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pair = counting_pair(counter.clone());
        let a = pair.suspend.default_client().unwrap();
        let b = pair.suspend.default_client().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_client_is_recreated() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pair = counting_pair(counter.clone());
        let first = pair.blocking.default_client().unwrap();
        first.close();
        let second = pair.blocking.default_client().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        pair.blocking.close_default_client();
        assert!(!pair.blocking.has_default_client());
        assert!(second.is_closed());
    }

    #[test]
    fn test_factory_error_leaves_cache_empty() {
        let class: AsyncClass = PathClass::new(
            "AsyncS3Path",
            Arc::new(|| {
                Err(Error::MissingDependency {
                    backend: "S3".into(),
                    package: "object_store".into(),
                    feature: "aws".into(),
                })
            }),
        );
        assert!(class.default_client().is_err());
        assert!(!class.has_default_client());
    }

    #[test]
    fn test_local_class_names() {
        assert_eq!(local_classes().blocking.name(), "LocalPath");
        assert_eq!(local_classes().suspend.name(), "AsyncLocalPath");
    }
}
