//! Helper utilities for polypath testing

use polypath_core::class::ClassPair;
use polypath_core::memory::MemoryClient;
use polypath_core::object::ObjectBackend;
use polypath_core::registry::SchemeEntry;
use polypath_core::Registry;
use std::sync::Arc;

/// Routes a cloud scheme to a private in-memory store until dropped
///
/// Mirrors the usual way of testing code that builds `s3://` paths without
/// credentials: swap the scheme in the global registry, restore it afterwards.
pub struct MockScheme {
    scheme: String,
    client: MemoryClient,
    previous: Option<SchemeEntry>,
}

impl MockScheme {
    /// Swap `scheme` in the global registry
    pub fn install(scheme: &str) -> Self {
        Self::install_in(Registry::global(), scheme)
    }

    /// Swap `scheme` in `registry`
    pub fn install_in(registry: &Registry, scheme: &str) -> Self {
        let client = MemoryClient::new();
        let store = client.clone();
        let tag = scheme.to_string();
        let title = capitalize(scheme);
        let pair = ClassPair::from_async(
            &format!("Mock{title}Path"),
            &format!("AsyncMock{title}Path"),
            move || Ok(ObjectBackend::new(tag.clone(), Arc::new(store.clone()))),
        );
        let previous = registry.swap(scheme, pair);
        Self {
            scheme: scheme.to_string(),
            client,
            previous,
        }
    }

    /// Store behind the mocked scheme
    pub fn client(&self) -> &MemoryClient {
        &self.client
    }

    /// Put the previous entry back
    pub fn restore_in(mut self, registry: &Registry) {
        self.restore_into(registry);
    }

    fn restore_into(&mut self, registry: &Registry) {
        match self.previous.take() {
            Some(previous) => {
                registry.swap(&self.scheme, previous);
            }
            None => {
                registry.unregister(&self.scheme);
            }
        }
        self.scheme.clear();
    }
}

impl Drop for MockScheme {
    fn drop(&mut self) {
        if !self.scheme.is_empty() {
            self.restore_into(Registry::global());
        }
    }
}

fn capitalize(scheme: &str) -> String {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polypath_core::router::{resolve, Mode};

    #[test]
    fn test_mock_scheme_round_trip() {
        let registry = Registry::with_builtins();
        let mock = MockScheme::install_in(&registry, "s3");
        let path = resolve(&registry, "s3://bucket/key", Mode::Blocking)
            .unwrap()
            .into_blocking()
            .unwrap();
        assert_eq!(path.class_name(), "MockS3Path");
        path.write_text("mocked").unwrap();
        assert_eq!(mock.client().keys("bucket"), vec!["key"]);

        mock.restore_in(&registry);
        assert!(!registry.contains("s3"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("gs"), "Gs");
        assert_eq!(capitalize(""), "");
    }
}
