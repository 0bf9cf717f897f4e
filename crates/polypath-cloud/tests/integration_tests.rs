//! Cloud schemes end to end, served by `object_store`'s in-memory store

use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::ObjectStore;
use polypath_cloud::ObjectStoreClient;
use polypath_core::bridge::Blocking;
use polypath_core::object::ObjectBackend;
use polypath_core::{AsyncPath, Backend, BlockingBackend, BlockingPath, Metadata, Registry};
use polypath_testing::fixtures::create_canonical_tree;
use std::sync::{Arc, Once};

fn install() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        polypath_cloud::install_global();
    });
}

fn backend(store: &Arc<InMemory>) -> ObjectBackend {
    let store: Arc<dyn ObjectStore> = store.clone();
    ObjectBackend::new("s3", Arc::new(ObjectStoreClient::with_store(store)))
}

fn s3_path(store: &Arc<InMemory>, uri: &str) -> BlockingPath {
    install();
    let client: Arc<dyn BlockingBackend> = Arc::new(Blocking::new(backend(store)));
    BlockingPath::new(uri).unwrap().with_client(client)
}

fn async_s3_path(store: &Arc<InMemory>, uri: &str) -> AsyncPath {
    install();
    let client: Arc<dyn Backend> = Arc::new(backend(store));
    AsyncPath::new(uri).unwrap().with_client(client)
}

#[test]
fn test_round_trip() {
    let store = Arc::new(InMemory::new());
    let file = s3_path(&store, "s3://bucket/data/report.txt");
    assert_eq!(file.class_name(), "S3Path");

    file.write_text("quarterly numbers").unwrap();
    assert_eq!(file.read_text().unwrap(), "quarterly numbers");
    assert!(file.is_file().unwrap());
    assert!(file.parent().is_dir().unwrap());
    assert_eq!(file.stat().unwrap().size, 17);
    assert_eq!(file.stat().unwrap().backend, "s3");
}

#[test]
fn test_directory_markers_use_reserved_leaf() {
    let store = Arc::new(InMemory::new());
    let dir = s3_path(&store, "s3://bucket/empty");
    dir.mkdir(false, false).unwrap();
    assert!(dir.is_dir().unwrap());
    assert!(dir.iterdir().unwrap().is_empty());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime
        .block_on(store.head(&StorePath::from("empty/.dir")))
        .unwrap();

    dir.rmdir().unwrap();
    assert!(!dir.exists().unwrap());
}

#[test]
fn test_walk_and_glob() {
    let store = Arc::new(InMemory::new());
    let root = s3_path(&store, "s3://bucket/tree");
    create_canonical_tree(&root).unwrap();

    let mut names: Vec<String> = root
        .rglob("*.txt")
        .unwrap()
        .iter()
        .map(|p| p.relative_to(&root).unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "d/c.txt"]);

    let walk = root.walk().unwrap();
    assert_eq!(walk[0].dirpath, root);
    assert_eq!(walk[0].dirnames, vec!["d"]);
    assert_eq!(walk[0].filenames, vec!["a.txt", "b.log"]);
    assert_eq!(walk[1].filenames, vec!["c.txt"]);

    root.rmtree().unwrap();
    assert!(!root.exists().unwrap());
}

#[test]
fn test_metadata_and_symlinks() {
    let store = Arc::new(InMemory::new());
    let file = s3_path(&store, "s3://bucket/links/target.txt");
    file.write_text("payload").unwrap();

    let metadata = Metadata::from([("team".to_string(), "data".to_string())]);
    file.set_metadata(metadata.clone()).unwrap();
    assert_eq!(file.get_metadata().unwrap(), metadata);
    assert_eq!(file.read_text().unwrap(), "payload");

    let link = s3_path(&store, "s3://bucket/links/alias");
    link.symlink_to("target.txt").unwrap();
    assert!(link.is_symlink().unwrap());
    assert_eq!(
        link.readlink().unwrap().as_uri().unwrap(),
        "s3://bucket/links/target.txt"
    );
    assert_eq!(link.read_text().unwrap(), "payload");
}

#[tokio::test]
async fn test_async_paths() {
    let store = Arc::new(InMemory::new());
    let file = async_s3_path(&store, "s3://bucket/async/file.bin");
    assert_eq!(file.class_name(), "AsyncS3Path");

    file.write_bytes(vec![1u8, 2, 3]).await.unwrap();
    assert_eq!(file.read_bytes().await.unwrap().as_ref(), &[1, 2, 3]);
    let copy = file.copy("s3://bucket/async/copy.bin", true).await.unwrap();
    assert!(copy.exists().await.unwrap());
    assert_eq!(file.parent().iterdir().await.unwrap().len(), 2);
}

#[test]
fn test_install_registers_every_scheme() {
    let registry = Registry::new();
    polypath_cloud::install(&registry);
    for scheme in ["s3", "gs", "az", "azure"] {
        assert!(registry.contains(scheme), "{scheme}");
    }
}

#[cfg(not(feature = "gcp"))]
#[test]
fn test_missing_provider_fails_on_first_use() {
    install();
    let path = BlockingPath::new("gs://bucket/key").unwrap();
    assert_eq!(path.class_name(), "GSPath");
    let err = path.exists().unwrap_err();
    assert!(matches!(
        err,
        polypath_core::Error::MissingDependency { ref feature, .. } if feature == "gcp"
    ));
}
