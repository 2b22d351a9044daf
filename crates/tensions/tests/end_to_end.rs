//! End-to-end flows against the SQLite backend.

use std::sync::Arc;

use proptest::prelude::*;
use tempfile::TempDir;
use tensions::store::{ChunkConfig, ChunkedStore, KvBackend, SqliteBackend};
use tensions::{ErrorKind, Keypair, Registry, RegistryConfig, RegistryError, StoredRecord};
use tensions_testkit::generators::{record_key, stored_value};
use tensions_testkit::{make_claim, sample_tension, small_chunks, wallets};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn open(dir: &TempDir) -> Arc<SqliteBackend> {
    Arc::new(SqliteBackend::open(dir.path().join("tensions.db")).unwrap())
}

fn registry(backend: Arc<SqliteBackend>) -> Registry<SqliteBackend, Keypair> {
    Registry::new(
        backend,
        Keypair::from_seed(&[11; 32]),
        RegistryConfig::with_chunking(small_chunks()),
    )
}

#[tokio::test]
async fn chunked_write_read_delete() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = ChunkedStore::new(open(&dir), ChunkConfig::default());

    store.write("abc", "hello-world").await.unwrap();
    assert_eq!(store.read("abc").await.unwrap().as_deref(), Some("hello-world"));

    assert!(store.delete("abc").await.unwrap());
    assert_eq!(store.read("abc").await.unwrap(), None);
}

#[tokio::test]
async fn large_value_spans_many_windows() {
    let dir = TempDir::new().unwrap();
    let store = ChunkedStore::new(open(&dir), ChunkConfig::new(100, 10).unwrap());
    let value = "日本語テキスト-".repeat(300);

    store.write("big", &value).await.unwrap();
    assert!(store.chunk_count("big").await.unwrap() > 10 * 3);
    assert_eq!(store.read("big").await.unwrap(), Some(value));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rewrites_read_whole_values() {
    let dir = TempDir::new().unwrap();
    let store = ChunkedStore::new(open(&dir), ChunkConfig::new(20, 5).unwrap());
    let a = "a".repeat(53);
    let b = "b".repeat(31);
    store.write("k", &a).await.unwrap();

    let writer = {
        let store = store.clone();
        let (a, b) = (a.clone(), b.clone());
        tokio::spawn(async move {
            for i in 0..100 {
                let value = if i % 2 == 0 { &b } else { &a };
                store.write("k", value).await.unwrap();
            }
        })
    };

    for _ in 0..100 {
        let read = store.read("k").await.unwrap().unwrap();
        assert!(read == a || read == b, "spliced read {:?}", read);
    }
    writer.await.unwrap();
}

#[tokio::test]
async fn registry_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let id = {
        let registry = registry(open(&dir));
        registry
            .create(sample_tension("speed", "safety"))
            .await
            .unwrap()
    };

    let registry = registry(open(&dir));
    let record = registry.get(&id.to_hex()).await.unwrap().unwrap();
    let StoredRecord::Template(template) = &record else {
        panic!("expected a template");
    };
    assert_eq!(template.request.force_b, "safety");
    assert_eq!(record.pod().unwrap().content_id(), id);
}

#[tokio::test]
async fn claim_flow() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let registry = registry(open(&dir));
    let wallet = &wallets(1)[0];

    let template = registry
        .create(sample_tension("autonomy", "alignment"))
        .await
        .unwrap();
    let claim = make_claim(&template, wallet);

    let pod = registry.claim(&claim).await.unwrap();
    assert!(pod.verify_signature().is_ok());
    assert!(matches!(
        registry.get(&pod.content_id().to_hex()).await.unwrap(),
        Some(StoredRecord::Owned(_))
    ));

    let err = registry.claim(&claim).await.unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyMinted(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let templates = registry.list_templates().await.unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].0, template.to_hex());
}

#[tokio::test]
async fn update_and_delete() {
    let dir = TempDir::new().unwrap();
    let registry = registry(open(&dir));
    let id = registry
        .create(sample_tension("speed", "safety"))
        .await
        .unwrap()
        .to_hex();

    registry
        .update(&id, sample_tension("speed", "cost"))
        .await
        .unwrap();
    let Some(StoredRecord::Template(template)) = registry.get(&id).await.unwrap() else {
        panic!("expected a template");
    };
    assert_eq!(template.request.force_b, "cost");

    registry.delete(&id).await.unwrap();
    let err = registry.delete(&id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn listing_sees_every_template() {
    let dir = TempDir::new().unwrap();
    let backend = open(&dir);
    let registry = registry(Arc::clone(&backend));

    let mut created = Vec::new();
    for i in 0..25 {
        let id = registry
            .create(sample_tension(&format!("force-{}", i), "other"))
            .await
            .unwrap();
        created.push(id.to_hex());
    }
    backend.set("plain", "not a record").await.unwrap();

    let mut listed: Vec<String> = registry
        .list_templates()
        .await
        .unwrap()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    listed.sort();
    created.sort();
    assert_eq!(listed, created);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sqlite_chunked_roundtrip(key in record_key(), value in stored_value(400)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let store = ChunkedStore::new(open(&dir), ChunkConfig::new(64, 16).unwrap());

        let read = rt.block_on(async {
            store.write(&key, &value).await.unwrap();
            store.read(&key).await.unwrap()
        });
        prop_assert_eq!(read, Some(value));
    }
}
