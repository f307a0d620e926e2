//! Integration tests for FerroVault
//!
//! These tests drive the hasher, cipher, storage providers, backup pipeline,
//! restorer and sync engine together the way the command line tool does.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

use ferrovault_config::{ConfigLoader, ProviderKind};
use ferrovault_crypto::{Cipher, ContentHasher};
use ferrovault_engine::{BackupConfig, BackupPipeline, BackupStatus, Restorer};
use ferrovault_storage::{
    LocalStorageProvider, MockCloudProvider, StorageProvider, REFERENCE_PREFIX,
};
use ferrovault_sync::{is_conflict_copy, ConflictResolution, SyncEngine, SyncOptions};
use ferrovault_tests::test_utils::{
    count_objects, generate_test_data, list_files, set_modified, write_file, write_tree,
    TestDataPattern,
};
use ferrovault_types::{
    CompressionAlgorithm, Error, ErrorKind, NoopListener, StoredObjectKey,
};

const KEY: [u8; 32] = [0x42; 32];

fn local(store: &Path) -> Arc<dyn StorageProvider> {
    Arc::new(LocalStorageProvider::new(store).expect("Failed to open local store"))
}

fn pipeline(provider: &Arc<dyn StorageProvider>) -> BackupPipeline {
    BackupPipeline::new(Arc::clone(provider)).with_listener(Arc::new(NoopListener))
}

/// Contents of every object file under a store, keyed by relative path
fn snapshot_objects(store: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let objects = store.join("objects");
    list_files(&objects)
        .into_iter()
        .map(|rel| {
            let bytes = fs::read(objects.join(&rel)).unwrap();
            (rel, bytes)
        })
        .collect()
}

fn count_references(store: &Path) -> usize {
    fs::read_dir(store.join("_meta"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(REFERENCE_PREFIX))
        .count()
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let plaintext = generate_test_data(10_000, TestDataPattern::Text);
    for key in [&KEY[..], &KEY[..16]] {
        let cipher = Cipher::new(key).unwrap();
        let sealed = cipher.encrypt(&plaintext).unwrap();
        assert_ne!(&sealed[..], &plaintext[..]);
        assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
    }
}

#[test]
fn test_tampered_ciphertext_is_rejected() {
    let cipher = Cipher::new(&KEY).unwrap();
    let mut sealed = cipher.encrypt(b"ledger entry").unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;

    assert!(matches!(cipher.decrypt(&sealed), Err(Error::AuthenticationFailure)));

    let other = Cipher::new(&[0x24; 32]).unwrap();
    let sealed = cipher.encrypt(b"ledger entry").unwrap();
    assert!(matches!(other.decrypt(&sealed), Err(Error::AuthenticationFailure)));
}

#[test]
fn test_fingerprint_independent_of_chunk_size() {
    let data = generate_test_data(200_003, TestDataPattern::Random);
    let expected = ContentHasher::fingerprint_bytes(&data);
    for chunk_size in [1, 7, 4096, 65_536, 1 << 20] {
        let fp = ContentHasher::with_chunk_size(chunk_size)
            .fingerprint(&data[..])
            .unwrap();
        assert_eq!(fp, expected, "chunk size {}", chunk_size);
    }
}

#[tokio::test]
async fn test_same_content_twice_stores_one_object() -> Result<(), Box<dyn std::error::Error>> {
    let source = TempDir::new()?;
    let store = TempDir::new()?;
    let report = generate_test_data(64 * 1024, TestDataPattern::Text);
    write_tree(
        source.path(),
        &[
            ("q1/report.txt", report.as_slice()),
            ("q2/report-copy.txt", report.as_slice()),
        ],
    );

    let provider = local(store.path());
    let config = BackupConfig::builder(source.path(), store.path()).build()?;

    let first = pipeline(&provider).run(&config).await;
    assert_eq!(first.status, BackupStatus::Success);
    assert_eq!(first.total_files, 2);
    assert_eq!(first.objects_written, 1);
    assert_eq!(first.objects_deduplicated, 1);
    assert_eq!(count_objects(store.path()), 1);
    assert_eq!(count_references(store.path()), 1);

    let before = snapshot_objects(store.path());
    let second = pipeline(&provider).run(&config).await;
    assert_eq!(second.status, BackupStatus::Success);
    assert_eq!(second.objects_written, 0);
    assert_eq!(second.objects_deduplicated, 2);
    assert_eq!(second.bytes_stored, 0);
    assert_eq!(snapshot_objects(store.path()), before);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_identical_content_on_mock_cloud() {
    let source = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    let content = generate_test_data(8 * 1024, TestDataPattern::Random);
    for i in 0..24 {
        write_file(&source.path().join(format!("dir{}/clone-{}.bin", i % 4, i)), &content);
    }

    let provider: Arc<dyn StorageProvider> = Arc::new(
        MockCloudProvider::new(store.path())
            .unwrap()
            .with_latency(Duration::from_millis(2)),
    );
    let config = BackupConfig::builder(source.path(), store.path())
        .parallelism(8)
        .build()
        .unwrap();

    let result = timeout(Duration::from_secs(30), pipeline(&provider).run(&config))
        .await
        .expect("backup timed out");

    assert!(result.is_success(), "{}", result.message);
    assert_eq!(result.objects_written, 1);
    assert_eq!(result.objects_deduplicated, 23);
    assert_eq!(count_objects(store.path()), 1);
    assert_eq!(count_references(store.path()), 1);

    let fp = ContentHasher::fingerprint_bytes(&content);
    let reference = provider.get_reference(&fp).await.unwrap();
    assert_eq!(reference, Some(StoredObjectKey::for_fingerprint(&fp)));
}

#[tokio::test]
async fn test_backup_restore_roundtrip_per_algorithm() {
    for algorithm in [
        CompressionAlgorithm::None,
        CompressionAlgorithm::Zstd,
        CompressionAlgorithm::Gzip,
    ] {
        let source = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        let restored = TempDir::new().unwrap();
        let notes = generate_test_data(5_000, TestDataPattern::Text);
        let blob = generate_test_data(70_000, TestDataPattern::Random);
        let zeros = generate_test_data(30_000, TestDataPattern::Zeros);
        write_tree(
            source.path(),
            &[
                ("empty.txt", b"".as_slice()),
                ("notes.txt", notes.as_slice()),
                ("bin/blob.dat", blob.as_slice()),
                ("bin/zeros.dat", zeros.as_slice()),
            ],
        );

        let provider = local(store.path());
        let config = BackupConfig::builder(source.path(), store.path())
            .compression(algorithm, algorithm.default_level())
            .key(KEY.to_vec())
            .build()
            .unwrap();
        let result = pipeline(&provider).run(&config).await;
        assert!(result.is_success(), "{}: {}", algorithm, result.message);

        let restorer = Restorer::new(Arc::clone(&provider), Some(Cipher::new(&KEY).unwrap()));
        let restore = restorer.restore_tree(restored.path()).await.unwrap();
        assert!(restore.is_success(), "{}: {:?}", algorithm, restore.failures);
        assert_eq!(restore.files_restored, 4);

        assert_eq!(list_files(restored.path()), list_files(source.path()));
        for rel in list_files(source.path()) {
            assert_eq!(
                fs::read(restored.path().join(&rel)).unwrap(),
                fs::read(source.path().join(&rel)).unwrap(),
                "{}: {}",
                algorithm,
                rel.display()
            );
        }
    }
}

#[tokio::test]
async fn test_tampered_stored_object_fails_restore() {
    let source = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_file(&source.path().join("secret.txt"), b"the vault combination");

    let provider = local(store.path());
    let config = BackupConfig::builder(source.path(), store.path())
        .key(KEY.to_vec())
        .build()
        .unwrap();
    assert!(pipeline(&provider).run(&config).await.is_success());

    let fp = ContentHasher::fingerprint_bytes(b"the vault combination");
    let object = store
        .path()
        .join(StoredObjectKey::for_fingerprint(&fp).to_relative_path());
    let mut bytes = fs::read(&object).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x80;
    fs::write(&object, bytes).unwrap();

    let restorer = Restorer::new(provider, Some(Cipher::new(&KEY).unwrap()));
    let err = restorer.restore_bytes(&fp).await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailure));
}

#[tokio::test]
async fn test_mock_cloud_rejects_size_mismatch() {
    let store = TempDir::new().unwrap();
    let provider: Arc<dyn StorageProvider> =
        Arc::new(MockCloudProvider::new(store.path()).unwrap());
    let key = StoredObjectKey::for_fingerprint(&ContentHasher::fingerprint_bytes(b"x"));

    let mut short: &[u8] = b"only nine";
    let err = provider.put(&key, &mut short, 10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(!provider.exists(&key).await.unwrap());

    let mut exact: &[u8] = b"only nine";
    assert_eq!(provider.put(&key, &mut exact, 9).await.unwrap(), 9);
    assert_eq!(provider.get(&key).await.unwrap().unwrap(), b"only nine");
}

#[tokio::test]
async fn test_backup_of_missing_source_fails() {
    let root = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    let provider = local(store.path());
    let config = BackupConfig::builder(root.path().join("absent"), store.path())
        .build()
        .unwrap();

    let result = pipeline(&provider).run(&config).await;
    assert_eq!(result.status, BackupStatus::Failure);
    assert_eq!(count_objects(store.path()), 0);
}

#[tokio::test]
async fn test_sync_empty_source() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();

    let result = SyncEngine::new()
        .synchronize(source.path(), target.path(), &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(result.files_synced, 0);
    assert_eq!(result.conflicts_count, 0);
    assert!(list_files(target.path()).is_empty());
}

#[tokio::test]
async fn test_sync_copies_new_file() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(&source.path().join("a.txt"), b"hello");

    let result = SyncEngine::new()
        .synchronize(source.path(), target.path(), &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(result.files_synced, 1);
    assert_eq!(result.conflicts_count, 0);
    assert_eq!(fs::read(target.path().join("a.txt")).unwrap(), b"hello");
}

#[tokio::test]
async fn test_sync_keep_newest_overwrites_older_target() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    let src = source.path().join("a.txt");
    let tgt = target.path().join("a.txt");
    write_file(&src, b"new");
    write_file(&tgt, b"old");
    set_modified(&src, 1_700_000_600);
    set_modified(&tgt, 1_700_000_000);

    let result = SyncEngine::new()
        .synchronize(source.path(), target.path(), &SyncOptions::keep_newest())
        .await
        .unwrap();

    assert_eq!(result.files_synced, 1);
    assert_eq!(result.conflicts_count, 1);
    assert_eq!(result.conflicts[0].resolution, ConflictResolution::UseSource);
    assert_eq!(fs::read(&tgt).unwrap(), b"new");
    assert_eq!(list_files(target.path()), vec![PathBuf::from("a.txt")]);
}

#[tokio::test]
async fn test_sync_keep_both_writes_conflict_copy() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(&source.path().join("a.txt"), b"A");
    write_file(&target.path().join("a.txt"), b"B");

    let result = SyncEngine::new()
        .synchronize(source.path(), target.path(), &SyncOptions::keep_both())
        .await
        .unwrap();

    assert_eq!(result.files_synced, 1);
    assert_eq!(result.conflicts_count, 1);
    assert_eq!(fs::read(target.path().join("a.txt")).unwrap(), b"B");

    let files = list_files(target.path());
    assert_eq!(files.len(), 2);
    let copy = files
        .iter()
        .find(|p| is_conflict_copy(p))
        .expect("conflict copy missing");
    assert!(copy.to_string_lossy().starts_with("a.txt.conflict-"));
    assert_eq!(fs::read(target.path().join(copy)).unwrap(), b"A");
}

#[tokio::test]
async fn test_sync_then_backup_target() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_tree(
        source.path(),
        &[
            ("docs/a.txt", b"alpha".as_slice()),
            ("docs/b.txt", b"beta".as_slice()),
            ("c.txt", b"alpha".as_slice()),
        ],
    );

    let synced = SyncEngine::new()
        .synchronize(source.path(), target.path(), &SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(synced.files_synced, 3);

    let provider = local(store.path());
    let config = BackupConfig::builder(target.path(), store.path())
        .build()
        .unwrap();
    let result = pipeline(&provider).run(&config).await;
    assert!(result.is_success());
    assert_eq!(result.objects_written, 2);
    assert_eq!(result.objects_deduplicated, 1);
}

#[tokio::test]
async fn test_config_file_drives_backup_and_sync() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("ferrovault.yaml");
    fs::write(
        &config_path,
        format!(
            r#"
backup:
  parallelism: 3
  compression_algorithm: Gzip
  compression_level: 9
  encryption_key: "{}"
sync:
  conflict_policy: KeepBoth
storage:
  provider: MockCloud
"#,
            "11".repeat(16)
        ),
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_path).unwrap();
    assert_eq!(config.storage.provider, ProviderKind::MockCloud);

    let source = dir.path().join("source");
    let store = dir.path().join("store");
    write_file(&source.join("report.txt"), b"quarterly numbers");

    let provider: Arc<dyn StorageProvider> = Arc::new(MockCloudProvider::new(&store).unwrap());
    let backup = BackupConfig::from_settings(&source, &store, &config.backup).unwrap();
    assert_eq!(backup.parallelism(), 3);
    assert!(backup.is_encrypted());

    let result = pipeline(&provider).run(&backup).await;
    assert!(result.is_success(), "{}", result.message);

    let restorer = Restorer::new(provider, backup.cipher().unwrap());
    let content = restorer
        .restore_bytes(&ContentHasher::fingerprint_bytes(b"quarterly numbers"))
        .await
        .unwrap();
    assert_eq!(content, b"quarterly numbers");

    let options = SyncOptions::from_settings(&config.sync);
    assert_eq!(options, SyncOptions::keep_both());
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("broken.yaml");
    fs::write(&config_path, "backup:\n  parallelism: 0\n").unwrap();

    assert!(ConfigLoader::validate_file(&config_path).is_err());
    assert!(ConfigLoader::load_from_file(dir.path().join("absent.yaml")).is_err());
}
