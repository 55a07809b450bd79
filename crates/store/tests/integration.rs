//! Integration tests for the artifact cache

#[cfg(test)]
mod tests {
    use kiln_errors::{Error, StorageError};
    use kiln_hash::Hash;
    use kiln_store::{ArtifactCache, ArtifactRecord};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::fs;

    async fn staged(dir: &Path, name: &str) -> std::path::PathBuf {
        let staging = dir.join("staging").join(name);
        fs::create_dir_all(staging.join("lib")).await.unwrap();
        fs::write(staging.join("lib").join(format!("lib{name}.a")), name)
            .await
            .unwrap();
        staging
    }

    #[tokio::test]
    async fn test_install_and_reopen() {
        let temp = tempdir().unwrap();
        let cache_dir = temp.path().join("cache");
        let identity = Hash::from_data(b"zlib/1.3.1");

        let cache = ArtifactCache::open(&cache_dir).await.unwrap();
        assert!(cache.is_empty());
        assert!(cache.lookup(&identity).await.is_none());

        let staging = staged(temp.path(), "z").await;
        let record = cache
            .install(
                &staging,
                ArtifactRecord::new("zlib", "1.3.1", identity).with_libs(vec!["z".to_string()]),
            )
            .await
            .unwrap();
        assert_eq!(record.location, cache.slot(&identity));
        assert!(record.location.join("lib/libz.a").exists());
        assert!(!staging.exists());

        let reopened = ArtifactCache::open(&cache_dir).await.unwrap();
        assert_eq!(reopened.len(), 1);
        let hit = reopened.lookup(&identity).await.unwrap();
        assert_eq!(hit.package(), "zlib/1.3.1");
        assert_eq!(hit.libs, vec!["z".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_record_is_a_miss() {
        let temp = tempdir().unwrap();
        let identity = Hash::from_data(b"bzip2");
        let cache = ArtifactCache::open(temp.path()).await.unwrap();

        let staging = staged(temp.path(), "bz2").await;
        cache
            .install(&staging, ArtifactRecord::new("bzip2", "1.0.8", identity))
            .await
            .unwrap();
        fs::remove_dir_all(cache.slot(&identity)).await.unwrap();

        assert!(cache.lookup(&identity).await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let temp = tempdir().unwrap();
        let identity = Hash::from_data(b"libpng");
        let cache = ArtifactCache::open(temp.path()).await.unwrap();

        let staging = staged(temp.path(), "png").await;
        cache
            .install(&staging, ArtifactRecord::new("libpng", "1.6.44", identity))
            .await
            .unwrap();

        assert!(cache.remove(&identity).await.unwrap());
        assert!(!cache.slot(&identity).exists());
        assert!(!cache.remove(&identity).await.unwrap());
        assert!(ArtifactCache::open(temp.path()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_installs_are_all_persisted() {
        let temp = tempdir().unwrap();
        let cache = Arc::new(ArtifactCache::open(temp.path().join("cache")).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = Arc::clone(&cache);
            let staging = staged(temp.path(), &format!("pkg{i}")).await;
            handles.push(tokio::spawn(async move {
                let identity = Hash::from_data(format!("pkg{i}").as_bytes());
                cache
                    .install(&staging, ArtifactRecord::new(format!("pkg{i}"), "1.0.0", identity))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reopened = ArtifactCache::open(temp.path().join("cache")).await.unwrap();
        assert_eq!(reopened.len(), 8);
        let names: Vec<_> = reopened.records().into_iter().map(|r| r.name).collect();
        assert_eq!(names[0], "pkg0");
        assert_eq!(names[7], "pkg7");
    }

    #[tokio::test]
    async fn test_corrupted_index() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.json"), "{ not json")
            .await
            .unwrap();

        let err = ArtifactCache::open(temp.path()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::CorruptedIndex { .. })
        ));
    }
}
