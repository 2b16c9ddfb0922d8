//! End-to-end scenarios for the fifocache workspace, exercising the public
//! API only.

#[cfg(test)]
mod tests {
    use std::{
        fs,
        io::{Cursor, Read},
        path::Path,
        time::{Duration, SystemTime},
    };

    use fifocache::{ContentResolver, FifoCache, DEFAULT_DIRECTORY, DEFAULT_SIZE};
    use fifocache_utils::{logger::install_fmt_log, readable_size::ReadableSize};

    fn backdate(path: &Path, secs: u64) {
        let file = fs::OpenOptions::new().append(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn fill_evict_and_clear() {
        install_fmt_log();

        let root = tempfile::tempdir().unwrap();
        let mut cache = FifoCache::builder(root.path())
            .with_capacity(ReadableSize(12))
            .build()
            .unwrap();

        let a = cache.put(Cursor::new(b"aaaa"), "a", 4).unwrap();
        let b = cache.put(Cursor::new(b"bbbb"), "b", 4).unwrap();
        let c = cache.put(Cursor::new(b"cccc"), "c", 4).unwrap();
        backdate(&a, 30);
        backdate(&b, 20);
        backdate(&c, 10);
        assert_eq!(cache.usage().unwrap(), 12);

        // 8 new bytes need 8 freed: the two oldest entries go, the newest stays
        cache.put(Cursor::new(b"dddddddd"), "d", 8).unwrap();
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
        assert!(cache.usage().unwrap() <= 12);

        cache.clear();
        assert_eq!(cache.usage().unwrap(), 0);
        assert!(cache.get("c").is_none());
        assert!(cache.get("d").is_none());
    }

    #[test]
    fn budget_reconfiguration_defers_eviction() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = FifoCache::builder(root.path()).build().unwrap();
        assert_eq!(cache.capacity(), DEFAULT_SIZE);

        let a = cache.put(Cursor::new(b"aaaa"), "a", 4).unwrap();
        backdate(&a, 10);

        // shrinking the budget below current usage evicts nothing on its own
        cache.set_capacity(2).unwrap();
        assert!(cache.get("a").is_some());

        // the next put settles the account
        cache.put(Cursor::new(b"bb"), "b", 2).unwrap();
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn subdirectory_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = FifoCache::builder(root.path()).build().unwrap();
        assert_eq!(cache.subdirectory(), DEFAULT_DIRECTORY);

        cache.put(Cursor::new(b"data"), "file.test", 4).unwrap();
        assert!(cache.set_subdirectory("elsewhere").is_err());

        cache.clear();
        cache.set_subdirectory("elsewhere").unwrap();
        let path = cache.put(Cursor::new(b"data"), "file.test", 4).unwrap();
        assert!(path.starts_with(root.path().join("elsewhere")));

        // the old directory was confirmed empty and is left behind as-is
        assert!(root.path().join(DEFAULT_DIRECTORY).exists());
    }

    struct StaticResolver;

    impl ContentResolver for StaticResolver {
        fn open(&self, locator: &str) -> std::io::Result<Box<dyn Read>> {
            Ok(Box::new(Cursor::new(locator.as_bytes().to_vec())))
        }
    }

    #[test]
    fn locator_puts_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = FifoCache::builder(root.path())
            .with_resolver(Box::new(StaticResolver))
            .build()
            .unwrap();

        let path = cache
            .put_locator("content://photo/7", "photo7", 17)
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"content://photo/7");
        assert_eq!(cache.get("photo7").unwrap(), path);
    }

    #[test]
    fn on_disk_state_outlives_the_manager() {
        let root = tempfile::tempdir().unwrap();
        {
            let mut cache = FifoCache::builder(root.path()).build().unwrap();
            cache.put(Cursor::new(b"persisted"), "file.test", 9).unwrap();
        }

        // a rebuilt manager over the same root sees the same entries
        let mut cache = FifoCache::builder(root.path()).build().unwrap();
        let path = cache.get("file.test").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"persisted");
        assert_eq!(cache.usage().unwrap(), 9);

        cache.clear();
        assert!(cache.get("file.test").is_none());
    }
}
