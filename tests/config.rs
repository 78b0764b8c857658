#[cfg(test)]
mod tests {
    use memodiary::libs::config::{StoreConfig, DB_FILE_NAME};
    use memodiary::libs::data_storage::DataStorage;
    use std::time::Duration;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct ConfigTestContext {
        _temp_dir: TempDir,
    }

    impl TestContext for ConfigTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            ConfigTestContext { _temp_dir: temp_dir }
        }
    }

    // Single test: HOME is process-wide and tests in this file would race on it
    #[test_context(ConfigTestContext)]
    #[test]
    fn test_config_lifecycle(_ctx: &mut ConfigTestContext) {
        // Missing file means defaults
        let config = StoreConfig::read().unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.reset_timeout(), Duration::from_secs(10));
        assert_eq!(config.database_path(), DataStorage::new().base_path().join(DB_FILE_NAME));

        // Saved values survive a read
        let custom = StoreConfig {
            query_timeout_ms: 250,
            read_pool_size: 4,
            ..StoreConfig::at("journal/local.db")
        };
        custom.save().unwrap();
        let loaded = StoreConfig::read().unwrap();
        assert_eq!(loaded, custom);
        assert_eq!(loaded.database_path(), DataStorage::new().base_path().join("journal/local.db"));
    }
}
